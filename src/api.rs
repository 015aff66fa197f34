// ABOUTME: Shared async HTTP layer for the Notion and WeChat clients
// ABOUTME: Handles throttling, fail-fast status errors, and raw byte fetches

use crate::{Error, Result};
use rand::Rng;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("notion2wechat/", env!("CARGO_PKG_VERSION"), " (Rust)");

pub(crate) fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }

    // Find a valid UTF-8 boundary at or before max_chars
    let mut boundary = max_chars;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    if boundary == 0 {
        return String::new();
    }

    format!("{}...", &s[..boundary])
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    throttle_min: u64,
    throttle_max: u64,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(HttpClient {
            client,
            throttle_min: 100,
            throttle_max: 300,
        })
    }

    pub fn with_throttle(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.throttle_min = min_ms;
        self.throttle_max = max_ms;
        self
    }

    pub fn disable_throttle(mut self) -> Self {
        self.throttle_min = 0;
        self.throttle_max = 0;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn throttle(&self) {
        if self.throttle_max > 0 {
            let sleep_ms = rand::thread_rng().gen_range(self.throttle_min..=self.throttle_max);
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
    }

    /// Sends a prepared request and decodes a JSON body.
    ///
    /// `endpoint` is only used for error reporting, so callers pass the path
    /// without query strings that may carry credentials.
    pub async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        debug!(endpoint, "sending request");
        let response = request.header("Accept", "application/json").send().await?;

        self.throttle().await;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let preview = truncate_str(&message, 100);
            return Err(Error::Api {
                endpoint: endpoint.into(),
                status: status.as_u16(),
                message: preview,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(
                endpoint,
                error = %e,
                body = %truncate_str(&body, 500),
                "failed to parse response"
            );
            Error::Parse(e)
        })
    }

    /// Downloads raw bytes, failing on any non-success status.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                endpoint: truncate_str(url, 100),
                status: status.as_u16(),
                message: "download failed".into(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
