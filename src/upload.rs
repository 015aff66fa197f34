// ABOUTME: Cover image upload with a bounded, fixed-backoff retry loop
// ABOUTME: Fetches source bytes and registers them as a permanent platform asset

use crate::api::HttpClient;
use crate::token::TokenCache;
use crate::wechat::{PublishingService, ERR_INVALID_MEDIA_ID};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_UPLOAD_ATTEMPTS: u32 = 3;
pub const DEFAULT_UPLOAD_BACKOFF: Duration = Duration::from_millis(1500);

/// Source of raw image bytes.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl AssetFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_bytes(url).await
    }
}

pub struct AssetUploader {
    tokens: Arc<TokenCache>,
    publisher: Arc<dyn PublishingService>,
    fetcher: Arc<dyn AssetFetcher>,
    attempts: u32,
    backoff: Duration,
}

impl AssetUploader {
    pub fn new(
        tokens: Arc<TokenCache>,
        publisher: Arc<dyn PublishingService>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        AssetUploader {
            tokens,
            publisher,
            fetcher,
            attempts: DEFAULT_UPLOAD_ATTEMPTS,
            backoff: DEFAULT_UPLOAD_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Uploads the image at `source_url` and returns its media id.
    ///
    /// Fetch failures, failed upload requests and invalid-media-id replies
    /// consume an attempt; any other platform error fails at once. Token
    /// errors are not retried.
    pub async fn upload_cover_asset(&self, source_url: &str) -> Result<String> {
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                tokio::time::sleep(self.backoff).await;
            }

            let token = self.tokens.get_token().await?;

            let bytes = match self.fetcher.fetch(source_url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(attempt, url = source_url, error = %e, "failed to fetch cover image");
                    continue;
                }
            };
            debug!(attempt, size = bytes.len(), "uploading cover image");

            let reply = match self.publisher.upload_asset(&token, bytes).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(attempt, error = %e, "cover image upload request failed");
                    continue;
                }
            };
            if let Some(media_id) = reply.media_id.filter(|id| !id.is_empty()) {
                info!(attempt, media_id = %media_id, "cover image uploaded");
                return Ok(media_id);
            }

            if reply.status.errcode == ERR_INVALID_MEDIA_ID {
                warn!(attempt, "platform reported invalid media id, retrying");
                continue;
            }

            return Err(Error::Upload(reply.status.describe()));
        }

        Err(Error::Upload("retry budget exhausted".into()))
    }
}
