// ABOUTME: Bearer token cache for the publishing platform
// ABOUTME: Reuses the stored token until expiry, then refreshes and persists it

use crate::config::CredentialStore;
use crate::util::now_millis;
use crate::wechat::PublishingService;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// A stored token is usable only strictly before its expiry instant.
fn is_unexpired(expires_at: i64, now: i64) -> bool {
    expires_at > now
}

pub struct TokenCache {
    store: Arc<dyn CredentialStore>,
    publisher: Arc<dyn PublishingService>,
}

impl TokenCache {
    pub fn new(store: Arc<dyn CredentialStore>, publisher: Arc<dyn PublishingService>) -> Self {
        TokenCache { store, publisher }
    }

    /// Returns a token valid at call time, issuing a new one if needed.
    ///
    /// Concurrent callers that both see an expired token both refresh; the
    /// later write to the store wins and both tokens stay usable.
    pub async fn get_token(&self) -> Result<String> {
        let config = self.store.load()?;
        let now = now_millis();

        if let (Some(token), Some(expires_at)) =
            (&config.wechat.access_token, config.wechat.token_expires_at)
        {
            if !token.is_empty() && is_unexpired(expires_at, now) {
                debug!(expires_in_ms = expires_at - now, "reusing cached access token");
                return Ok(token.clone());
            }
        }

        config.validate_wechat()?;

        info!("requesting new access token");
        let reply = self
            .publisher
            .issue_token(&config.wechat.app_id, &config.wechat.app_secret)
            .await?;

        let token = match reply.access_token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(Error::Auth(reply.status.describe())),
        };
        let ttl_seconds = reply.expires_in.unwrap_or(0);
        let expires_at = now_millis() + ttl_seconds * 1000;

        // Merge into the latest stored config so concurrent edits survive
        self.store.update(&mut |config| {
            config.wechat.access_token = Some(token.clone());
            config.wechat.token_expires_at = Some(expires_at);
        })?;

        Ok(token)
    }
}
