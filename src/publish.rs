// ABOUTME: Publish workflow: cover upload, draft, settle, submit, poll
// ABOUTME: Non-compensating stages; failures after the draft name what was left behind

use crate::model::ArticlePayload;
use crate::token::TokenCache;
use crate::upload::AssetUploader;
use crate::util::slugify;
use crate::wechat::{DraftArticle, PublishingService};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const STATUS_PUBLISHED: i64 = 0;
const STATUS_PENDING: i64 = 1;

/// Human-readable description of a publish-status code.
pub fn describe_publish_status(code: i64) -> &'static str {
    match code {
        0 => "published",
        1 => "publishing",
        2 => "original-content check failed",
        3 => "publish failed",
        4 => "rejected by platform review",
        5 => "deleted by the account after publishing",
        6 => "banned by the platform after publishing",
        _ => "unknown publish status",
    }
}

#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Pause between draft creation and submission.
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Base URL of the image service used when an article has no cover.
    pub placeholder_base: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        PublishOptions {
            settle_delay: Duration::from_millis(1500),
            poll_interval: Duration::from_secs(2),
            max_polls: 10,
            placeholder_base: "https://placehold.co/900x383.png".into(),
        }
    }
}

impl PublishOptions {
    /// Deterministic cover URL derived from the article title.
    pub fn placeholder_url(&self, title: &str) -> String {
        let slug = slugify(title);
        let text = if slug.is_empty() { "cover".to_string() } else { slug };
        format!("{}?text={}", self.placeholder_base, text)
    }
}

/// What a successful publish left on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub draft_media_id: String,
    pub publish_id: String,
    pub article_url: Option<String>,
}

pub struct PublishDriver {
    tokens: Arc<TokenCache>,
    uploader: AssetUploader,
    publisher: Arc<dyn PublishingService>,
    options: PublishOptions,
}

impl PublishDriver {
    pub fn new(
        tokens: Arc<TokenCache>,
        uploader: AssetUploader,
        publisher: Arc<dyn PublishingService>,
        options: PublishOptions,
    ) -> Self {
        PublishDriver {
            tokens,
            uploader,
            publisher,
            options,
        }
    }

    /// Runs the full workflow for one article.
    ///
    /// Succeeds only once the platform reports the article as public. Nothing
    /// is rolled back on failure: a draft created before a failed submit stays
    /// on the platform and its media id is carried by the error.
    pub async fn publish(&self, article: &ArticlePayload) -> Result<PublishReceipt> {
        article.validate()?;

        let thumb_media_id = self.obtain_cover(article).await?;
        let draft_media_id = self.create_draft(article, thumb_media_id).await?;

        debug!(delay_ms = self.options.settle_delay.as_millis() as u64, "waiting for draft to settle");
        tokio::time::sleep(self.options.settle_delay).await;

        let publish_id = self.submit(&draft_media_id).await?;
        let article_url = self.poll(&publish_id).await?;

        Ok(PublishReceipt {
            draft_media_id,
            publish_id,
            article_url,
        })
    }

    async fn obtain_cover(&self, article: &ArticlePayload) -> Result<String> {
        let source = match &article.cover_url {
            Some(url) => url.clone(),
            None => self.options.placeholder_url(&article.title),
        };
        debug!(source = %source, "obtaining cover");
        self.uploader
            .upload_cover_asset(&source)
            .await
            .map_err(|e| Error::CoverUpload(Box::new(e)))
    }

    async fn create_draft(&self, article: &ArticlePayload, thumb_media_id: String) -> Result<String> {
        let token = self.tokens.get_token().await?;
        let draft = DraftArticle::new(article, thumb_media_id);
        let reply = self
            .publisher
            .create_draft(&token, &draft)
            .await
            .map_err(|e| Error::DraftCreation(e.to_string()))?;

        match reply.media_id.filter(|id| !id.is_empty()) {
            Some(media_id) if reply.status.is_ok() => {
                info!(media_id = %media_id, "draft created");
                Ok(media_id)
            }
            _ => Err(Error::DraftCreation(reply.status.describe())),
        }
    }

    async fn submit(&self, draft_media_id: &str) -> Result<String> {
        let submit_failed = |message: String| Error::PublishSubmit {
            draft_media_id: draft_media_id.to_string(),
            message,
        };

        let token = self
            .tokens
            .get_token()
            .await
            .map_err(|e| submit_failed(e.to_string()))?;
        let reply = self
            .publisher
            .submit_publish(&token, draft_media_id)
            .await
            .map_err(|e| submit_failed(e.to_string()))?;

        match reply.publish_id.filter(|id| !id.is_empty()) {
            Some(publish_id) if reply.status.is_ok() => {
                info!(publish_id = %publish_id, "publish submitted");
                Ok(publish_id)
            }
            _ => {
                warn!(draft_media_id, "publish submit failed, draft left on platform");
                Err(submit_failed(reply.status.describe()))
            }
        }
    }

    /// Polls until the job leaves the pending state or the budget runs out.
    async fn poll(&self, publish_id: &str) -> Result<Option<String>> {
        for attempt in 1..=self.options.max_polls {
            tokio::time::sleep(self.options.poll_interval).await;

            let token = self.tokens.get_token().await?;
            let reply = self.publisher.get_publish_status(&token, publish_id).await?;
            // An error reply carries no real status; its default 0 must not read as published
            if !reply.status.is_ok() {
                return Err(Error::PublishStatus {
                    publish_id: publish_id.to_string(),
                    message: reply.status.describe(),
                });
            }
            debug!(attempt, status = reply.publish_status, "publish status");

            match reply.publish_status {
                STATUS_PUBLISHED => {
                    info!(publish_id, attempt, "article published");
                    return Ok(reply.article_url());
                }
                STATUS_PENDING => continue,
                code => {
                    return Err(Error::PublishRejected {
                        publish_id: publish_id.to_string(),
                        code,
                        description: describe_publish_status(code).to_string(),
                    })
                }
            }
        }

        Err(Error::PublishTimeout {
            publish_id: publish_id.to_string(),
            attempts: self.options.max_polls,
        })
    }
}
