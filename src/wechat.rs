// ABOUTME: Publishing service contract and its WeChat Official Account client
// ABOUTME: Raw replies keep errcode/errmsg so callers decide what is retryable

use crate::api::HttpClient;
use crate::model::ArticlePayload;
use crate::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Platform code for an invalid or expired media reference.
pub const ERR_INVALID_MEDIA_ID: i64 = 40007;

/// Error envelope shared by every platform reply; `errcode == 0` means ok.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl ApiStatus {
    pub fn is_ok(&self) -> bool {
        self.errcode == 0
    }

    pub fn describe(&self) -> String {
        if self.errmsg.is_empty() {
            format!("errcode {}", self.errcode)
        } else {
            format!("{} (errcode {})", self.errmsg, self.errcode)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenReply {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Reply of endpoints that hand back a media id (asset upload, draft creation).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaReply {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitReply {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default, deserialize_with = "string_or_number")]
    pub publish_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishedItem {
    #[serde(default)]
    pub idx: u32,
    #[serde(default)]
    pub article_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleDetail {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub item: Vec<PublishedItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishStatusReply {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub publish_status: i64,
    #[serde(default)]
    pub article_id: Option<String>,
    #[serde(default)]
    pub article_detail: Option<ArticleDetail>,
    #[serde(default)]
    pub fail_idx: Vec<i64>,
}

impl PublishStatusReply {
    pub fn article_url(&self) -> Option<String> {
        self.article_detail
            .as_ref()
            .and_then(|detail| detail.item.first())
            .map(|item| item.article_url.clone())
            .filter(|url| !url.is_empty())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Wire shape of one article inside a `draft/add` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftArticle {
    pub title: String,
    pub author: String,
    pub digest: String,
    pub content: String,
    pub content_source_url: String,
    pub thumb_media_id: String,
    pub show_cover_pic: u8,
    pub need_open_comment: u8,
    pub only_fans_can_comment: u8,
}

impl DraftArticle {
    pub fn new(article: &ArticlePayload, thumb_media_id: String) -> Self {
        DraftArticle {
            title: article.title.clone(),
            author: article.author.clone(),
            digest: article.digest.clone(),
            content: article.content.clone(),
            content_source_url: article.content_source_url.clone(),
            thumb_media_id,
            show_cover_pic: article.show_cover_pic as u8,
            need_open_comment: article.need_open_comment as u8,
            only_fans_can_comment: article.only_fans_can_comment as u8,
        }
    }
}

#[async_trait]
pub trait PublishingService: Send + Sync {
    async fn issue_token(&self, app_id: &str, secret: &str) -> Result<TokenReply>;
    async fn upload_asset(&self, token: &str, bytes: Vec<u8>) -> Result<MediaReply>;
    async fn create_draft(&self, token: &str, article: &DraftArticle) -> Result<MediaReply>;
    async fn submit_publish(&self, token: &str, media_id: &str) -> Result<SubmitReply>;
    async fn get_publish_status(&self, token: &str, publish_id: &str)
        -> Result<PublishStatusReply>;
}

pub struct WeChatClient {
    http: HttpClient,
    base_url: String,
}

impl WeChatClient {
    pub fn new(http: HttpClient, base_url: Option<String>) -> Self {
        WeChatClient {
            http,
            base_url: base_url.unwrap_or_else(|| "https://api.weixin.qq.com".into()),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl PublishingService for WeChatClient {
    async fn issue_token(&self, app_id: &str, secret: &str) -> Result<TokenReply> {
        let endpoint = "/cgi-bin/token";
        let request = self.http.client().get(self.url(endpoint)).query(&[
            ("grant_type", "client_credential"),
            ("appid", app_id),
            ("secret", secret),
        ]);
        self.http.send_json(endpoint, request).await
    }

    async fn upload_asset(&self, token: &str, bytes: Vec<u8>) -> Result<MediaReply> {
        let endpoint = "/cgi-bin/material/add_material";
        let media = Part::bytes(bytes)
            .file_name("cover.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("media", media).text(
            "description",
            json!({ "title": "cover", "introduction": "" }).to_string(),
        );
        let request = self
            .http
            .client()
            .post(self.url(endpoint))
            .query(&[("access_token", token), ("type", "image")])
            .multipart(form);
        self.http.send_json(endpoint, request).await
    }

    async fn create_draft(&self, token: &str, article: &DraftArticle) -> Result<MediaReply> {
        let endpoint = "/cgi-bin/draft/add";
        let request = self
            .http
            .client()
            .post(self.url(endpoint))
            .query(&[("access_token", token)])
            .json(&json!({ "articles": [article] }));
        self.http.send_json(endpoint, request).await
    }

    async fn submit_publish(&self, token: &str, media_id: &str) -> Result<SubmitReply> {
        let endpoint = "/cgi-bin/freepublish/submit";
        let request = self
            .http
            .client()
            .post(self.url(endpoint))
            .query(&[("access_token", token)])
            .json(&json!({ "media_id": media_id }));
        self.http.send_json(endpoint, request).await
    }

    async fn get_publish_status(
        &self,
        token: &str,
        publish_id: &str,
    ) -> Result<PublishStatusReply> {
        let endpoint = "/cgi-bin/freepublish/get";
        let request = self
            .http
            .client()
            .post(self.url(endpoint))
            .query(&[("access_token", token)])
            .json(&json!({ "publish_id": publish_id }));
        self.http.send_json(endpoint, request).await
    }
}
