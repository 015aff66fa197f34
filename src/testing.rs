// ABOUTME: In-memory fakes of the remote services and stores for unit tests
// ABOUTME: Scripted reply queues with call counters for verification

use crate::config::{Config, CredentialStore};
use crate::model::{ArticlePayload, Block, Document};
use crate::notion::{DocumentService, PropertyPatch};
use crate::upload::AssetFetcher;
use crate::wechat::{
    ArticleDetail, DraftArticle, MediaReply, PublishStatusReply, PublishedItem, PublishingService,
    SubmitReply, TokenReply,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Config with both remote systems configured.
pub fn configured() -> Config {
    let mut config = Config::default();
    config.notion.api_key = "secret_test".into();
    config.notion.database_id = "8a5b2c3d4e5f60718293a4b5c6d7e8f9".into();
    config.wechat.app_id = "wx_test".into();
    config.wechat.app_secret = "app_secret".into();
    config
}

pub fn sample_article() -> ArticlePayload {
    ArticlePayload {
        title: "Hello".into(),
        author: String::new(),
        digest: String::new(),
        content: "<p>World</p>".into(),
        cover_url: None,
        content_source_url: "https://www.notion.so/d1".into(),
        show_cover_pic: true,
        need_open_comment: true,
        only_fans_can_comment: false,
    }
}

pub fn status(code: i64) -> PublishStatusReply {
    PublishStatusReply {
        publish_status: code,
        ..PublishStatusReply::default()
    }
}

pub struct MemoryStore {
    config: Mutex<Config>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(config: Config) -> Self {
        MemoryStore {
            config: Mutex::new(config),
            saves: Mutex::new(0),
        }
    }

    /// Number of whole-config `save` calls, excluding `update`.
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Config> {
        Ok(self.config.lock().unwrap().clone())
    }

    fn save(&self, config: &Config) -> Result<()> {
        *self.saves.lock().unwrap() += 1;
        *self.config.lock().unwrap() = config.clone();
        Ok(())
    }

    fn update(&self, edit: &mut dyn FnMut(&mut Config)) -> Result<Config> {
        let mut config = self.config.lock().unwrap();
        edit(&mut config);
        Ok(config.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherCalls {
    pub token: usize,
    pub upload: usize,
    pub draft: usize,
    pub submit: usize,
    pub status: usize,
}

#[derive(Default)]
struct PublisherInner {
    calls: PublisherCalls,
    token_reply: Option<TokenReply>,
    uploads: VecDeque<MediaReply>,
    upload_failures: u32,
    drafts_replies: VecDeque<MediaReply>,
    submits: VecDeque<SubmitReply>,
    statuses: VecDeque<PublishStatusReply>,
    drafts: Vec<DraftArticle>,
}

/// Publishing service that succeeds unless a reply is queued.
#[derive(Default)]
pub struct FakePublisher {
    inner: Mutex<PublisherInner>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> PublisherCalls {
        self.inner.lock().unwrap().calls
    }

    pub fn drafts(&self) -> Vec<DraftArticle> {
        self.inner.lock().unwrap().drafts.clone()
    }

    pub fn set_token_reply(&self, reply: TokenReply) {
        self.inner.lock().unwrap().token_reply = Some(reply);
    }

    pub fn push_upload(&self, reply: MediaReply) {
        self.inner.lock().unwrap().uploads.push_back(reply);
    }

    /// Makes the next `count` uploads fail in transport.
    pub fn fail_uploads(&self, count: u32) {
        self.inner.lock().unwrap().upload_failures = count;
    }

    pub fn push_draft(&self, reply: MediaReply) {
        self.inner.lock().unwrap().drafts_replies.push_back(reply);
    }

    pub fn push_submit(&self, reply: SubmitReply) {
        self.inner.lock().unwrap().submits.push_back(reply);
    }

    pub fn push_status(&self, reply: PublishStatusReply) {
        self.inner.lock().unwrap().statuses.push_back(reply);
    }
}

#[async_trait]
impl PublishingService for FakePublisher {
    async fn issue_token(&self, _app_id: &str, _secret: &str) -> Result<TokenReply> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.token += 1;
        Ok(inner.token_reply.clone().unwrap_or(TokenReply {
            access_token: Some("fresh-token".into()),
            expires_in: Some(7200),
            ..TokenReply::default()
        }))
    }

    async fn upload_asset(&self, _token: &str, _bytes: Vec<u8>) -> Result<MediaReply> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.upload += 1;
        if inner.upload_failures > 0 {
            inner.upload_failures -= 1;
            return Err(Error::Api {
                endpoint: "/cgi-bin/material/add_material".into(),
                status: 502,
                message: "Bad Gateway".into(),
            });
        }
        Ok(inner.uploads.pop_front().unwrap_or(MediaReply {
            media_id: Some("thumb-1".into()),
            ..MediaReply::default()
        }))
    }

    async fn create_draft(&self, _token: &str, article: &DraftArticle) -> Result<MediaReply> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.draft += 1;
        inner.drafts.push(article.clone());
        Ok(inner.drafts_replies.pop_front().unwrap_or(MediaReply {
            media_id: Some("draft-1".into()),
            ..MediaReply::default()
        }))
    }

    async fn submit_publish(&self, _token: &str, _media_id: &str) -> Result<SubmitReply> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.submit += 1;
        Ok(inner.submits.pop_front().unwrap_or(SubmitReply {
            publish_id: Some("publish-1".into()),
            ..SubmitReply::default()
        }))
    }

    async fn get_publish_status(
        &self,
        _token: &str,
        _publish_id: &str,
    ) -> Result<PublishStatusReply> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.status += 1;
        Ok(inner.statuses.pop_front().unwrap_or(PublishStatusReply {
            publish_status: 0,
            article_detail: Some(ArticleDetail {
                count: 1,
                item: vec![PublishedItem {
                    idx: 1,
                    article_url: "https://mp.weixin.qq.com/s/published".into(),
                }],
            }),
            ..PublishStatusReply::default()
        }))
    }
}

/// Image source returning fixed bytes, optionally failing the next N fetches.
#[derive(Default)]
pub struct FakeFetcher {
    fetched: Mutex<Vec<String>>,
    failures: Mutex<u32>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: u32) {
        *self.failures.lock().unwrap() = count;
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(url.to_string());
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(Error::Fetch(format!("unreachable: {}", url)));
        }
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0])
    }
}

#[derive(Default)]
struct DocumentsInner {
    documents: HashMap<String, Document>,
    blocks: HashMap<String, Vec<Block>>,
    patches: Vec<(String, PropertyPatch)>,
    fail_patch: bool,
    delay: Duration,
}

#[derive(Default)]
pub struct FakeDocuments {
    inner: Mutex<DocumentsInner>,
}

impl FakeDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: Document, blocks: Vec<Block>) {
        let mut inner = self.inner.lock().unwrap();
        inner.blocks.insert(document.id.clone(), blocks);
        inner.documents.insert(document.id.clone(), document);
    }

    /// Slows every property fetch down by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().delay = delay;
    }

    pub fn fail_patches(&self) {
        self.inner.lock().unwrap().fail_patch = true;
    }

    pub fn patches(&self) -> Vec<(String, PropertyPatch)> {
        self.inner.lock().unwrap().patches.clone()
    }
}

#[async_trait]
impl DocumentService for FakeDocuments {
    async fn list_documents(&self) -> Result<Vec<Document>> {
        let inner = self.inner.lock().unwrap();
        let mut documents: Vec<Document> = inner.documents.values().cloned().collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    async fn get_properties(&self, document_id: &str) -> Result<Document> {
        let delay = self.inner.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| Error::Api {
                endpoint: format!("/v1/pages/{}", document_id),
                status: 404,
                message: "object_not_found".into(),
            })
    }

    async fn get_blocks(&self, document_id: &str) -> Result<Vec<Block>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .blocks
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn patch_properties(&self, document_id: &str, patch: &PropertyPatch) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_patch {
            return Err(Error::Api {
                endpoint: format!("/v1/pages/{}", document_id),
                status: 400,
                message: "validation_error".into(),
            });
        }
        inner.patches.push((document_id.to_string(), patch.clone()));
        // Writing properties counts as an edit, like it does remotely
        if let Some(document) = inner.documents.get_mut(document_id) {
            document.last_edited_time = Some(Utc::now());
        }
        Ok(())
    }
}
