// ABOUTME: Document service contract and its Notion REST implementation
// ABOUTME: Maps database pages and top-level blocks into the crate's models

use crate::api::HttpClient;
use crate::model::{
    plain_text, Block, BlockKind, Document, HeadingLevel, PropertyValue, RichTextRun, UrlRef,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;

/// A value written back onto a document property.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Select(String),
    Status(String),
    Date(DateTime<Utc>),
}

/// Named property updates applied in one call.
pub type PropertyPatch = Vec<(String, PatchValue)>;

#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<Document>>;
    async fn get_properties(&self, document_id: &str) -> Result<Document>;
    async fn get_blocks(&self, document_id: &str) -> Result<Vec<Block>>;
    async fn patch_properties(&self, document_id: &str, patch: &PropertyPatch) -> Result<()>;
}

pub struct NotionClient {
    http: HttpClient,
    base_url: String,
    token: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(
        http: HttpClient,
        token: String,
        database_id: String,
        base_url: Option<String>,
    ) -> Self {
        NotionClient {
            http,
            base_url: base_url.unwrap_or_else(|| "https://api.notion.com".into()),
            token,
            database_id,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self
            .http
            .client()
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.http.send_json(endpoint, request).await
    }
}

#[derive(Deserialize)]
struct Paginated<T> {
    results: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct RawPage {
    id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    last_edited_time: Option<DateTime<Utc>>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyValue>,
}

impl From<RawPage> for Document {
    fn from(page: RawPage) -> Self {
        let title = page
            .properties
            .values()
            .find_map(|prop| match prop {
                PropertyValue::Title { title } => Some(plain_text(title)),
                _ => None,
            })
            .unwrap_or_default();

        Document {
            id: page.id,
            url: page.url,
            title,
            last_edited_time: page.last_edited_time,
            properties: page.properties,
        }
    }
}

#[derive(Deserialize)]
struct RawBlock {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    has_children: bool,
    #[serde(flatten)]
    payloads: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct BlockContent {
    #[serde(default)]
    rich_text: Vec<RichTextRun>,
    #[serde(default)]
    caption: Vec<RichTextRun>,
    #[serde(default)]
    external: Option<UrlRef>,
    #[serde(default)]
    file: Option<UrlRef>,
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        let content: BlockContent = raw
            .payloads
            .get(&raw.kind)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        let kind = match raw.kind.as_str() {
            "paragraph" => BlockKind::Paragraph(content.rich_text),
            "heading_1" => BlockKind::Heading(HeadingLevel::One, content.rich_text),
            "heading_2" => BlockKind::Heading(HeadingLevel::Two, content.rich_text),
            "heading_3" => BlockKind::Heading(HeadingLevel::Three, content.rich_text),
            "image" => BlockKind::Image {
                url: content
                    .external
                    .or(content.file)
                    .map(|r| r.url)
                    .unwrap_or_default(),
                caption: content.caption,
            },
            other => BlockKind::Unsupported(other.to_string()),
        };

        Block {
            id: raw.id,
            has_children: raw.has_children,
            kind,
        }
    }
}

fn patch_body(patch: &PropertyPatch) -> Value {
    let mut properties = Map::new();
    for (name, value) in patch {
        let encoded = match value {
            PatchValue::Select(label) => json!({ "select": { "name": label } }),
            PatchValue::Status(label) => json!({ "status": { "name": label } }),
            PatchValue::Date(at) => json!({ "date": { "start": at.to_rfc3339() } }),
        };
        properties.insert(name.clone(), encoded);
    }
    json!({ "properties": properties })
}

#[async_trait]
impl DocumentService for NotionClient {
    async fn list_documents(&self) -> Result<Vec<Document>> {
        let endpoint = format!("/v1/databases/{}/query", self.database_id);
        let mut documents = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }
            let page: Paginated<RawPage> = self.call(Method::POST, &endpoint, Some(body)).await?;
            documents.extend(page.results.into_iter().map(Document::from));

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn get_properties(&self, document_id: &str) -> Result<Document> {
        let page: RawPage = self
            .call(Method::GET, &format!("/v1/pages/{}", document_id), None)
            .await?;
        Ok(page.into())
    }

    async fn get_blocks(&self, document_id: &str) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut endpoint = format!(
                "/v1/blocks/{}/children?page_size={}",
                document_id, PAGE_SIZE
            );
            if let Some(cursor) = &cursor {
                endpoint.push_str(&format!("&start_cursor={}", cursor));
            }
            let page: Paginated<RawBlock> = self.call(Method::GET, &endpoint, None).await?;
            blocks.extend(page.results.into_iter().map(Block::from));

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    async fn patch_properties(&self, document_id: &str, patch: &PropertyPatch) -> Result<()> {
        let _: Value = self
            .call(
                Method::PATCH,
                &format!("/v1/pages/{}", document_id),
                Some(patch_body(patch)),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_page_to_document() {
        let json = r#"{
            "object": "page",
            "id": "d1",
            "url": "https://www.notion.so/d1",
            "last_edited_time": "2025-10-28T15:04:00.000Z",
            "properties": {
                "Name": {"id": "title", "type": "title", "title": [{"plain_text": "Hello"}]},
                "Tags": {"id": "t", "type": "multi_select", "multi_select": []}
            }
        }"#;
        let page: RawPage = serde_json::from_str(json).unwrap();
        let doc = Document::from(page);

        assert_eq!(doc.title, "Hello");
        assert_eq!(doc.url, "https://www.notion.so/d1");
        assert!(doc.last_edited_time.is_some());
        assert_eq!(doc.property("Tags"), Some(&PropertyValue::Unsupported));
    }

    #[test]
    fn test_raw_block_variants() {
        let json = r#"[
            {"id": "b1", "type": "heading_2", "has_children": false,
             "heading_2": {"rich_text": [{"plain_text": "Intro"}], "is_toggleable": false}},
            {"id": "b2", "type": "image", "has_children": false,
             "image": {"type": "external", "external": {"url": "https://img/x.png"},
                       "caption": [{"plain_text": "A chart"}]}},
            {"id": "b3", "type": "image", "has_children": false,
             "image": {"type": "file", "file": {"url": "https://s3/y.png", "expiry_time": "2025-10-28T16:00:00Z"},
                       "caption": []}},
            {"id": "b4", "type": "toggle", "has_children": true,
             "toggle": {"rich_text": [{"plain_text": "Hidden"}]}}
        ]"#;
        let raw: Vec<RawBlock> = serde_json::from_str(json).unwrap();
        let blocks: Vec<Block> = raw.into_iter().map(Block::from).collect();

        assert_eq!(
            blocks[0].kind,
            BlockKind::Heading(HeadingLevel::Two, vec![RichTextRun::new("Intro")])
        );
        assert_eq!(
            blocks[1].kind,
            BlockKind::Image {
                url: "https://img/x.png".into(),
                caption: vec![RichTextRun::new("A chart")],
            }
        );
        assert!(matches!(&blocks[2].kind, BlockKind::Image { url, .. } if url == "https://s3/y.png"));
        assert_eq!(blocks[3].kind, BlockKind::Unsupported("toggle".into()));
        assert!(blocks[3].has_children);
    }

    #[test]
    fn test_block_with_missing_payload_degrades() {
        let json = r#"{"id": "b1", "type": "paragraph", "has_children": false}"#;
        let raw: RawBlock = serde_json::from_str(json).unwrap();
        assert_eq!(Block::from(raw).kind, BlockKind::Paragraph(vec![]));
    }

    #[test]
    fn test_patch_body_shape() {
        let at: DateTime<Utc> = "2025-10-28T15:04:05Z".parse().unwrap();
        let patch = vec![
            ("Status".to_string(), PatchValue::Select("Published".into())),
            ("PublishTime".to_string(), PatchValue::Date(at)),
        ];
        let body = patch_body(&patch);

        assert_eq!(body["properties"]["Status"]["select"]["name"], "Published");
        assert_eq!(
            body["properties"]["PublishTime"]["date"]["start"],
            "2025-10-28T15:04:05+00:00"
        );
    }
}
