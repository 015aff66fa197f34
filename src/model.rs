// ABOUTME: Data models for documents, blocks, article payloads and sync state
// ABOUTME: Tolerant serde parsing with explicit fallbacks for unknown types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One plain-text fragment of a rich-text property or block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextRun {
    #[serde(default)]
    pub plain_text: String,
}

impl RichTextRun {
    pub fn new(text: impl Into<String>) -> Self {
        RichTextRun {
            plain_text: text.into(),
        }
    }
}

/// Visible text of a run sequence.
pub fn plain_text(runs: &[RichTextRun]) -> String {
    runs.iter().map(|run| run.plain_text.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateValue {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRef {
    pub url: String,
}

/// Entry of a `files` property: either an external link or a hosted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub external: Option<UrlRef>,
    #[serde(default)]
    pub file: Option<UrlRef>,
}

impl FileRef {
    pub fn url(&self) -> Option<&str> {
        self.external
            .as_ref()
            .or(self.file.as_ref())
            .map(|r| r.url.as_str())
    }
}

/// A named document property, tagged by its remote type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichTextRun>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichTextRun>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    Status {
        #[serde(default)]
        status: Option<SelectOption>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    Url {
        #[serde(default)]
        url: Option<String>,
    },
    Files {
        #[serde(default)]
        files: Vec<FileRef>,
    },
    #[serde(other)]
    Unsupported,
}

impl PropertyValue {
    /// Concatenated text for text-like properties, empty for everything else.
    pub fn text(&self) -> String {
        match self {
            PropertyValue::Title { title } => plain_text(title),
            PropertyValue::RichText { rich_text } => plain_text(rich_text),
            PropertyValue::Select { select } | PropertyValue::Status { status: select } => select
                .as_ref()
                .map(|option| option.name.clone())
                .unwrap_or_default(),
            PropertyValue::Date { date } => date
                .as_ref()
                .map(|d| d.start.clone())
                .unwrap_or_default(),
            PropertyValue::Url { url } => url.clone().unwrap_or_default(),
            PropertyValue::Files { .. } | PropertyValue::Unsupported => String::new(),
        }
    }

    /// First link carried by a url or files property.
    pub fn link(&self) -> Option<&str> {
        match self {
            PropertyValue::Url { url } => url.as_deref().filter(|u| !u.is_empty()),
            PropertyValue::Files { files } => files.iter().find_map(FileRef::url),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub last_edited_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Document {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Text of the named property, empty if the property is absent.
    pub fn property_text(&self, name: &str) -> String {
        self.property(name).map(PropertyValue::text).unwrap_or_default()
    }

    /// Current publish status label, read from the configured property.
    pub fn publish_status(&self, property: &str) -> Option<String> {
        Some(self.property_text(property)).filter(|s| !s.is_empty())
    }

    /// Current publish time, read from the configured property.
    pub fn publish_time(&self, property: &str) -> Option<String> {
        match self.property(property) {
            Some(PropertyValue::Date { date: Some(date) }) => Some(date.start.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    One,
    Two,
    Three,
}

impl HeadingLevel {
    pub fn tag(self) -> &'static str {
        match self {
            HeadingLevel::One => "h1",
            HeadingLevel::Two => "h2",
            HeadingLevel::Three => "h3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph(Vec<RichTextRun>),
    Heading(HeadingLevel, Vec<RichTextRun>),
    Image {
        url: String,
        caption: Vec<RichTextRun>,
    },
    /// Any block type without a markup mapping; keeps the remote type tag.
    Unsupported(String),
}

/// One top-level content node. Children are never fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: String,
    pub has_children: bool,
    pub kind: BlockKind,
}

impl Block {
    pub fn paragraph(id: impl Into<String>, text: &str) -> Self {
        Block {
            id: id.into(),
            has_children: false,
            kind: BlockKind::Paragraph(vec![RichTextRun::new(text)]),
        }
    }

    pub fn heading(id: impl Into<String>, level: HeadingLevel, text: &str) -> Self {
        Block {
            id: id.into(),
            has_children: false,
            kind: BlockKind::Heading(level, vec![RichTextRun::new(text)]),
        }
    }

    pub fn image(id: impl Into<String>, url: &str, caption: Option<&str>) -> Self {
        Block {
            id: id.into(),
            has_children: false,
            kind: BlockKind::Image {
                url: url.to_string(),
                caption: caption.map(RichTextRun::new).into_iter().collect(),
            },
        }
    }
}

/// Publish-ready article. Built per sync attempt, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticlePayload {
    pub title: String,
    pub author: String,
    pub digest: String,
    pub content: String,
    /// Source URL of an explicit cover image, if the document names one.
    pub cover_url: Option<String>,
    pub content_source_url: String,
    pub show_cover_pic: bool,
    pub need_open_comment: bool,
    pub only_fans_can_comment: bool,
}

impl ArticlePayload {
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::Error::InvalidArticle("title is empty".into()));
        }
        if self.content.trim().is_empty() {
            return Err(crate::Error::InvalidArticle("body is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Success,
    Failed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub document_id: String,
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Set when the publish succeeded but the source document was not updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_url: Option<String>,
}

impl SyncState {
    pub fn pending(document_id: &str) -> Self {
        SyncState {
            document_id: document_id.to_string(),
            status: SyncStatus::Pending,
            error: None,
            last_sync_time: None,
            warning: None,
            publish_id: None,
            article_url: None,
        }
    }

    pub fn syncing(document_id: &str) -> Self {
        SyncState {
            status: SyncStatus::Syncing,
            last_sync_time: Some(Utc::now()),
            ..SyncState::pending(document_id)
        }
    }

    pub fn failed(document_id: &str, message: impl Into<String>) -> Self {
        SyncState {
            status: SyncStatus::Failed,
            error: Some(message.into()),
            last_sync_time: Some(Utc::now()),
            ..SyncState::pending(document_id)
        }
    }

    pub fn succeeded(document_id: &str, publish_id: String, article_url: Option<String>) -> Self {
        SyncState {
            status: SyncStatus::Success,
            last_sync_time: Some(Utc::now()),
            publish_id: Some(publish_id),
            article_url,
            ..SyncState::pending(document_id)
        }
    }
}
