// ABOUTME: Error types with structured exit codes for CLI
// ABOUTME: Covers config, transport, validation and publish-workflow failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status} on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Document {0} has no content blocks")]
    EmptyContent(String),

    #[error("Invalid article: {0}")]
    InvalidArticle(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Cover upload failed: {0}")]
    CoverUpload(#[source] Box<Error>),

    #[error("Draft creation failed: {0}")]
    DraftCreation(String),

    /// The draft exists remotely but was never submitted; nothing cleans it up.
    #[error("Publish submission failed for draft {draft_media_id}: {message}")]
    PublishSubmit {
        draft_media_id: String,
        message: String,
    },

    #[error("Publish {publish_id} rejected (status {code}): {description}")]
    PublishRejected {
        publish_id: String,
        code: i64,
        description: String,
    },

    #[error("Publish status check for {publish_id} failed: {message}")]
    PublishStatus { publish_id: String, message: String },

    #[error("Publish {publish_id} still pending after {attempts} status checks")]
    PublishTimeout { publish_id: String, attempts: u32 },

    #[error("Sync of {document_id} failed: {message}")]
    SyncFailed {
        document_id: String,
        message: String,
    },
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Auth(_) => 2,
            Error::Network(_) => 3,
            Error::Api { .. } => 4,
            Error::Parse(_) => 5,
            Error::Filesystem(_) => 6,
            Error::Config(_) => 7,
            Error::Fetch(_) => 8,
            Error::EmptyContent(_) | Error::InvalidArticle(_) => 9,
            Error::Upload(_) | Error::CoverUpload(_) => 10,
            Error::DraftCreation(_)
            | Error::PublishSubmit { .. }
            | Error::PublishRejected { .. }
            | Error::PublishStatus { .. }
            | Error::PublishTimeout { .. } => 11,
            Error::SyncFailed { .. } => 12,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
