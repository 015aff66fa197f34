// ABOUTME: Credential and sync configuration with a JSON file store
// ABOUTME: Validates keys up front and merges token writes into existing config

use crate::storage::write_atomic;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub database_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeChatConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Absolute expiry of `access_token`, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default = "default_interval")]
    pub sync_interval_minutes: u64,
    #[serde(default = "default_status_property")]
    pub status_property: String,
    #[serde(default = "default_publish_time_property")]
    pub publish_time_property: String,
    #[serde(default = "default_published_label")]
    pub published_label: String,
}

fn default_interval() -> u64 {
    30
}

fn default_status_property() -> String {
    "Status".into()
}

fn default_publish_time_property() -> String {
    "PublishTime".into()
}

fn default_published_label() -> String {
    "Published".into()
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            auto_sync: false,
            sync_interval_minutes: default_interval(),
            status_property: default_status_property(),
            publish_time_property: default_publish_time_property(),
            published_label: default_published_label(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub wechat: WeChatConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    pub fn validate_notion(&self) -> Result<()> {
        if self.notion.api_key.trim().is_empty() {
            return Err(Error::Config(
                "Notion API key is not set. Run `n2w config notion --api-key <KEY>`".into(),
            ));
        }
        normalize_database_id(&self.notion.database_id).map(|_| ())
    }

    pub fn validate_wechat(&self) -> Result<()> {
        if self.wechat.app_id.trim().is_empty() || self.wechat.app_secret.trim().is_empty() {
            return Err(Error::Config(
                "WeChat app id and secret are not set. Run `n2w config wechat --app-id <ID> --app-secret <SECRET>`"
                    .into(),
            ));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_notion()?;
        self.validate_wechat()
    }
}

/// Accepts hyphenated or compact UUIDs and returns the trimmed id.
pub fn normalize_database_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Config(
            "Notion database id is not set. Run `n2w config notion --database-id <ID>`".into(),
        ));
    }
    uuid::Uuid::parse_str(trimmed)
        .map_err(|_| Error::Config(format!("Notion database id {:?} is not a valid id", trimmed)))?;
    Ok(trimmed.to_string())
}

/// Load/save access to the persisted credentials.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Config>;
    fn save(&self, config: &Config) -> Result<()>;
    /// Loads, applies `edit`, and saves as one step.
    fn update(&self, edit: &mut dyn FnMut(&mut Config)) -> Result<Config>;
}

/// `config.json` on disk. A missing file loads as the default config.
pub struct FileConfigStore {
    path: PathBuf,
    tmp_dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(path: PathBuf, tmp_dir: PathBuf) -> Self {
        FileConfigStore {
            path,
            tmp_dir,
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, config: &Config) -> Result<()> {
        fs::create_dir_all(&self.tmp_dir)?;
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, json.as_bytes(), &self.tmp_dir)
    }
}

impl CredentialStore for FileConfigStore {
    fn load(&self) -> Result<Config> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        self.read()
    }

    fn save(&self, config: &Config) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        self.write(config)
    }

    fn update(&self, edit: &mut dyn FnMut(&mut Config)) -> Result<Config> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut config = self.read()?;
        edit(&mut config);
        self.write(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> FileConfigStore {
        FileConfigStore::new(temp.path().join("config.json"), temp.path().join("tmp"))
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let config = store(&temp).load().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sync.sync_interval_minutes, 30);
        assert_eq!(config.sync.status_property, "Status");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.json"),
            r#"{"wechat": {"app_id": "wx1", "app_secret": "s"}, "sync": {"auto_sync": true}}"#,
        )
        .unwrap();

        let config = store(&temp).load().unwrap();
        assert_eq!(config.wechat.app_id, "wx1");
        assert!(config.wechat.access_token.is_none());
        assert!(config.sync.auto_sync);
        assert_eq!(config.sync.sync_interval_minutes, 30);
        assert_eq!(config.notion.api_key, "");
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut config = Config::default();
        config.wechat.access_token = Some("tok".into());
        config.wechat.token_expires_at = Some(1_700_000_000_000);
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_update_preserves_unrelated_fields() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut config = Config::default();
        config.notion.api_key = "secret_abc".into();
        store.save(&config).unwrap();

        store
            .update(&mut |c| c.wechat.app_id = "wx42".into())
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.notion.api_key, "secret_abc");
        assert_eq!(loaded.wechat.app_id, "wx42");
    }

    #[test]
    fn test_validate_reports_missing_keys() {
        let config = Config::default();
        assert!(matches!(config.validate_notion(), Err(Error::Config(_))));
        assert!(matches!(config.validate_wechat(), Err(Error::Config(_))));
    }

    #[test]
    fn test_normalize_database_id() {
        assert_eq!(
            normalize_database_id(" 8a5b2c3d4e5f60718293a4b5c6d7e8f9 ").unwrap(),
            "8a5b2c3d4e5f60718293a4b5c6d7e8f9"
        );
        assert!(normalize_database_id("8a5b2c3d-4e5f-6071-8293-a4b5c6d7e8f9").is_ok());
        assert!(matches!(
            normalize_database_id("not-a-database"),
            Err(Error::Config(_))
        ));
    }
}
