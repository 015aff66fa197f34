// ABOUTME: Notion integration token discovery with precedence chain
// ABOUTME: CLI flag → NOTION_API_KEY env var → config file

use crate::config::Config;
use crate::{Error, Result};
use std::env;

pub const NOTION_TOKEN_ENV: &str = "NOTION_API_KEY";

pub fn resolve_notion_token(cli_token: Option<String>, config: &Config) -> Result<String> {
    resolve_with_env(cli_token, env::var(NOTION_TOKEN_ENV).ok(), config)
}

fn resolve_with_env(
    cli_token: Option<String>,
    env_token: Option<String>,
    config: &Config,
) -> Result<String> {
    // 1. CLI flag
    if let Some(token) = cli_token.filter(|t| !t.trim().is_empty()) {
        return Ok(token);
    }

    // 2. Environment variable
    if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
        return Ok(token);
    }

    // 3. Config file
    if !config.notion.api_key.trim().is_empty() {
        return Ok(config.notion.api_key.clone());
    }

    Err(Error::Config(format!(
        "No Notion token found. Provide via --notion-token, {} env var, or `n2w config notion --api-key`",
        NOTION_TOKEN_ENV
    )))
}
