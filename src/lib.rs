// ABOUTME: Public library API for Notion to WeChat article sync
// ABOUTME: Re-exports core modules for the n2w binary and integration tests

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod notion;
pub mod publish;
pub mod state;
pub mod storage;
pub mod sync;
pub mod token;
pub mod upload;
pub mod util;
pub mod wechat;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use sync::{SyncOrchestrator, SyncReport};
