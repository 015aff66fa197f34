// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Defines sync, status, watch and config subcommands plus global flags

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "n2w")]
#[command(about = "Publish Notion database pages as WeChat Official Account articles", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Notion integration token (overrides env/config)
    #[arg(long, global = true)]
    pub notion_token: Option<String>,

    /// Notion API base URL
    #[arg(long, global = true)]
    pub notion_base: Option<String>,

    /// WeChat API base URL
    #[arg(long, global = true)]
    pub wechat_base: Option<String>,

    /// Override data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Disable throttling between API calls
    #[arg(long, global = true)]
    pub no_throttle: bool,

    /// Throttle range in ms (min:max)
    #[arg(long, global = true, value_parser = parse_throttle_range)]
    pub throttle_ms: Option<(u64, u64)>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_throttle_range(s: &str) -> Result<(u64, u64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected format: min:max".into());
    }

    let min = parts[0].parse().map_err(|_| "Invalid min value")?;
    let max = parts[1].parse().map_err(|_| "Invalid max value")?;

    if min > max {
        return Err("min must be <= max".into());
    }

    Ok((min, max))
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List database documents with their sync status (default)
    List,

    /// Publish one document, or every changed document with --all
    Sync(SyncArgs),

    /// Show the last recorded sync state of a document, or of all documents
    Status {
        /// Document ID
        id: Option<String>,
    },

    /// Sync changed documents on an interval until interrupted
    Watch {
        /// Minutes between runs (defaults to the configured interval)
        #[arg(long)]
        interval_minutes: Option<u64>,
    },

    /// Show or edit the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SyncArgs {
    /// Document ID to publish
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub id: Option<String>,

    /// Sync every document in the database
    #[arg(long)]
    pub all: bool,

    /// With --all, also republish documents unchanged since their last sync
    #[arg(long, requires = "all")]
    pub force: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigCommand {
    /// Print the configuration with secrets masked
    Show,

    /// Set Notion credentials
    Notion {
        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        database_id: Option<String>,
    },

    /// Set WeChat Official Account credentials
    Wechat {
        #[arg(long)]
        app_id: Option<String>,

        #[arg(long)]
        app_secret: Option<String>,
    },

    /// Set scheduled sync options
    Sync {
        #[arg(long)]
        auto_sync: Option<bool>,

        #[arg(long)]
        interval_minutes: Option<u64>,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::List)
    }

    /// Default tracing filter for the `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("n2w").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_throttle_range_valid() {
        let result = parse_throttle_range("100:300").unwrap();
        assert_eq!(result, (100, 300));
    }

    #[test]
    fn test_parse_throttle_range_invalid() {
        assert!(parse_throttle_range("300:100").is_err());
        assert!(parse_throttle_range("abc:def").is_err());
        assert!(parse_throttle_range("100").is_err());
    }

    #[test]
    fn test_default_command_is_list() {
        assert_eq!(parse(&[]).command(), Commands::List);
    }

    #[test]
    fn test_sync_single_document() {
        let cli = parse(&["sync", "abc123"]);
        assert_eq!(
            cli.command(),
            Commands::Sync(SyncArgs {
                id: Some("abc123".into()),
                all: false,
                force: false,
            })
        );
    }

    #[test]
    fn test_sync_requires_id_or_all() {
        assert!(Cli::try_parse_from(["n2w", "sync"]).is_err());
        assert!(Cli::try_parse_from(["n2w", "sync", "abc", "--all"]).is_err());
        assert!(Cli::try_parse_from(["n2w", "sync", "abc", "--force"]).is_err());

        let cli = parse(&["sync", "--all", "--force"]);
        assert_eq!(
            cli.command(),
            Commands::Sync(SyncArgs {
                id: None,
                all: true,
                force: true,
            })
        );
    }

    #[test]
    fn test_config_subcommands() {
        let cli = parse(&["config", "wechat", "--app-id", "wx1", "--app-secret", "s"]);
        assert_eq!(
            cli.command(),
            Commands::Config {
                action: ConfigCommand::Wechat {
                    app_id: Some("wx1".into()),
                    app_secret: Some("s".into()),
                }
            }
        );

        let cli = parse(&["config", "sync", "--auto-sync", "true", "--interval-minutes", "15"]);
        assert_eq!(
            cli.command(),
            Commands::Config {
                action: ConfigCommand::Sync {
                    auto_sync: Some(true),
                    interval_minutes: Some(15),
                }
            }
        );
    }

    #[test]
    fn test_global_flags_and_verbosity() {
        let cli = parse(&["-vv", "status", "d1", "--no-throttle", "--notion-base", "http://x"]);
        assert_eq!(cli.log_level(), "trace");
        assert!(cli.no_throttle);
        assert_eq!(cli.notion_base.as_deref(), Some("http://x"));
        assert_eq!(
            cli.command(),
            Commands::Status {
                id: Some("d1".into())
            }
        );
        assert_eq!(parse(&["list"]).log_level(), "info");
    }
}
