// ABOUTME: CLI entrypoint for the n2w command
// ABOUTME: Wires clients and stores, dispatches commands, maps errors to exit codes

use clap::Parser;
use notion2wechat::{
    api::HttpClient,
    auth::resolve_notion_token,
    cli::{Cli, Commands, ConfigCommand, SyncArgs},
    config::{normalize_database_id, Config, CredentialStore, FileConfigStore},
    model::{SyncState, SyncStatus},
    notion::NotionClient,
    publish::{PublishDriver, PublishOptions},
    state::{FileStateStore, SyncStateStore},
    storage::Paths,
    sync::SyncOrchestrator,
    token::TokenCache,
    upload::AssetUploader,
    util::mask_secret,
    wechat::WeChatClient,
    Error, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    if let Err(e) = run(cli).await {
        eprintln!("n2w: [E{}] {}", e.exit_code(), e);
        std::process::exit(e.exit_code());
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let paths = Paths::new(cli.data_dir.clone())?;
    paths.ensure_dirs()?;
    let store = Arc::new(FileConfigStore::new(
        paths.config_file.clone(),
        paths.tmp_dir.clone(),
    ));

    match cli.command() {
        Commands::Config { action } => configure(&store, action),
        Commands::Status { id } => {
            let states = FileStateStore::open(paths.state_file.clone(), paths.tmp_dir.clone())?;
            match id {
                Some(id) => {
                    let state = states.get(&id).unwrap_or_else(|| SyncState::pending(&id));
                    print_state(&state);
                }
                None => {
                    let all = states.all();
                    if all.is_empty() {
                        println!("No documents synced yet");
                    }
                    for state in &all {
                        print_state(state);
                    }
                }
            }
            Ok(())
        }
        Commands::List => {
            let (orchestrator, config) = build_orchestrator(&cli, &paths, store, false)?;
            let documents = orchestrator.list_documents().await?;
            for doc in &documents {
                let state = orchestrator.get_state(&doc.id);
                let remote = doc
                    .publish_status(&config.sync.status_property)
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{}  {:<8}  {:<12}  {}",
                    doc.id, state.status, remote, doc.title
                );
            }
            println!("{} documents", documents.len());
            Ok(())
        }
        Commands::Sync(SyncArgs { id, all, force }) => {
            let (orchestrator, _) = build_orchestrator(&cli, &paths, store, true)?;
            match id {
                Some(id) if !all => {
                    let state = orchestrator.sync_document(&id).await;
                    print_state(&state);
                    if state.status == SyncStatus::Failed {
                        return Err(Error::SyncFailed {
                            document_id: id,
                            message: state.error.unwrap_or_default(),
                        });
                    }
                }
                _ => {
                    let report = orchestrator.sync_all(force).await?;
                    println!(
                        "Synced {}, failed {}, skipped {}",
                        report.synced, report.failed, report.skipped
                    );
                    if report.failed > 0 {
                        return Err(Error::SyncFailed {
                            document_id: "database".into(),
                            message: format!("{} documents failed", report.failed),
                        });
                    }
                }
            }
            Ok(())
        }
        Commands::Watch { interval_minutes } => {
            let (orchestrator, config) = build_orchestrator(&cli, &paths, store, true)?;
            let minutes = interval_minutes
                .unwrap_or(config.sync.sync_interval_minutes)
                .max(1);
            println!("Watching every {} minutes; press Ctrl-C to stop", minutes);
            orchestrator
                .watch(Duration::from_secs(minutes * 60), async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
        }
    }
}

fn build_orchestrator(
    cli: &Cli,
    paths: &Paths,
    store: Arc<FileConfigStore>,
    publishing: bool,
) -> Result<(SyncOrchestrator, Config)> {
    let mut config = store.load()?;
    // The resolved token may come from the flag or env; it is never written back
    config.notion.api_key = resolve_notion_token(cli.notion_token.clone(), &config)?;
    if publishing {
        config.validate()?;
    } else {
        config.validate_notion()?;
    }
    let notion_token = config.notion.api_key.clone();
    let database_id = normalize_database_id(&config.notion.database_id)?;

    let mut http = HttpClient::new()?;
    if cli.no_throttle {
        http = http.disable_throttle();
    } else if let Some((min, max)) = cli.throttle_ms {
        http = http.with_throttle(min, max);
    }

    let notion = Arc::new(NotionClient::new(
        http.clone(),
        notion_token,
        database_id,
        cli.notion_base.clone(),
    ));
    let wechat = Arc::new(WeChatClient::new(http.clone(), cli.wechat_base.clone()));

    let tokens = Arc::new(TokenCache::new(store, wechat.clone()));
    let uploader = AssetUploader::new(tokens.clone(), wechat.clone(), Arc::new(http));
    let driver = PublishDriver::new(tokens, uploader, wechat, PublishOptions::default());
    let states = Arc::new(FileStateStore::open(
        paths.state_file.clone(),
        paths.tmp_dir.clone(),
    )?);

    let orchestrator = SyncOrchestrator::new(notion, driver, states, config.sync.clone());
    Ok((orchestrator, config))
}

fn configure(store: &FileConfigStore, action: ConfigCommand) -> Result<()> {
    let config = match action {
        ConfigCommand::Show => store.load()?,
        ConfigCommand::Notion {
            mut api_key,
            database_id,
        } => {
            let mut database_id = database_id
                .map(|id| normalize_database_id(&id))
                .transpose()?;
            store.update(&mut |config| {
                if let Some(key) = api_key.take() {
                    config.notion.api_key = key;
                }
                if let Some(id) = database_id.take() {
                    config.notion.database_id = id;
                }
            })?
        }
        ConfigCommand::Wechat {
            mut app_id,
            mut app_secret,
        } => store.update(&mut |config| {
            let changed = app_id.is_some() || app_secret.is_some();
            if let Some(id) = app_id.take() {
                config.wechat.app_id = id;
            }
            if let Some(secret) = app_secret.take() {
                config.wechat.app_secret = secret;
            }
            // A cached token belongs to the old credentials
            if changed {
                config.wechat.access_token = None;
                config.wechat.token_expires_at = None;
            }
        })?,
        ConfigCommand::Sync {
            auto_sync,
            interval_minutes,
        } => store.update(&mut |config| {
            if let Some(enabled) = auto_sync {
                config.sync.auto_sync = enabled;
            }
            if let Some(minutes) = interval_minutes {
                config.sync.sync_interval_minutes = minutes.max(1);
            }
        })?,
    };

    print_config(&config);
    Ok(())
}

fn print_config(config: &Config) {
    println!("notion.api_key         {}", mask_secret(&config.notion.api_key));
    println!("notion.database_id     {}", config.notion.database_id);
    println!("wechat.app_id          {}", config.wechat.app_id);
    println!("wechat.app_secret      {}", mask_secret(&config.wechat.app_secret));
    println!("sync.auto_sync         {}", config.sync.auto_sync);
    println!("sync.interval_minutes  {}", config.sync.sync_interval_minutes);
    println!("sync.status_property   {}", config.sync.status_property);
}

fn print_state(state: &SyncState) {
    println!("{}  {}", state.document_id, state.status);
    if let Some(at) = state.last_sync_time {
        println!("  last sync: {}", at.to_rfc3339());
    }
    if let Some(url) = &state.article_url {
        println!("  article:   {}", url);
    }
    if let Some(error) = &state.error {
        println!("  error:     {}", error);
    }
    if let Some(warning) = &state.warning {
        println!("  warning:   {}", warning);
    }
}
