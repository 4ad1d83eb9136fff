use anyhow::{Context, Result};
use clap::Parser;
use rag_ui_client::{config, ApiClient, Config, FileStorage, SharedStorage};
use rag_ui_tui::app::App;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "rag-ui-tui.log";

/// RAG chatbot terminal shell
#[derive(Parser)]
#[command(name = "rag-ui-tui", version, about, long_about = None)]
struct Args {
    /// Config file (default: $RAG_UI_CONFIG or ~/.rag-ui/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL; overrides environment and config
    #[arg(long)]
    base_url: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = config::resolve_config_path(args.config.as_deref())?;
    let cfg = config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let data_dir = cfg
        .data_dir()
        .context("cannot determine data directory (set storage.dir in the config)")?;

    // Must stay alive until exit so buffered log lines get flushed.
    let _log_guard = init_logging(&cfg, &data_dir);

    let store: SharedStorage = Arc::new(FileStorage::new(&data_dir));
    let base_url = cfg.resolve_base_url(args.base_url.as_deref());
    let client = ApiClient::new(&base_url)?;
    tracing::info!(%base_url, data_dir = %data_dir.display(), "starting shell");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    runtime.block_on(async {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(client, store, &cfg, tx);
        rag_ui_tui::run(app, rx).await
    })
}

/// The terminal belongs to the UI, so logs go to a JSON file in the data directory.
/// Precedence: RUST_LOG > config `logging.level` > "info".
fn init_logging(cfg: &Config, data_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        eprintln!(
            "Warning: could not create data directory {}: {}",
            data_dir.display(),
            e
        );
        return None;
    }
    let default_filter = format!(
        "rag_ui_client={level},rag_ui_tui={level}",
        level = cfg.log_level()
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let file_appender = tracing_appender::rolling::never(data_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();
    Some(guard)
}
