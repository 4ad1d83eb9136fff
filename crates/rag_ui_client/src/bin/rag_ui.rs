//! rag-ui: headless client for the RAG chatbot backend.
//! Reads config, asks one question (argument or stdin) or uploads one file,
//! and prints the rendered result to stdout. Conversation history is kept in
//! the same local store the TUI uses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_ui_client::{
    config, render, ApiClient, ChatView, Config, EntryStatus, FileStorage, SelectedFile,
    SharedStorage, UploadView,
};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Headless client for the RAG chatbot backend
#[derive(Parser)]
#[command(name = "rag-ui", version, about, long_about = None)]
struct Cli {
    /// Config file (default: $RAG_UI_CONFIG or ~/.rag-ui/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL; overrides environment and config
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question (read from stdin when omitted)
    Ask { question: Vec<String> },
    /// Upload a document for ingestion
    Upload { path: PathBuf },
    /// Print the stored conversation
    History {
        /// Delete the stored conversation instead
        #[arg(long)]
        clear: bool,
    },
    /// Print the effective configuration
    Config {
        /// Print only the config file path
        #[arg(long)]
        path: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = config::resolve_config_path(cli.config.as_deref())?;
    let cfg = config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    init_logging(&cfg);

    match cli.command {
        Commands::Config { path } => {
            if path {
                println!("{}", config_path.display());
            } else {
                print!("{}", serde_yaml::to_string(&cfg)?);
                println!(
                    "# effective base_url: {}",
                    cfg.resolve_base_url(cli.base_url.as_deref())
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::History { clear } => {
            let mut view = ChatView::with_top_k(open_store(&cfg)?, cfg.top_k());
            if clear {
                view.clear_history();
                println!("History cleared.");
            } else {
                println!("{}", render::render_history(&view));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ask { question } => {
            let question = if question.is_empty() {
                read_stdin_line()?
            } else {
                question.join(" ")
            };
            if question.trim().is_empty() {
                anyhow::bail!("no question provided (pass it as an argument or on stdin)");
            }
            let client = ApiClient::new(&cfg.resolve_base_url(cli.base_url.as_deref()))?;
            let store = open_store(&cfg)?;
            runtime()?.block_on(ask(&client, store, cfg.top_k(), &question))
        }
        Commands::Upload { path } => {
            let file = SelectedFile::from_path(&path)
                .with_context(|| format!("cannot upload {}", path.display()))?;
            let client = ApiClient::new(&cfg.resolve_base_url(cli.base_url.as_deref()))?;
            let mut view = UploadView::new(cfg.slow_upload_threshold());
            view.select_file(Some(file));
            runtime()?.block_on(upload(&client, &mut view))
        }
    }
}

async fn ask(client: &ApiClient, store: SharedStorage, top_k: u32, question: &str) -> Result<ExitCode> {
    let mut view = ChatView::with_top_k(store, top_k);
    view.submit(client, question).await;
    let entry = view
        .entries()
        .last()
        .context("question was not submitted")?;
    println!("{}", render::render_entry(entry).join("\n"));
    if entry.status() == EntryStatus::Error {
        eprintln!("Error: {}", render::answer_text(entry));
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn upload(client: &ApiClient, view: &mut UploadView) -> Result<ExitCode> {
    let job = view.begin_submit().context("no file selected")?;
    let tracker = Arc::clone(&job.progress);
    let request = client.ingest(&job.file, job.progress_callback());
    tokio::pin!(request);

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let result = loop {
        tokio::select! {
            result = &mut request => break result,
            _ = ticker.tick() => {
                eprint!("\rUploading {}: {}%", job.file.name, tracker.percent());
            }
        }
    };
    eprintln!();
    view.complete(result);

    println!("{}", render::render_upload(view));
    if view.error().is_some() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn open_store(cfg: &Config) -> Result<SharedStorage> {
    let dir = cfg
        .data_dir()
        .context("cannot determine data directory (set storage.dir in the config)")?;
    Ok(Arc::new(FileStorage::new(dir)))
}

fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read question from stdin")?;
    Ok(line.trim().to_string())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")
}

/// Logs go to stderr so stdout stays clean for the rendered result.
/// Precedence: RUST_LOG > config `logging.level` > "info".
fn init_logging(cfg: &Config) {
    let default_filter = format!("rag_ui_client={}", cfg.log_level());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}
