use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use ragchat_core::{
    AskRequest, Backend, Config, DocumentDirectory, HttpBackend, ProfileStore, UploadCoordinator,
    UploadFile, UploadPhase, ValidationError,
};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod markdown;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(version, about = "Terminal client for a document question-answering backend")]
struct Cli {
    /// Backend base URL (overrides RAGCHAT_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds for questions and listings
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
        /// Restrict the answer to one document id
        #[arg(short, long)]
        document: Option<String>,
    },
    /// Upload a PDF or TXT document
    Upload {
        /// Path to the file
        path: PathBuf,
    },
    /// List documents known to the backend
    Documents,
    /// Check that the backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring config file: {}", e);
        Config::new()
    });
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = Some(timeout);
    }
    let mut settings = config.transport_settings();
    if let Some(url) = &cli.base_url {
        settings.base_url = url.clone();
    }
    let backend = HttpBackend::new(settings).context("Invalid backend URL")?;

    match cli.command {
        None => {
            init_file_logging();
            run_tui(Arc::new(backend), &config).await
        }
        Some(command) => {
            init_stderr_logging();
            match command {
                Commands::Ask { question, document } => ask_once(&backend, &question, document).await,
                Commands::Upload { path } => upload_once(&backend, &path, &config).await,
                Commands::Documents => list_documents(&backend).await,
                Commands::Health => check_health(&backend).await,
            }
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The TUI owns the terminal, so logs go to a file instead.
fn init_file_logging() {
    let Some(dir) = dirs::data_local_dir().map(|dir| dir.join("ragchat")) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("ragchat.log"))
    {
        Ok(file) => file,
        Err(_) => return,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    tracing::info!("Starting ragchat v{}", env!("CARGO_PKG_VERSION"));
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

async fn run_tui(backend: Arc<dyn Backend>, config: &Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let profile_store = match ProfileStore::default_location() {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(error = %e, "no profile location, skipping onboarding");
            None
        }
    };
    let mut app = App::new(backend, events.sender(), config, profile_store);
    app.start();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn ask_once(backend: &HttpBackend, question: &str, document: Option<String>) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        return Err(ValidationError::EmptyMessage.into());
    }

    let request = AskRequest {
        question: question.to_string(),
        document_id: document,
    };
    let answer = backend.ask(&request).await?;

    println!("{}", answer.response);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  • {}", source.display());
        }
    }
    Ok(())
}

async fn upload_once(backend: &HttpBackend, path: &Path, config: &Config) -> Result<()> {
    let file = UploadFile::from_path(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;

    let mut uploads = UploadCoordinator::new(config.success_display());
    let task = uploads.start(&file)?;

    let filename = file.filename.clone();
    let sink = Arc::new(move |percent: u8| {
        eprint!("\rUploading {}... {:>3}%", filename, percent);
    });
    let outcome = backend.upload(&file, sink).await;
    eprintln!();

    match uploads.finish(task, outcome, Instant::now()) {
        Some(done) if done.phase == UploadPhase::Succeeded => {
            let message = done
                .message
                .clone()
                .unwrap_or_else(|| format!("Successfully processed {}", done.filename));
            println!("{}", message);
            Ok(())
        }
        Some(done) => bail!(
            "{}",
            done.error_message.clone().unwrap_or_else(|| "Upload failed".to_string())
        ),
        None => bail!("Upload was not tracked"),
    }
}

async fn list_documents(backend: &HttpBackend) -> Result<()> {
    let mut directory = DocumentDirectory::new();
    directory.refresh(backend).await?;

    if directory.is_empty() {
        println!("No documents uploaded yet.");
        return Ok(());
    }

    let now = Utc::now();
    for doc in directory.documents() {
        println!(
            "{:<40} {:>10}  {}",
            doc.name,
            doc.display_size(),
            doc.display_age(now)
        );
    }
    println!("\n{} document(s)", directory.len());
    Ok(())
}

async fn check_health(backend: &HttpBackend) -> Result<()> {
    let status = backend.health().await?;
    println!("{} reports status \"{}\"", backend.base_url(), status.status);
    if !status.is_healthy() {
        bail!("Backend is not healthy");
    }
    Ok(())
}
