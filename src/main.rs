//! instructa - instruction-following chat over an OpenAI-compatible API
//!
//! Usage:
//!   instructa chat                                  → interactive console
//!   instructa batch --input data.jsonl --output out.json
//!   instructa config                                → print default config

use anyhow::Context;
use clap::{Parser, Subcommand};
use instructa::{load_jsonl, run_console, write_results, BatchProcessor};
use instructa_agent::ChatSession;
use instructa_core::ChatConfig;
use instructa_llm::{LlmProvider, OpenAiProvider, RateLimitedProvider};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "instructa",
    about = "Chat that extracts, tracks and enforces user instructions",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML config file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API key (or set INSTRUCTA_API_KEY / OPENAI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat in the terminal
    Chat,
    /// Run every record of a JSON-lines dataset
    Batch {
        /// Input dataset (one JSON object per line)
        #[arg(short, long)]
        input: PathBuf,
        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,
        /// Records processed at the same time (overrides batch.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Print the default configuration as YAML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        print!("{}", ChatConfig::default().to_yaml());
        return Ok(());
    }

    let _guard = init_tracing(cli.log_file.as_deref());

    let config = match &cli.config {
        Some(path) => ChatConfig::load(path)?,
        None => ChatConfig::default(),
    };
    let api_key = resolve_api_key(cli.api_key.as_deref(), &config);
    let config = config.with_api_key(api_key);
    if config.api.api_key.is_empty() {
        anyhow::bail!("no API key: pass --api-key or set INSTRUCTA_API_KEY / OPENAI_API_KEY");
    }
    let provider = build_provider(&config)?;

    match cli.command {
        Commands::Chat => {
            let mut session = ChatSession::new(provider, &config);
            tracing::info!("Chat session {}", session.key());
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_console(&mut session, stdin, tokio::io::stdout()).await?;
        }
        Commands::Batch { input, output, concurrency } => {
            let report = load_jsonl(&input)
                .with_context(|| format!("reading dataset {}", input.display()))?;
            let mut processor = BatchProcessor::new(provider, &config);
            if let Some(n) = concurrency {
                processor = processor.with_concurrency(n);
            }
            let results = processor.process(report.records).await;
            let failed = results.iter().filter(|r| r.is_error()).count();
            write_results(&output, &results)?;
            println!(
                "{} record(s) written to {} ({} failed, {} input line(s) skipped)",
                results.len(),
                output.display(),
                failed,
                report.skipped.len()
            );
        }
        Commands::Config => {}
    }

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| OsString::from("instructa.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "instructa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn resolve_api_key(flag: Option<&str>, config: &ChatConfig) -> String {
    flag.map(String::from)
        .or_else(|| std::env::var("INSTRUCTA_API_KEY").ok())
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| config.api.api_key.clone())
}

fn build_provider(config: &ChatConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let api = &config.api;
    let timeout = Duration::from_secs(api.timeout_secs);
    let openai = OpenAiProvider::with_timeout(api.api_key.clone(), timeout)?
        .with_base_url(api.base_url.clone());
    Ok(Arc::new(RateLimitedProvider::new(
        openai,
        api.max_concurrent_requests,
        Duration::from_millis(api.min_request_interval_ms),
    )))
}
