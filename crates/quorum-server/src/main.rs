use anyhow::{Context, Result};
use clap::Parser;
use quorum_core::config::load_config;
use quorum_core::crypto::CredentialCipher;
use quorum_core::engine::{EvaluationService, ExecutorContext, ExecutorRegistry};
use quorum_core::providers::factory::ProviderFactory;
use quorum_core::storage::Store;
use quorum_server::methods::MethodContext;
use quorum_server::server::Server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML settings file; `QUORUM_*` env vars override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path.
    #[arg(long)]
    db: Option<PathBuf>,
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr) // stdout carries responses
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = load_config(args.config.as_deref(), false)?;
    if let Some(db) = args.db {
        cfg.db_path = db;
    }

    init_logging(&cfg.log_level);

    let cipher = CredentialCipher::from_env()?;
    let store = Store::open(&cfg.db_path, cipher)
        .with_context(|| format!("opening {}", cfg.db_path.display()))?;
    store.init_schema()?;

    let ctx = ExecutorContext {
        store,
        factory: Arc::new(ProviderFactory),
        scorer: quorum_metrics::default_scorer(),
        settings: cfg.executor_settings(),
    };
    let service = EvaluationService::new(ctx, Arc::new(ExecutorRegistry::new()));

    tracing::info!(event = "server_start", config = ?cfg);

    Server::new(MethodContext { service }, cfg.max_msg_bytes)
        .run()
        .await
}
