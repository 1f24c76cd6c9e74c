use super::args::*;
use anyhow::Context;
use quorum_core::config::load_config;
use quorum_core::crypto::CredentialCipher;
use quorum_core::engine::{EvaluationService, ExecutorContext, ExecutorRegistry};
use quorum_core::errors::ApiError;
use quorum_core::providers::factory::{ClientFactory, ProviderFactory};
use quorum_core::providers::fake::FakeFactory;
use quorum_core::storage::Store;
use std::sync::Arc;

pub mod history;
pub mod models;
pub mod run;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const TEST_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    if let Command::Version = cli.cmd {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(exit_codes::OK);
    }

    let service = open_service(&cli)?;
    match cli.cmd {
        Command::Models(args) => models::cmd_models(&service, args.cmd).await,
        Command::Run(args) => run::cmd_run(&service, args).await,
        Command::Show(args) => run::cmd_show(&service, args),
        Command::History(args) => history::cmd_history(&service, args),
        Command::Version => Ok(exit_codes::OK),
    }
}

fn open_service(cli: &Cli) -> anyhow::Result<EvaluationService> {
    let mut cfg = load_config(cli.config.as_deref(), false)?;
    if let Some(db) = &cli.db {
        cfg.db_path = db.clone();
    }
    ensure_parent_dir(&cfg.db_path)?;

    let cipher = CredentialCipher::from_env()?;
    let store = Store::open(&cfg.db_path, cipher)
        .with_context(|| format!("failed to open {}", cfg.db_path.display()))?;
    store.init_schema()?;

    let factory: Arc<dyn ClientFactory> = match cli.backend.as_str() {
        "live" => Arc::new(ProviderFactory),
        "fake" => Arc::new(FakeFactory::default()),
        other => anyhow::bail!("unknown backend: {} (expected live or fake)", other),
    };

    let ctx = ExecutorContext {
        store,
        factory,
        scorer: quorum_metrics::default_scorer(),
        settings: cfg.executor_settings(),
    };
    Ok(EvaluationService::new(ctx, Arc::new(ExecutorRegistry::new())))
}

/// Prints a rejected request and maps it to the usage exit code.
pub(crate) fn report_api_error(err: &ApiError) -> i32 {
    let code = serde_json::to_value(err.error)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    match &err.field {
        Some(field) => eprintln!("error: {} ({}): {}", code, field, err.message),
        None => eprintln!("error: {}: {}", code, err.message),
    }
    if let Some(details) = &err.details {
        eprintln!("  details: {}", details);
    }
    exit_codes::CONFIG_ERROR
}

fn ensure_parent_dir(path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
