use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "quorum",
    version,
    about = "Run one instruction against several AI models and compare the answers"
)]
pub struct Cli {
    /// YAML settings file; `QUORUM_*` env vars override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (default from config: quorum.db).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Model backend: live | fake (offline, every model answers "ok")
    #[arg(long, global = true, env = "QUORUM_BACKEND", default_value = "live", hide = true)]
    pub backend: String,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Models(ModelsArgs),
    Run(RunArgs),
    /// Print one evaluation with its per-model results
    Show(ShowArgs),
    /// List past evaluations, newest first
    History(HistoryArgs),
    Version,
}

#[derive(Parser, Clone)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub cmd: ModelsSub,
}

#[derive(Subcommand, Clone)]
pub enum ModelsSub {
    /// Register a model; the API key is stored encrypted
    Add {
        /// openai | anthropic | google
        #[arg(long)]
        provider: String,
        #[arg(long)]
        model_name: String,
        #[arg(long, env = "QUORUM_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long)]
        notes: Option<String>,
        /// Skip the live connection probe
        #[arg(long)]
        no_check: bool,
    },
    List {
        #[arg(long)]
        active: bool,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Probe the backend with the stored key
    Test { id: String },
    Enable { id: String },
    Disable { id: String },
    Remove { id: String },
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// Instruction sent to every model
    #[arg(long)]
    pub instruction: String,

    /// Model id; repeat for several models
    #[arg(long = "model", required = true)]
    pub models: Vec<String>,

    /// exact_match | partial_credit | semantic_similarity
    #[arg(long, default_value = "exact_match")]
    pub rubric: String,

    #[arg(long)]
    pub expected: Option<String>,

    /// Concept for partial_credit; repeat for several
    #[arg(long = "concept")]
    pub concepts: Vec<String>,

    #[arg(long)]
    pub system_prompt: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    /// Print the finished evaluation as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone)]
pub struct ShowArgs {
    pub id: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = 10)]
    pub page_size: u32,
    #[arg(long)]
    pub template: Option<String>,
    #[arg(long)]
    pub rubric: Option<String>,
    /// Only evaluations with at least one result scoring this or higher
    #[arg(long)]
    pub min_score: Option<f64>,
    /// YYYY-MM-DD or RFC 3339
    #[arg(long)]
    pub from: Option<String>,
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub json: bool,
}
