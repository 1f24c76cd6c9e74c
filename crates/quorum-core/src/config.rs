use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// Runtime settings shared by the server and the CLI.
///
/// Loaded from an optional YAML file, then overridden by `QUORUM_*` env vars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    pub db_path: PathBuf,
    pub model_timeout_ms: u64,
    pub run_timeout_ms: u64,
    pub log_level: String,
    pub max_msg_bytes: usize,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("quorum.db"),
            model_timeout_ms: DEFAULT_MODEL_TIMEOUT_MS,
            run_timeout_ms: DEFAULT_RUN_TIMEOUT_MS,
            log_level: "info".to_string(),
            max_msg_bytes: 1_000_000,
        }
    }
}

/// Deadlines applied by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub model_timeout: Duration,
    pub run_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_millis(DEFAULT_MODEL_TIMEOUT_MS),
            run_timeout: Duration::from_millis(DEFAULT_RUN_TIMEOUT_MS),
        }
    }
}

impl QuorumConfig {
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            model_timeout: Duration::from_millis(self.model_timeout_ms),
            run_timeout: Duration::from_millis(self.run_timeout_ms),
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|k| std::env::var(k).ok());
    }

    /// Unparseable numeric values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("QUORUM_DB") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(n) = lookup("QUORUM_MODEL_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.model_timeout_ms = n;
        }
        if let Some(n) = lookup("QUORUM_RUN_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.run_timeout_ms = n;
        }
        if let Some(v) = lookup("QUORUM_LOG") {
            self.log_level = v;
        }
        if let Some(n) = lookup("QUORUM_MAX_MSG_BYTES").and_then(|v| v.parse().ok()) {
            self.max_msg_bytes = n;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model_timeout_ms == 0 || self.run_timeout_ms == 0 {
            return Err(ConfigError("timeouts must be greater than zero".into()));
        }
        if self.max_msg_bytes == 0 {
            return Err(ConfigError("max_msg_bytes must be greater than zero".into()));
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str, strict: bool) -> Result<QuorumConfig, ConfigError> {
    let mut ignored_keys = Vec::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);

    let cfg: QuorumConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.push(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if !ignored_keys.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?}",
                ignored_keys
            )));
        }
        tracing::warn!(event = "config_unknown_fields", fields = ?ignored_keys);
    }

    cfg.validate()?;
    Ok(cfg)
}

/// File (when given) first, then env overrides.
pub fn load_config(path: Option<&Path>, strict: bool) -> Result<QuorumConfig, ConfigError> {
    let mut cfg = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)
                .map_err(|e| ConfigError(format!("failed to read config {}: {}", p.display(), e)))?;
            parse_config(&raw, strict)
                .map_err(|e| ConfigError(format!("{} (file: {})", e.0, p.display())))?
        }
        None => QuorumConfig::default(),
    };
    cfg.apply_env();
    cfg.validate()?;
    Ok(cfg)
}
