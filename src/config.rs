use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PonderConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub cognition: CognitionConfig,
    pub memory: MemoryConfig,
    pub workflow: WorkflowConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base filter level for everything not listed in `components`.
    pub level: String,
    /// Per-component overrides, keyed by module name under the crate
    /// (e.g. `workflow = "debug"` becomes `ponder::workflow=debug`).
    pub components: BTreeMap<String, String>,
    /// Also write plain-text logs to `<data_dir>/logs/ponder_YYYYMMDD.log`.
    pub file: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CognitionConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub request_timeout_secs: u64,
    pub check_on_startup: bool,
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub provider: String,
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkflowConfig {
    pub quality_threshold: f64,
    pub score_window: usize,
    pub research_max_questions: usize,
    pub compress_after_days: u32,
    pub evaluate_days: usize,
    pub new_questions: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub grace_period_secs: u64,
    pub daily_reflection_hours: f64,
    pub weekly_compression_hours: f64,
    pub weekly_research_hours: f64,
    pub daily_automation_loop_hours: f64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            components: BTreeMap::new(),
            file: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_ponder_dir().to_string_lossy().into_owned(),
        }
    }
}

impl Default for CognitionConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            base_url: "http://localhost:11434".into(),
            model: "llama3.1:8b".into(),
            system_prompt: "You are a personal second brain. Give concise, insightful answers \
                            grounded in the provided context."
                .into(),
            request_timeout_secs: 300,
            check_on_startup: true,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            provider: "local".into(),
            top_k: 3,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 6.0,
            score_window: 4,
            research_max_questions: 2,
            compress_after_days: 14,
            evaluate_days: 7,
            new_questions: 3,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 30,
            daily_reflection_hours: 24.0,
            weekly_compression_hours: 168.0,
            weekly_research_hours: 168.0,
            daily_automation_loop_hours: 24.0,
        }
    }
}

impl SchedulerConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

/// Returns `~/.ponder/`
pub fn default_ponder_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ponder")
}

/// Returns the default config file path: `~/.ponder/config.toml`
pub fn default_config_path() -> PathBuf {
    default_ponder_dir().join("config.toml")
}

impl PonderConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            PonderConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (PONDER_DATA_DIR, PONDER_LOG_LEVEL, PONDER_OLLAMA_URL, PONDER_MODEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PONDER_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("PONDER_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PONDER_OLLAMA_URL") {
            self.cognition.base_url = val;
        }
        if let Ok(val) = std::env::var("PONDER_MODEL") {
            self.cognition.model = val;
        }
    }

    /// `tracing_subscriber::EnvFilter` directives: the base level followed by
    /// one `ponder::<component>=<level>` directive per override.
    pub fn log_directives(&self) -> String {
        let mut directives = vec![self.logging.level.clone()];
        for (component, level) in &self.logging.components {
            directives.push(format!("ponder::{component}={level}"));
        }
        directives.join(",")
    }

    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.data_dir().join("insights.db")
    }

    pub fn reflections_dir(&self) -> PathBuf {
        self.data_dir().join("reflections")
    }

    pub fn compressed_dir(&self) -> PathBuf {
        self.data_dir().join("compressed")
    }

    pub fn questions_path(&self) -> PathBuf {
        self.data_dir().join("questions").join("open_questions.md")
    }

    pub fn scores_path(&self) -> PathBuf {
        self.data_dir().join("metrics").join("self_scores.csv")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
