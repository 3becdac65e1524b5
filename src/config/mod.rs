//! Daemon configuration.
//!
//! Priority (highest to lowest): CLI / env var > `{data_dir}/config.toml` >
//! built-in default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_WEEKLY_GOAL_MINUTES: i64 = 600;
const DEFAULT_GENERATION_MODEL: &str = "gpt-4o";

// ─── Sub-configs ──────────────────────────────────────────────────────────────

/// Observability settings (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds).
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

/// Text-generation collaborator settings (`[generation]` in config.toml).
///
/// No endpoint means generation is disabled — jobs that need it degrade and
/// log instead of failing the daemon.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible chat endpoint.
    pub endpoint: Option<String>,
    pub model: String,
    /// Bearer token. Usually supplied via STUDYD_GENERATION_KEY instead.
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: DEFAULT_GENERATION_MODEL.to_string(),
            api_key: None,
        }
    }
}

/// Background job cadence (`[jobs]` in config.toml). Hours are UTC.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Hour the daily briefing fires.
    pub intel_hour: u32,
    pub nudge_morning_hour: u32,
    pub nudge_afternoon_hour: u32,
    pub nudge_evening_hour: u32,
    /// Minutes between coaching regeneration / exam threshold scans.
    pub coaching_interval_mins: u64,
    /// Minutes between expired-message sweeps.
    pub sweep_interval_mins: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            intel_hour: 7,
            nudge_morning_hour: 10,
            nudge_afternoon_hour: 14,
            nudge_evening_hour: 18,
            coaching_interval_mins: 60,
            sweep_interval_mins: 30,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Log level filter string, e.g. "debug", "info,studyd=trace".
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
    /// Weekly study goal applied to users without an explicit goal.
    default_weekly_goal: Option<i64>,
    observability: Option<ObservabilityConfig>,
    generation: Option<GenerationConfig>,
    jobs: Option<JobsConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── StudydConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StudydConfig {
    pub data_dir: PathBuf,
    pub log: String,
    pub log_format: String,
    pub default_weekly_goal: i64,
    pub observability: ObservabilityConfig,
    pub generation: GenerationConfig,
    pub jobs: JobsConfig,
}

impl StudydConfig {
    /// Build config from CLI/env args plus the optional TOML file.
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("STUDYD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let default_weekly_goal = toml
            .default_weekly_goal
            .unwrap_or(DEFAULT_WEEKLY_GOAL_MINUTES);

        let mut generation = toml.generation.unwrap_or_default();
        if let Ok(endpoint) = std::env::var("STUDYD_GENERATION_URL") {
            if !endpoint.is_empty() {
                generation.endpoint = Some(endpoint);
            }
        }
        if let Ok(model) = std::env::var("STUDYD_GENERATION_MODEL") {
            if !model.is_empty() {
                generation.model = model;
            }
        }
        if let Ok(key) = std::env::var("STUDYD_GENERATION_KEY") {
            if !key.is_empty() {
                generation.api_key = Some(key);
            }
        }

        Self {
            data_dir,
            log,
            log_format,
            default_weekly_goal,
            observability: toml.observability.unwrap_or_default(),
            generation,
            jobs: toml.jobs.unwrap_or_default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("studyd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("studyd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("studyd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("studyd");
        }
    }
    PathBuf::from(".studyd")
}
