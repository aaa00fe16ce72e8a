use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_i64(profile: &str, key: &str, default: i64) -> i64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Sentinel used in configuration for "no limit" / "disabled".
pub const DISABLED: i64 = -1;

// ── Batch limit ───────────────────────────────────────────────

/// Upper bound on the number of items a single task may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxTaskSize {
    #[default]
    Disabled,
    Limit(NonZeroUsize),
}

impl MaxTaskSize {
    /// Interpret a configured value: anything below 1 disables the limit.
    pub fn from_config(value: i64) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map_or(Self::Disabled, Self::Limit)
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Disabled => None,
            Self::Limit(n) => Some(n.get()),
        }
    }

    pub fn as_config(&self) -> i64 {
        self.limit().map_or(DISABLED, |n| n as i64)
    }
}

impl Serialize for MaxTaskSize {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(self.as_config())
    }
}

impl<'de> Deserialize<'de> for MaxTaskSize {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(Self::from_config(i64::deserialize(d)?))
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub tasks: TaskConfig,
    pub search: SearchConfig,
    pub registry: RegistryConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CONTENTFLOW_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CONTENTFLOW_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            tasks: TaskConfig::from_env_profiled(p),
            search: SearchConfig::from_env_profiled(p),
            registry: RegistryConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  tasks:     max_task_size={}, schedule_delay_ms={}, callback={}",
            self.tasks.max_task_size.as_config(),
            self.tasks.schedule_delay_ms,
            self.tasks.callback_base_url
        );
        tracing::info!(
            "  search:    timeout_ms={}, max_concurrency={}",
            self.search.timeout_ms,
            self.search.max_concurrency
        );
        tracing::info!("  registry:  backends_file={}", self.registry.backends_file.display());
    }

    /// Return a view safe for API responses.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "tasks": {
                "max_task_size": self.tasks.max_task_size.as_config(),
                "schedule_delay_ms": self.tasks.schedule_delay_ms,
                "callback_base_url": self.tasks.callback_base_url,
            },
            "search": {
                "timeout_ms": self.search.timeout_ms,
                "max_concurrency": self.search.max_concurrency,
            },
            "registry": { "backends_file": self.registry.backends_file },
        })
    }
}

// ── Tasks ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Items per task before a batch is split; -1 disables splitting.
    pub max_task_size: MaxTaskSize,
    /// Delay before a scheduled task is dispatched; -1 dispatches immediately.
    pub schedule_delay_ms: i64,
    /// Base URL back-ends post their results to.
    pub callback_base_url: String,
}

impl TaskConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_task_size: MaxTaskSize::from_config(profiled_env_i64(p, "MAX_TASK_SIZE", DISABLED)),
            schedule_delay_ms: profiled_env_i64(p, "TASK_SCHEDULE_DELAY_MS", DISABLED),
            callback_base_url: profiled_env_or(p, "CALLBACK_BASE_URL", "http://localhost:8080/rest/ca"),
        }
    }

    pub fn schedule_delay(&self) -> Option<Duration> {
        u64::try_from(self.schedule_delay_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Where back-ends report a finished task.
    pub fn callback_uri(&self) -> String {
        format!("{}/taskFinished", self.callback_base_url.trim_end_matches('/'))
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_task_size: MaxTaskSize::Disabled,
            schedule_delay_ms: DISABLED,
            callback_base_url: "http://localhost:8080/rest/ca".into(),
        }
    }
}

// ── Search ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Per back-end call timeout.
    pub timeout_ms: u64,
    /// Upper bound on concurrent back-end calls per search.
    pub max_concurrency: usize,
}

impl SearchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            timeout_ms: profiled_env_u64(p, "SEARCH_TIMEOUT_MS", 10_000),
            max_concurrency: profiled_env_u64(p, "SEARCH_MAX_CONCURRENCY", 16).max(1) as usize,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_concurrency: 16,
        }
    }
}

// ── Registry ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub backends_file: PathBuf,
}

impl RegistryConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backends_file: PathBuf::from(profiled_env_or(p, "BACKENDS_FILE", "config/backends.toml")),
        }
    }
}
