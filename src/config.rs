//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default seconds between violation DMs to the same sender.
pub const DEFAULT_DM_COOLDOWN_SECS: u64 = 60;

/// Per-group enforcement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModerationConfig {
    /// Log violations without deleting or notifying.
    pub observation_mode: bool,
    /// Group admins bypass every guard.
    pub admin_exempt: bool,
    /// Minimum seconds between violation DMs to the same sender.
    pub dm_cooldown_seconds: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            observation_mode: true,
            admin_exempt: true,
            dm_cooldown_seconds: DEFAULT_DM_COOLDOWN_SECS,
        }
    }
}

/// One guard enabled (or disabled) on a group, with guard-specific params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    pub guard_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl GuardConfig {
    /// Enabled config with no params.
    pub fn new(guard_id: &str) -> Self {
        Self {
            guard_id: guard_id.to_string(),
            enabled: true,
            params: serde_json::Map::new(),
        }
    }

    /// Enabled config with params taken from a JSON object. Non-object
    /// values are ignored.
    pub fn with_params(guard_id: &str, params: serde_json::Value) -> Self {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            guard_id: guard_id.to_string(),
            enabled: true,
            params,
        }
    }

    /// Same config, disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// How the keyword filter keys its compiled-pattern cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyPolicy {
    /// Key on list lengths only. Equal-length edits reuse stale matchers.
    #[default]
    ListLength,
    /// Key on a hash of the list contents.
    ContentHash,
}

impl std::str::FromStr for CacheKeyPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "length" | "list_length" => Ok(Self::ListLength),
            "content" | "content_hash" => Ok(Self::ContentHash),
            other => Err(ConfigError::InvalidValue {
                key: "GROUPGUARD_PATTERN_CACHE_KEY".into(),
                message: format!("expected 'length' or 'content', got '{other}'"),
            }),
        }
    }
}

/// Process configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Violation log database file.
    pub db_path: PathBuf,
    /// JSON file with per-group guard policies.
    pub policy_path: PathBuf,
    /// Port for the guard catalog API.
    pub api_port: u16,
    /// Prefix used on bot-sent messages; bot echoes are never moderated.
    pub assistant_name: String,
    pub pattern_cache_key: CacheKeyPolicy,
    /// How often expired rate-limit entries are swept.
    pub sweep_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/groupguard.db"),
            policy_path: PathBuf::from("./groupguard.json"),
            api_port: 8080,
            assistant_name: "Guard".to_string(),
            pattern_cache_key: CacheKeyPolicy::default(),
            sweep_interval: Duration::from_secs(600), // 10 minutes
        }
    }
}

impl AppConfig {
    /// Build config from environment variables, falling back to defaults
    /// for anything unset or unparsable. An unknown cache-key policy is an
    /// error since silently picking one changes filter behavior.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = std::env::var("GROUPGUARD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let policy_path = std::env::var("GROUPGUARD_POLICY_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.policy_path);

        let api_port: u16 = std::env::var("GROUPGUARD_API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.api_port);

        let assistant_name =
            std::env::var("GROUPGUARD_ASSISTANT_NAME").unwrap_or(defaults.assistant_name);

        let pattern_cache_key = match std::env::var("GROUPGUARD_PATTERN_CACHE_KEY") {
            Ok(s) => s.parse()?,
            Err(_) => defaults.pattern_cache_key,
        };

        let sweep_interval = std::env::var("GROUPGUARD_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);

        Ok(Self {
            db_path,
            policy_path,
            api_port,
            assistant_name,
            pattern_cache_key,
            sweep_interval,
        })
    }
}
