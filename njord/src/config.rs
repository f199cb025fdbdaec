use njord_execution::BrokerConfig;
use njord_risk::RiskConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Whole-deployment configuration, loaded once at service startup.
///
/// A missing or unparseable file is an unrecoverable startup failure; callers
/// exit non-zero.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub service: ServiceConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub strategies: Vec<StrategyManifestEntry>,
}

/// Bus, journal and kill-switch wiring shared by every service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub redis_url: String,

    pub journal_dir: PathBuf,

    pub kill_switch_file: PathBuf,

    #[serde(default = "default_kill_switch_key")]
    pub kill_switch_key: String,

    /// Observability gates; parsed for completeness, they never affect core
    /// trading behaviour.
    #[serde(default)]
    pub enable_metrics: bool,
    #[serde(default)]
    pub enable_alerts: bool,
    #[serde(default)]
    pub enable_audit: bool,
}

fn default_kill_switch_key() -> String {
    njord_bus::kill::DEFAULT_BUS_KEY.to_string()
}

/// One strategy instance in the manifest.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StrategyManifestEntry {
    /// Instance id; becomes the `strategy_id` on emitted intents.
    pub id: String,

    /// Registry key naming the strategy implementation.
    pub strategy: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Symbols this instance trades; events for other symbols are not dispatched.
    pub symbols: Vec<String>,

    /// Topics to dispatch; defaults to the trade topics of `symbols`.
    #[serde(default)]
    pub events: Vec<String>,

    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl StrategyManifestEntry {
    /// Topics this entry subscribes to.
    pub fn topics(&self) -> Vec<String> {
        if !self.events.is_empty() {
            return self.events.clone();
        }
        self.symbols
            .iter()
            .map(|symbol| njord_core::topic::trades(&njord_core::ids::Symbol::new(symbol)))
            .collect()
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}
