//! Runner configuration.
//!
//! Supports loading from YAML files with environment variable overrides,
//! layered on top of [`moq_player_core::config::PlayerConfig`]'s defaults.

use std::path::Path;

use anyhow::{Context, Result};
use moq_player_core::config::PlayerConfig;
use serde::Deserialize;

/// Runner configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// MoQ stream key identifying the broadcast to join.
    /// Override: `MOQ_PLAYER_STREAM_KEY`
    pub stream_key: String,

    /// Product namespace scoping the catalog/track names.
    /// Override: `MOQ_PLAYER_NAMESPACE`
    pub product_namespace: String,

    /// Tunable session/pipeline knobs, unchanged unless overridden in YAML.
    #[serde(flatten)]
    pub player: PlayerConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            stream_key: "demo-stream".to_string(),
            product_namespace: "demo".to_string(),
            player: PlayerConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MOQ_PLAYER_STREAM_KEY") {
            self.stream_key = val;
        }

        if let Ok(val) = std::env::var("MOQ_PLAYER_NAMESPACE") {
            self.product_namespace = val;
        }
    }
}
