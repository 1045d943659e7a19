//! TOML configuration for the fleetwatch process.
//!
//! Layered like the rest of the appliance: compiled-in defaults, a config
//! file (`$FLEETWATCH_CONFIG` or the standard system location), and finally
//! environment / command-line overrides applied by the caller.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const CONFIG_ENV: &str = "FLEETWATCH_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/fleetwatch/fleetwatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetwatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FleetwatchConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded fleetwatch configuration");
        Ok(config)
    }

    /// First loadable source among `$FLEETWATCH_CONFIG` and
    /// `/etc/fleetwatch/fleetwatch.toml`, else compiled-in defaults.
    ///
    /// `--model-dir` / `FLEETWATCH_MODEL_DIR` are applied by the CLI on top.
    pub fn load_or_default() -> Self {
        let mut sources = Vec::new();
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            sources.push(ConfigSource::Explicit(PathBuf::from(path)));
        }
        sources.push(ConfigSource::Optional(PathBuf::from(SYSTEM_CONFIG_PATH)));
        Self::load_first(&sources)
    }

    /// Walk `sources` in order. An explicit source that fails to load is
    /// logged and skipped; an optional one is only tried if it exists.
    pub fn load_first(sources: &[ConfigSource]) -> Self {
        for source in sources {
            let path = source.path();
            if matches!(source, ConfigSource::Optional(_)) && !path.exists() {
                continue;
            }
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "config file could not be loaded, trying next source"
                ),
            }
        }

        debug!("no usable config file, using compiled-in defaults");
        Self::default()
    }
}

/// One place a config file may come from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Named by the operator; failing to load it is worth a warning.
    Explicit(PathBuf),
    /// Conventional location that may legitimately be absent.
    Optional(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Explicit(p) | ConfigSource::Optional(p) => p,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port the API binds to.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Where the detection artifacts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding `scaler.json`, `isolation_forest.json` and `params.json`.
    pub dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
