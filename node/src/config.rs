//! Operator configuration loading and management.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use aidrail_protocol::config::LedgerConfig;

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE: &str = "aidrail.toml";

/// Full configuration for the `aidrail` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Ledger parameters used when building and validating transactions.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Offline batch storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Signing key location.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database directory. Relative paths resolve against the data
    /// directory.
    #[serde(default = "default_db_dir")]
    pub db_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Hex secret key of the funding account. Relative paths resolve against
    /// the data directory.
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_db_dir() -> PathBuf {
    PathBuf::from("batches")
}
fn default_key_file() -> PathBuf {
    PathBuf::from("aidrail.key")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_dir: default_db_dir(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: NodeConfig = toml::from_str(&contents)
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn db_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.storage.db_dir)
    }

    pub fn key_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.keys.key_file)
    }
}
