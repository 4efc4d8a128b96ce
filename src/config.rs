//! Configuration file support for the prover.
//!
//! Settings are read from TOML. Every field has a default, so an empty file
//! (or no file at all) yields a working configuration.

use crate::circuit::CircuitType;
use crate::keys::RunMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_KEYS_DIR: &str = "proving-keys";
const DEFAULT_MAX_TREE_HEIGHT: u32 = 40;
const DEFAULT_MAX_BATCH_SIZE: u32 = 1000;
const DEFAULT_MAX_ACCOUNT_COUNT: u32 = 8;

/// Configuration for the prover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub proving: ProvingConfig,
}

/// Where key files live and what to do when one is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_keys_dir")]
    pub keys_dir: PathBuf,
    /// Key set to preload at startup.
    #[serde(default)]
    pub run_mode: Option<RunMode>,
    /// Circuits preloaded in addition to the run mode's.
    #[serde(default)]
    pub circuits: Vec<CircuitType>,
    /// SHA-256 table used to verify key files before reading them.
    #[serde(default)]
    pub checksum_file: Option<PathBuf>,
    /// Run setup when a key file does not exist.
    #[serde(default)]
    pub setup_on_miss: bool,
    /// Write keys produced by `setup_on_miss` to `keys_dir`.
    #[serde(default)]
    pub persist_setup: bool,
    /// Re-derive the constraint layout of every loaded key and compare.
    #[serde(default)]
    pub verify_layout: bool,
}

/// Limits applied to request shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvingConfig {
    #[serde(default = "default_max_tree_height")]
    pub max_tree_height: u32,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,
    #[serde(default = "default_max_account_count")]
    pub max_account_count: u32,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            keys_dir: default_keys_dir(),
            run_mode: None,
            circuits: Vec::new(),
            checksum_file: None,
            setup_on_miss: false,
            persist_setup: false,
            verify_layout: false,
        }
    }
}

impl Default for ProvingConfig {
    fn default() -> Self {
        Self {
            max_tree_height: DEFAULT_MAX_TREE_HEIGHT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_account_count: DEFAULT_MAX_ACCOUNT_COUNT,
        }
    }
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from(DEFAULT_KEYS_DIR)
}

fn default_max_tree_height() -> u32 {
    DEFAULT_MAX_TREE_HEIGHT
}

fn default_max_batch_size() -> u32 {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_max_account_count() -> u32 {
    DEFAULT_MAX_ACCOUNT_COUNT
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_from_file_or_default(path: &PathBuf) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
