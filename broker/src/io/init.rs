//! Initialization helpers for `.broker/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{BrokerConfig, write_config};
use super::memory_kv::MemoryEngine;
use super::scenario::{Scenario, write_scenario};

/// All canonical paths within `.broker/` for a data root.
#[derive(Debug, Clone)]
pub struct BrokerPaths {
    pub root: PathBuf,
    pub broker_dir: PathBuf,
    pub config_path: PathBuf,
    pub store_path: PathBuf,
    pub timers_path: PathBuf,
}

impl BrokerPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let broker_dir = root.join(".broker");
        Self {
            root,
            config_path: broker_dir.join("config.toml"),
            store_path: broker_dir.join("store.json"),
            timers_path: broker_dir.join("timers.json"),
            broker_dir,
        }
    }
}

/// Options for `init_broker`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing broker-owned files.
    pub force: bool,
}

/// Create `.broker/` with default config, an empty store, and no timers.
///
/// Fails if `.broker/` already exists unless `options.force` is set.
pub fn init_broker(root: &Path, options: &InitOptions) -> Result<BrokerPaths> {
    let paths = BrokerPaths::new(root);
    if paths.broker_dir.exists() && !options.force {
        return Err(anyhow!(
            "broker init: .broker already exists (use --force to overwrite)"
        ));
    }
    if paths.broker_dir.exists() && !paths.broker_dir.is_dir() {
        return Err(anyhow!("broker init: .broker exists but is not a directory"));
    }

    fs::create_dir_all(&paths.broker_dir)
        .with_context(|| format!("create directory {}", paths.broker_dir.display()))?;
    write_config(&paths.config_path, &BrokerConfig::default())?;
    MemoryEngine::new().save(&paths.store_path)?;
    write_scenario(&paths.timers_path, &Scenario::default())?;

    Ok(paths)
}
