//! Broker configuration stored under `.broker/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Broker configuration (TOML).
///
/// Missing fields default to the values below, so an empty or absent file is
/// a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct BrokerConfig {
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Starting size of the scratch buffer used for value reads.
    pub initial_value_buffer_bytes: usize,

    /// Multiplier applied to the scratch buffer when a value does not fit.
    pub buffer_growth_factor: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_value_buffer_bytes: 128,
            buffer_growth_factor: 2,
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.store.initial_value_buffer_bytes == 0 {
            return Err(anyhow!("store.initial_value_buffer_bytes must be > 0"));
        }
        if self.store.buffer_growth_factor < 2 {
            return Err(anyhow!("store.buffer_growth_factor must be >= 2"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BrokerConfig::default()`.
pub fn load_config(path: &Path) -> Result<BrokerConfig> {
    if !path.exists() {
        let cfg = BrokerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BrokerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &BrokerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
