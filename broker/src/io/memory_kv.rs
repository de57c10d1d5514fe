//! In-process [`KvEngine`] with optional JSON snapshot persistence.
//!
//! Each partition is a `BTreeMap` so scans run in the same lexicographic byte
//! order an on-disk LSM engine would use. When opened from a path, `flush`
//! writes the whole store atomically (temp file + rename).

use std::collections::BTreeMap;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::write_atomic;
use super::kv::{KvEngine, PartitionId, StoreError};

#[derive(Debug, Default)]
pub struct MemoryEngine {
    names: Vec<String>,
    partitions: Vec<BTreeMap<Vec<u8>, Vec<u8>>>,
    snapshot_path: Option<PathBuf>,
}

/// On-disk form: partition name → `[hex key, hex value]` pairs in key order.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    partitions: BTreeMap<String, Vec<(String, String)>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot at `path` (empty store if missing); `flush` writes back to it.
    pub fn open(path: &Path) -> Result<Self> {
        let mut engine = if path.exists() {
            Self::load(path)?
        } else {
            Self::new()
        };
        engine.snapshot_path = Some(path.to_path_buf());
        Ok(engine)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading store snapshot");
        let contents =
            fs::read_to_string(path).with_context(|| format!("read store {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("parse store {}", path.display()))?;
        let mut engine = Self::new();
        for (name, entries) in snapshot.partitions {
            let id = engine.partition_for(&name);
            let partition = &mut engine.partitions[id.0];
            for (key, value) in entries {
                let key = hex::decode(&key)
                    .with_context(|| format!("decode key in partition '{name}'"))?;
                let value = hex::decode(&value)
                    .with_context(|| format!("decode value in partition '{name}'"))?;
                partition.insert(key, value);
            }
        }
        Ok(engine)
    }

    /// Atomically write all partitions to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            partitions: self
                .names
                .iter()
                .zip(&self.partitions)
                .map(|(name, entries)| {
                    let pairs = entries
                        .iter()
                        .map(|(key, value)| (hex::encode(key), hex::encode(value)))
                        .collect();
                    (name.clone(), pairs)
                })
                .collect(),
        };
        debug!(path = %path.display(), partitions = self.names.len(), "writing store snapshot");
        let mut buf = serde_json::to_string_pretty(&snapshot)?;
        buf.push('\n');
        write_atomic(path, &buf)
    }

    /// Number of entries in partition `name` (0 if it was never created).
    pub fn partition_len(&self, name: &str) -> usize {
        self.names
            .iter()
            .position(|existing| existing == name)
            .map_or(0, |idx| self.partitions[idx].len())
    }

    /// Keys of partition `name` in scan order.
    pub fn partition_keys(&self, name: &str) -> Vec<Vec<u8>> {
        self.names
            .iter()
            .position(|existing| existing == name)
            .map(|idx| self.partitions[idx].keys().cloned().collect())
            .unwrap_or_default()
    }

    fn partition_for(&mut self, name: &str) -> PartitionId {
        if let Some(idx) = self.names.iter().position(|existing| existing == name) {
            return PartitionId(idx);
        }
        self.names.push(name.to_string());
        self.partitions.push(BTreeMap::new());
        PartitionId(self.partitions.len() - 1)
    }

    fn partition(&self, id: PartitionId) -> Result<&BTreeMap<Vec<u8>, Vec<u8>>, StoreError> {
        self.partitions
            .get(id.0)
            .ok_or(StoreError::UnknownPartition(id))
    }

    fn partition_mut(
        &mut self,
        id: PartitionId,
    ) -> Result<&mut BTreeMap<Vec<u8>, Vec<u8>>, StoreError> {
        self.partitions
            .get_mut(id.0)
            .ok_or(StoreError::UnknownPartition(id))
    }
}

impl KvEngine for MemoryEngine {
    fn create_partition(&mut self, name: &str) -> Result<PartitionId, StoreError> {
        Ok(self.partition_for(name))
    }

    fn put(&mut self, partition: PartitionId, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.partition_mut(partition)?
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, partition: PartitionId, key: &[u8]) -> Result<(), StoreError> {
        self.partition_mut(partition)?.remove(key);
        Ok(())
    }

    fn get_into(
        &self,
        partition: PartitionId,
        key: &[u8],
        buf: &mut [u8],
    ) -> Result<Option<usize>, StoreError> {
        let Some(value) = self.partition(partition)?.get(key) else {
            return Ok(None);
        };
        let copied = value.len().min(buf.len());
        buf[..copied].copy_from_slice(&value[..copied]);
        Ok(Some(value.len()))
    }

    fn contains(&self, partition: PartitionId, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.partition(partition)?.contains_key(key))
    }

    fn scan(
        &self,
        partition: PartitionId,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError> {
        for (key, value) in self.partition(partition)? {
            if visitor(key, value).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if let Some(path) = &self.snapshot_path {
            self.save(path)
                .map_err(|err| StoreError::Backend(format!("{err:#}")))?;
        }
        Ok(())
    }
}
