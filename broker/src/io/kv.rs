//! Embedded ordered key-value engine abstraction.
//!
//! The [`KvEngine`] trait decouples the message store from the storage
//! backend. An engine exposes independently scannable partitions over one
//! physical store, compared by raw lexicographic byte order.

use std::ops::ControlFlow;

use thiserror::Error;

use crate::core::message::DecodeError;

/// Fatal storage failure. A command that hits one cannot complete.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failed: {0}")]
    Backend(String),

    #[error("unknown partition {0:?}")]
    UnknownPartition(PartitionId),

    #[error("corrupt value in partition '{partition}' at key {key}")]
    Corrupt {
        partition: &'static str,
        key: String,
        #[source]
        source: DecodeError,
    },

    #[error("malformed key in partition '{partition}': {key}")]
    MalformedKey { partition: &'static str, key: String },

    #[error("index entry {key} in partition '{partition}' has no message")]
    DanglingIndex { partition: &'static str, key: String },
}

/// Handle to a named partition, issued by [`KvEngine::create_partition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put {
        partition: PartitionId,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        partition: PartitionId,
        key: Vec<u8>,
    },
}

/// Ordered set of index writes that belong to one logical mutation.
///
/// Engines without multi-key transactions apply the ops one by one; a failure
/// part-way through is reported and the store is not rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, partition: PartitionId, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            partition,
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    pub fn delete(&mut self, partition: PartitionId, key: &[u8]) {
        self.ops.push(BatchOp::Delete {
            partition,
            key: key.to_vec(),
        });
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Abstraction over embedded ordered key-value backends.
pub trait KvEngine {
    /// Create the partition `name`, or return the existing handle for it.
    fn create_partition(&mut self, name: &str) -> Result<PartitionId, StoreError>;

    fn put(&mut self, partition: PartitionId, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Delete `key` if present. Deleting an absent key is not an error.
    fn delete(&mut self, partition: PartitionId, key: &[u8]) -> Result<(), StoreError>;

    /// Copy the value for `key` into `buf` and return its full length.
    ///
    /// When the returned length exceeds `buf.len()` only a prefix was copied and
    /// the caller must retry with a larger buffer.
    fn get_into(
        &self,
        partition: PartitionId,
        key: &[u8],
        buf: &mut [u8],
    ) -> Result<Option<usize>, StoreError>;

    fn contains(&self, partition: PartitionId, key: &[u8]) -> Result<bool, StoreError>;

    /// Visit entries in ascending key order until the visitor breaks.
    fn scan(
        &self,
        partition: PartitionId,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError>;

    fn apply(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
        for op in batch.into_ops() {
            match op {
                BatchOp::Put {
                    partition,
                    key,
                    value,
                } => self.put(partition, &key, &value)?,
                BatchOp::Delete { partition, key } => self.delete(partition, &key)?,
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
