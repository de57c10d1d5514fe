//! Persistent message store with TTL and message-id indexes.
//!
//! Three partitions are kept in step by every mutation:
//!
//! - `messages`: `name ∥ correlation_key` → encoded [`Message`]
//! - `message_ttl`: `deadline ∥ name ∥ correlation_key` → existence marker
//! - `message_id`: `name ∥ correlation_key ∥ id` → existence marker (only for
//!   messages with a non-empty id)
//!
//! Mutations go through one [`WriteBatch`] so the indexes are applied as a
//! set. A failed batch is fatal for the command; nothing is compensated.

use std::ops::ControlFlow;

use tracing::{debug, trace};

use super::config::StoreConfig;
use super::kv::{KvEngine, PartitionId, StoreError, WriteBatch};
use crate::core::keys::{
    EXISTENCE, split_ttl_key, write_dedup_key, write_message_key, write_ttl_key,
};
use crate::core::message::{Message, lossy};

pub const MESSAGES_PARTITION: &str = "messages";
pub const MESSAGE_TTL_PARTITION: &str = "message_ttl";
pub const MESSAGE_ID_PARTITION: &str = "message_id";

pub struct MessageStore<E: KvEngine> {
    engine: E,
    messages: PartitionId,
    ttl: PartitionId,
    ids: PartitionId,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
    growth_factor: usize,
}

impl<E: KvEngine> MessageStore<E> {
    /// Create (or attach to) the message partitions of `engine`.
    pub fn open(mut engine: E, config: &StoreConfig) -> Result<Self, StoreError> {
        let messages = engine.create_partition(MESSAGES_PARTITION)?;
        let ttl = engine.create_partition(MESSAGE_TTL_PARTITION)?;
        let ids = engine.create_partition(MESSAGE_ID_PARTITION)?;
        debug!(
            initial_value_buffer_bytes = config.initial_value_buffer_bytes,
            "message store opened"
        );
        Ok(Self {
            engine,
            messages,
            ttl,
            ids,
            key_buf: Vec::new(),
            value_buf: vec![0; config.initial_value_buffer_bytes.max(1)],
            growth_factor: config.buffer_growth_factor.max(2),
        })
    }

    /// Flush the engine and hand it back.
    pub fn close(mut self) -> Result<E, StoreError> {
        self.engine.flush()?;
        debug!("message store closed");
        Ok(self.engine)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Current size of the read scratch buffer.
    pub fn scratch_len(&self) -> usize {
        self.value_buf.len()
    }

    /// Store `message`, replacing any message with the same name and
    /// correlation key together with its index entries.
    pub fn put(&mut self, message: &Message) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();

        write_message_key(&mut self.key_buf, &message.name, &message.correlation_key);
        let replaced = read_message(
            &self.engine,
            self.messages,
            &self.key_buf,
            &mut self.value_buf,
            self.growth_factor,
        )?;
        if let Some(previous) = &replaced {
            self.delete_index_entries(&mut batch, previous);
        }

        write_message_key(&mut self.key_buf, &message.name, &message.correlation_key);
        batch.put(self.messages, &self.key_buf, &message.encode());

        write_ttl_key(
            &mut self.key_buf,
            message.time_to_live,
            &message.name,
            &message.correlation_key,
        );
        batch.put(self.ttl, &self.key_buf, &EXISTENCE);

        if message.has_id() {
            write_dedup_key(
                &mut self.key_buf,
                &message.name,
                &message.correlation_key,
                &message.id,
            );
            batch.put(self.ids, &self.key_buf, &EXISTENCE);
        }

        debug!(
            name = %lossy(&message.name),
            correlation_key = %lossy(&message.correlation_key),
            time_to_live = message.time_to_live,
            replaced = replaced.is_some(),
            "put message"
        );
        self.engine.apply(batch)
    }

    pub fn find(
        &mut self,
        name: &[u8],
        correlation_key: &[u8],
    ) -> Result<Option<Message>, StoreError> {
        write_message_key(&mut self.key_buf, name, correlation_key);
        let found = read_message(
            &self.engine,
            self.messages,
            &self.key_buf,
            &mut self.value_buf,
            self.growth_factor,
        )?;
        debug!(
            name = %lossy(name),
            correlation_key = %lossy(correlation_key),
            found = found.is_some(),
            "find message"
        );
        Ok(found)
    }

    /// Whether a message with the same name, correlation key and id was put.
    ///
    /// Messages without an id are never indexed, so they never exist here.
    pub fn exists(&mut self, message: &Message) -> Result<bool, StoreError> {
        if !message.has_id() {
            return Ok(false);
        }
        write_dedup_key(
            &mut self.key_buf,
            &message.name,
            &message.correlation_key,
            &message.id,
        );
        self.engine.contains(self.ids, &self.key_buf)
    }

    /// Delete `message` from every partition it was written to.
    ///
    /// Index keys are derived from `message` itself, so the caller must pass
    /// the deadline and id the message was stored with.
    pub fn remove(&mut self, message: &Message) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();

        write_message_key(&mut self.key_buf, &message.name, &message.correlation_key);
        batch.delete(self.messages, &self.key_buf);
        self.delete_index_entries(&mut batch, message);

        debug!(
            name = %lossy(&message.name),
            correlation_key = %lossy(&message.correlation_key),
            "remove message"
        );
        self.engine.apply(batch)
    }

    fn delete_index_entries(&mut self, batch: &mut WriteBatch, message: &Message) {
        write_ttl_key(
            &mut self.key_buf,
            message.time_to_live,
            &message.name,
            &message.correlation_key,
        );
        batch.delete(self.ttl, &self.key_buf);

        if message.has_id() {
            write_dedup_key(
                &mut self.key_buf,
                &message.name,
                &message.correlation_key,
                &message.id,
            );
            batch.delete(self.ids, &self.key_buf);
        }
    }

    /// All messages whose deadline is at or before `timestamp`, oldest first.
    pub fn find_before(&mut self, timestamp: i64) -> Result<Vec<Message>, StoreError> {
        let mut due: Vec<Vec<u8>> = Vec::new();
        let mut malformed: Option<Vec<u8>> = None;
        let mut visit = |key: &[u8], _value: &[u8]| match split_ttl_key(key) {
            Some((deadline, suffix)) if deadline <= timestamp => {
                due.push(suffix.to_vec());
                ControlFlow::Continue(())
            }
            Some(_) => ControlFlow::Break(()),
            None => {
                malformed = Some(key.to_vec());
                ControlFlow::Break(())
            }
        };
        self.engine.scan(self.ttl, &mut visit)?;
        if let Some(key) = malformed {
            return Err(StoreError::MalformedKey {
                partition: MESSAGE_TTL_PARTITION,
                key: hex::encode(key),
            });
        }

        let mut expired = Vec::with_capacity(due.len());
        for key in due {
            let message = read_message(
                &self.engine,
                self.messages,
                &key,
                &mut self.value_buf,
                self.growth_factor,
            )?
            .ok_or_else(|| StoreError::DanglingIndex {
                partition: MESSAGE_TTL_PARTITION,
                key: hex::encode(&key),
            })?;
            expired.push(message);
        }
        debug!(timestamp, expired = expired.len(), "find messages before");
        Ok(expired)
    }
}

/// Read and decode the message at `key`, growing `scratch` until it fits.
fn read_message<E: KvEngine>(
    engine: &E,
    partition: PartitionId,
    key: &[u8],
    scratch: &mut Vec<u8>,
    growth_factor: usize,
) -> Result<Option<Message>, StoreError> {
    let len = loop {
        match engine.get_into(partition, key, scratch)? {
            None => return Ok(None),
            Some(len) if len <= scratch.len() => break len,
            Some(len) => {
                let grown = len.max(scratch.len().saturating_mul(growth_factor));
                trace!(needed = len, from = scratch.len(), to = grown, "growing read buffer");
                scratch.resize(grown, 0);
            }
        }
    };
    Message::decode(&scratch[..len])
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            partition: MESSAGES_PARTITION,
            key: hex::encode(key),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory_kv::MemoryEngine;

    fn store() -> MessageStore<MemoryEngine> {
        MessageStore::open(MemoryEngine::new(), &StoreConfig::default()).expect("open")
    }

    #[test]
    fn put_writes_three_partitions_when_id_present() {
        let mut store = store();
        store
            .put(&Message::new("order", "o-1", 10).with_id("m-1"))
            .expect("put");
        let engine = store.engine();
        assert_eq!(engine.partition_len(MESSAGES_PARTITION), 1);
        assert_eq!(engine.partition_len(MESSAGE_TTL_PARTITION), 1);
        assert_eq!(engine.partition_len(MESSAGE_ID_PARTITION), 1);
    }

    #[test]
    fn put_skips_dedup_partition_without_id() {
        let mut store = store();
        store.put(&Message::new("order", "o-1", 10)).expect("put");
        assert_eq!(store.engine().partition_len(MESSAGE_ID_PARTITION), 0);
        assert_eq!(store.engine().partition_len(MESSAGE_TTL_PARTITION), 1);
    }

    /// Replacing a message drops the deadline and id entries of the old one.
    #[test]
    fn put_replaces_previous_index_entries() {
        let mut store = store();
        store
            .put(&Message::new("order", "o-1", 10).with_id("m-1"))
            .expect("put");
        store
            .put(&Message::new("order", "o-1", 50).with_id("m-2"))
            .expect("replace");

        let engine = store.engine();
        assert_eq!(engine.partition_len(MESSAGES_PARTITION), 1);
        assert_eq!(engine.partition_len(MESSAGE_TTL_PARTITION), 1);
        assert_eq!(engine.partition_len(MESSAGE_ID_PARTITION), 1);
        assert!(store.find_before(10).expect("scan").is_empty());
        assert!(
            !store
                .exists(&Message::new("order", "o-1", 0).with_id("m-1"))
                .expect("exists")
        );
    }

    #[test]
    fn find_missing_returns_none() {
        let mut store = store();
        assert_eq!(store.find(b"order", b"o-1").expect("find"), None);
    }

    /// Values larger than the scratch buffer grow it instead of truncating.
    #[test]
    fn find_grows_scratch_buffer_for_large_values() {
        let config = StoreConfig {
            initial_value_buffer_bytes: 8,
            buffer_growth_factor: 2,
        };
        let mut store = MessageStore::open(MemoryEngine::new(), &config).expect("open");
        let payload: Vec<u8> = (0..=255u8).cycle().take(4_000).collect();
        let message = Message::new("order", "o-1", 10).with_payload(payload.clone());
        store.put(&message).expect("put");

        let found = store.find(b"order", b"o-1").expect("find").expect("present");
        assert_eq!(found.payload, payload);
        assert!(store.scratch_len() >= message.encoded_len());
    }

    /// Removing a message whose id entry never existed still succeeds.
    #[test]
    fn remove_tolerates_missing_entries() {
        let mut store = store();
        let message = Message::new("order", "o-1", 10).with_id("never-written");
        store.remove(&message).expect("remove absent");

        store.put(&Message::new("order", "o-1", 10)).expect("put");
        store.remove(&message).expect("remove");
        assert_eq!(store.engine().partition_len(MESSAGES_PARTITION), 0);
        assert_eq!(store.engine().partition_len(MESSAGE_TTL_PARTITION), 0);
    }

    #[test]
    fn find_before_stops_at_first_late_deadline() {
        let mut store = store();
        store.put(&Message::new("a", "1", 300)).expect("put");
        store.put(&Message::new("b", "1", -5)).expect("put");
        store.put(&Message::new("c", "1", 100)).expect("put");

        let expired = store.find_before(100).expect("scan");
        let names: Vec<&[u8]> = expired.iter().map(|m| m.name.as_slice()).collect();
        assert_eq!(names, vec![&b"b"[..], b"c"]);
    }

    #[test]
    fn find_before_reports_dangling_ttl_entries() {
        let mut engine = MemoryEngine::new();
        let ttl = engine.create_partition(MESSAGE_TTL_PARTITION).expect("create");
        let mut key = Vec::new();
        write_ttl_key(&mut key, 1, b"ghost", b"k");
        engine.put(ttl, &key, &EXISTENCE).expect("put");

        let mut store = MessageStore::open(engine, &StoreConfig::default()).expect("open");
        let err = store.find_before(10).expect_err("dangling");
        assert!(matches!(err, StoreError::DanglingIndex { .. }));
    }

    #[test]
    fn corrupt_value_is_fatal() {
        let mut engine = MemoryEngine::new();
        let messages = engine.create_partition(MESSAGES_PARTITION).expect("create");
        engine.put(messages, b"orderk", &[1, 2, 3]).expect("put");

        let mut store = MessageStore::open(engine, &StoreConfig::default()).expect("open");
        let err = store.find(b"order", b"k").expect_err("corrupt");
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
