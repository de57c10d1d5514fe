//! Correlatable, time-limited message and its value encoding.
//!
//! Layout of a stored message value:
//!
//! ```text
//! time_to_live: i64 BE
//! name:            u32 BE length ∥ bytes
//! correlation_key: u32 BE length ∥ bytes
//! id:              u32 BE length ∥ bytes
//! payload:         u32 BE length ∥ bytes
//! ```

use std::borrow::Cow;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("message value truncated while reading {field} (need {needed} bytes, have {available})")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("message value has {0} trailing bytes")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub name: Vec<u8>,
    pub correlation_key: Vec<u8>,
    /// Deadline timestamp in milliseconds.
    pub time_to_live: i64,
    /// Deduplication token; empty when the publisher supplied none.
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(
        name: impl Into<Vec<u8>>,
        correlation_key: impl Into<Vec<u8>>,
        time_to_live: i64,
    ) -> Self {
        Self {
            name: name.into(),
            correlation_key: correlation_key.into(),
            time_to_live,
            id: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn encoded_len(&self) -> usize {
        8 + 16 + self.name.len() + self.correlation_key.len() + self.id.len() + self.payload.len()
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(self.encoded_len());
        out.extend_from_slice(&self.time_to_live.to_be_bytes());
        for field in [&self.name, &self.correlation_key, &self.id, &self.payload] {
            out.extend_from_slice(&(field.len() as u32).to_be_bytes());
            out.extend_from_slice(field);
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader { bytes, pos: 0 };
        let ttl = reader.take("time_to_live", 8)?;
        let mut ttl_bytes = [0u8; 8];
        ttl_bytes.copy_from_slice(ttl);
        let name = reader.field("name")?;
        let correlation_key = reader.field("correlation_key")?;
        let id = reader.field("id")?;
        let payload = reader.field("payload")?;
        let rest = bytes.len() - reader.pos;
        if rest != 0 {
            return Err(DecodeError::TrailingBytes(rest));
        }
        Ok(Self {
            name,
            correlation_key,
            time_to_live: i64::from_be_bytes(ttl_bytes),
            id,
            payload,
        })
    }
}

/// Message field bytes as text, with invalid UTF-8 replaced.
pub fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.bytes.len() - self.pos;
        if available < len {
            return Err(DecodeError::Truncated {
                field,
                needed: len,
                available,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn field(&mut self, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        let raw_len = self.take(field, 4)?;
        let len = u32::from_be_bytes([raw_len[0], raw_len[1], raw_len[2], raw_len[3]]) as usize;
        Ok(self.take(field, len)?.to_vec())
    }
}
