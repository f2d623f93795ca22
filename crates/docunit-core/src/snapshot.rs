//! Serialized original state of an attached entity
//!
//! A snapshot holds the JSON bytes of the entity as of attach or the last
//! successful save, plus a SHA-256 digest of those bytes. The original value
//! is deserialized only when a diff needs it and cached until the next
//! reset.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::codec;
use crate::errors::Result;
use crate::update::UpdateBatch;

fn digest_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct Snapshot<T> {
    bytes: Vec<u8>,
    digest: String,
    cached: Option<T>,
}

impl<T: Serialize + DeserializeOwned> Snapshot<T> {
    /// Serialize `value` into a new snapshot
    pub fn capture(value: &T) -> Result<Self> {
        Ok(Self::from_bytes(codec::to_bytes(value)?))
    }

    /// Wrap previously serialized bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let digest = digest_of(&bytes);
        Self {
            bytes,
            digest,
            cached: None,
        }
    }

    /// Replace the snapshot with the current state of `value`
    ///
    /// Drops the cached original.
    pub fn reset(&mut self, value: &T) -> Result<()> {
        *self = Self::capture(value)?;
        Ok(())
    }

    /// Advance the snapshot by a batch the store has just applied
    ///
    /// The result mirrors the stored document, which can differ from the
    /// saved entity in collection order: pushes land at the end of the
    /// stored array and reorders are never written. Later diffs therefore
    /// address collection elements by their stored index.
    pub fn apply(&mut self, batch: &UpdateBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut document: serde_json::Value = codec::from_bytes(&self.bytes)?;
        batch.apply_to(&mut document)?;
        let value: T = codec::from_document(document)?;
        *self = Self::capture(&value)?;
        self.cached = Some(value);
        Ok(())
    }

    /// The original value, deserialized on first use
    pub fn original(&mut self) -> Result<&T> {
        let value = match self.cached.take() {
            Some(v) => v,
            None => codec::from_bytes(&self.bytes)?,
        };
        let original: &T = self.cached.insert(value);
        Ok(original)
    }

    /// Whether `value` serializes to exactly the snapshot bytes
    pub fn matches(&self, value: &T) -> Result<bool> {
        let bytes = codec::to_bytes(value)?;
        Ok(bytes.len() == self.bytes.len() && digest_of(&bytes) == self.digest)
    }

    /// Hex SHA-256 of the snapshot bytes
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }
}
