use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use trellis_types::PayloadHash;

use crate::error::{PayloadError, PayloadResult};
use crate::traits::{PayloadObserver, PayloadStore};

/// In-memory, HashMap-based payload store.
///
/// Intended for tests and embedding. Payloads are held behind a `RwLock`
/// and cloned on read.
#[derive(Default)]
pub struct InMemoryPayloadStore {
    payloads: RwLock<HashMap<PayloadHash, Vec<u8>>>,
    observers: RwLock<Vec<PayloadObserver>>,
}

impl InMemoryPayloadStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payloads currently stored.
    pub fn len(&self) -> usize {
        self.payloads.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.payloads.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored payloads.
    pub fn total_bytes(&self) -> u64 {
        self.payloads
            .read()
            .expect("lock poisoned")
            .values()
            .map(|p| p.len() as u64)
            .sum()
    }

    /// Re-hash every stored payload.
    pub fn verify(&self) -> PayloadResult<()> {
        let map = self.payloads.read().expect("lock poisoned");
        for (hash, data) in map.iter() {
            if PayloadHash::from_bytes(data) != *hash {
                return Err(PayloadError::HashMismatch(*hash));
            }
        }
        Ok(())
    }
}

impl PayloadStore for InMemoryPayloadStore {
    fn register_observer(&self, observer: PayloadObserver) {
        self.observers.write().expect("lock poisoned").push(observer);
    }

    fn read_payload(&self, hash: &PayloadHash) -> PayloadResult<Option<Vec<u8>>> {
        let map = self.payloads.read().expect("lock poisoned");
        Ok(map.get(hash).cloned())
    }

    fn write_payload(&self, data: &[u8]) -> PayloadResult<PayloadHash> {
        let hash = PayloadHash::from_bytes(data);
        let inserted = {
            let mut map = self.payloads.write().expect("lock poisoned");
            if map.contains_key(&hash) {
                false
            } else {
                map.insert(hash, data.to_vec());
                true
            }
        };

        if inserted {
            debug!(payload = %hash.short_hex(), size = data.len(), "stored payload");
            for observer in self.observers.read().expect("lock poisoned").iter() {
                observer(&hash);
            }
        }
        Ok(hash)
    }

    fn is_present(&self, hash: &PayloadHash) -> PayloadResult<bool> {
        Ok(self
            .payloads
            .read()
            .expect("lock poisoned")
            .contains_key(hash))
    }
}

impl std::fmt::Debug for InMemoryPayloadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryPayloadStore")
            .field("payload_count", &self.len())
            .finish()
    }
}
