use trellis_types::PayloadHash;

use crate::error::PayloadResult;

/// Callback invoked whenever a payload becomes available.
pub type PayloadObserver = Box<dyn Fn(&PayloadHash) + Send + Sync>;

/// Content-addressed payload store.
///
/// All implementations must satisfy these invariants:
/// - Payloads are immutable once written; the same bytes always produce the
///   same hash.
/// - Concurrent reads are always safe.
/// - I/O errors are propagated, never reported as a missing payload.
pub trait PayloadStore: Send + Sync {
    /// Register a callback fired once per newly written payload, after the
    /// payload is readable.
    fn register_observer(&self, observer: PayloadObserver);

    /// Read a payload by hash.
    ///
    /// Returns `Ok(None)` if the payload is not (yet) available.
    /// Returns `Err` on I/O failure or data corruption.
    fn read_payload(&self, hash: &PayloadHash) -> PayloadResult<Option<Vec<u8>>>;

    /// Write a payload and return its hash. Idempotent.
    fn write_payload(&self, data: &[u8]) -> PayloadResult<PayloadHash>;

    /// Check whether a payload is present.
    fn is_present(&self, hash: &PayloadHash) -> PayloadResult<bool> {
        Ok(self.read_payload(hash)?.is_some())
    }
}
