//! Content-addressed payload storage for Trellis.
//!
//! Transactions in the graph only carry the hash of their payload; the bytes
//! themselves arrive separately and are kept here, keyed by [`PayloadHash`].
//! A payload may show up before or after its transaction, or never (private
//! transactions not addressed to this node).
//!
//! # Design Rules
//!
//! 1. Payloads are immutable once written.
//! 2. A missing payload is not an error: reads return `Ok(None)`.
//! 3. Observers fire once per payload, on its first write.
//! 4. The store never interprets payload contents.
//!
//! [`PayloadHash`]: trellis_types::PayloadHash

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{PayloadError, PayloadResult};
pub use memory::InMemoryPayloadStore;
pub use traits::{PayloadObserver, PayloadStore};
