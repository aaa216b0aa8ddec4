//! Foundation types for Trellis.
//!
//! Every other Trellis crate depends on `trellis-types`.
//!
//! # Key Types
//!
//! - [`TransactionRef`] — content hash identifying a transaction in the graph
//! - [`PayloadHash`] — content hash linking a transaction to its payload
//! - [`Transaction`] — immutable, admitted graph transaction
//! - [`TransactionHeader`] — the encoded part of a transaction

pub mod error;
pub mod hash;
pub mod transaction;

pub use error::TypeError;
pub use hash::{PayloadHash, TransactionRef};
pub use transaction::{Transaction, TransactionHeader};
