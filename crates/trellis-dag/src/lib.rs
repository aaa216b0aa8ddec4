//! Transaction graph for Trellis.
//!
//! Holds the append-only, content-addressed graph of transactions and
//! notifies observers whenever a new transaction is admitted. Consumers read
//! the graph through a [`CausalWalk`], which hands out transactions
//! ancestors-first and lets the caller stop descent below any of them.

pub mod error;
pub mod memory;
pub mod traits;
pub mod walk;

pub use error::{DagError, DagResult};
pub use memory::InMemoryGraph;
pub use traits::{GraphStore, TransactionObserver};
pub use walk::CausalWalk;
