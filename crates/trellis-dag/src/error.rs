//! Error types for the transaction graph.

use trellis_types::TransactionRef;

/// Errors that can occur during graph operations.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A referenced transaction was not found in the graph.
    #[error("transaction not found: {0:?}")]
    TransactionNotFound(TransactionRef),

    /// A transaction references a parent that has not been admitted.
    #[error("dangling parent reference: transaction {transaction:?} references missing parent {parent:?}")]
    DanglingParent {
        /// The transaction containing the bad reference.
        transaction: TransactionRef,
        /// The missing parent.
        parent: TransactionRef,
    },

    /// Storage I/O error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Convenience alias for graph results.
pub type DagResult<T> = Result<T, DagError>;
