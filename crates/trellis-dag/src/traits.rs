use trellis_types::{Transaction, TransactionRef};

use crate::error::DagResult;
use crate::walk::CausalWalk;

/// Callback invoked for every newly admitted transaction.
pub type TransactionObserver = Box<dyn Fn(&Transaction) + Send + Sync>;

/// Read side of the transaction graph as seen by its consumers.
pub trait GraphStore: Send + Sync {
    /// Register a callback fired once per admitted transaction, after the
    /// transaction is visible to [`walk`](GraphStore::walk).
    fn register_observer(&self, observer: TransactionObserver);

    /// Start a causal walk at `start`.
    ///
    /// The walk covers `start`, everything that descends from it, and every
    /// other parent of those descendants that is not an ancestor of
    /// `start`. No transaction is yielded before its parents. The zero ref
    /// starts at the roots and therefore covers the whole graph.
    /// Returns [`DagError::TransactionNotFound`](crate::DagError) if a
    /// non-zero `start` is unknown.
    fn walk(&self, start: &TransactionRef) -> DagResult<CausalWalk>;
}
