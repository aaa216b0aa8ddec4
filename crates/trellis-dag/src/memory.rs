//! In-memory transaction graph.
//!
//! [`InMemoryGraph`] stores transactions in a [`HashMap`] and maintains a
//! forward-edge index (`children`) for descendant walks. Root transactions
//! (those with no parents) are tracked separately so a walk from the zero
//! ref can start without scanning.
//!
//! # Invariants
//!
//! - The graph is acyclic: a parent must be admitted before its child, and a
//!   reference is the hash of the transaction's own bytes.
//! - Every parent reference resolves to an admitted transaction.
//! - Admission is idempotent; observers fire once per transaction.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use tracing::debug;

use trellis_types::{Transaction, TransactionRef};

use crate::error::{DagError, DagResult};
use crate::traits::{GraphStore, TransactionObserver};
use crate::walk::CausalWalk;

/// HashMap-backed graph store for tests and embedding.
#[derive(Default)]
pub struct InMemoryGraph {
    inner: RwLock<GraphState>,
    observers: RwLock<Vec<TransactionObserver>>,
}

#[derive(Default)]
struct GraphState {
    /// All transactions, keyed by reference.
    transactions: HashMap<TransactionRef, Transaction>,
    /// Forward-edge index: parent -> children.
    children: HashMap<TransactionRef, Vec<TransactionRef>>,
    /// Transactions without parents.
    roots: Vec<TransactionRef>,
}

impl InMemoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of admitted transactions.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").transactions.len()
    }

    /// Returns `true` if no transaction has been admitted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Admit a transaction.
    ///
    /// All parents must already be admitted. Returns `Ok(false)` without
    /// notifying observers if the transaction is already present. Observers
    /// run after the graph lock is released.
    pub fn add(&self, transaction: Transaction) -> DagResult<bool> {
        {
            let mut state = self.inner.write().expect("lock poisoned");
            let reference = transaction.reference();
            if state.transactions.contains_key(&reference) {
                return Ok(false);
            }

            for parent in transaction.prevs() {
                if !state.transactions.contains_key(parent) {
                    return Err(DagError::DanglingParent {
                        transaction: reference,
                        parent: *parent,
                    });
                }
            }

            for parent in transaction.prevs() {
                state.children.entry(*parent).or_default().push(reference);
            }
            if transaction.is_root() {
                state.roots.push(reference);
            }

            debug!(
                tx = %reference.short_hex(),
                clock = transaction.lamport_clock(),
                "admitted transaction"
            );
            state.transactions.insert(reference, transaction.clone());
        }

        for observer in self.observers.read().expect("lock poisoned").iter() {
            observer(&transaction);
        }
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Retrieve a transaction by reference.
    pub fn get(&self, reference: &TransactionRef) -> Option<Transaction> {
        self.inner
            .read()
            .expect("lock poisoned")
            .transactions
            .get(reference)
            .cloned()
    }

    /// Returns `true` if the transaction has been admitted.
    pub fn contains(&self, reference: &TransactionRef) -> bool {
        self.inner
            .read()
            .expect("lock poisoned")
            .transactions
            .contains_key(reference)
    }

    /// References of all root transactions, in admission order.
    pub fn roots(&self) -> Vec<TransactionRef> {
        self.inner.read().expect("lock poisoned").roots.clone()
    }

    /// References of all transactions without children, sorted.
    pub fn heads(&self) -> Vec<TransactionRef> {
        let state = self.inner.read().expect("lock poisoned");
        let mut heads: Vec<TransactionRef> = state
            .transactions
            .keys()
            .filter(|r| state.children.get(r).map_or(true, Vec::is_empty))
            .copied()
            .collect();
        heads.sort();
        heads
    }
}

impl GraphState {
    /// Strict ancestors of `start` (BFS upward).
    fn ancestors_of(&self, start: &TransactionRef) -> HashSet<TransactionRef> {
        let mut ancestors = HashSet::new();
        let mut queue: VecDeque<TransactionRef> = VecDeque::from([*start]);
        while let Some(current) = queue.pop_front() {
            let Some(tx) = self.transactions.get(&current) else {
                continue;
            };
            for parent in tx.prevs() {
                if ancestors.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }
        ancestors
    }

    /// The seeds, all of their descendants, and every parent of those that
    /// is not in `settled`, closed in both directions.
    ///
    /// Every parent of a returned transaction is either returned too or a
    /// member of `settled`.
    fn snapshot(
        &self,
        seeds: &[TransactionRef],
        settled: &HashSet<TransactionRef>,
    ) -> Vec<Transaction> {
        let mut visited: HashSet<TransactionRef> = HashSet::new();
        let mut queue: VecDeque<TransactionRef> = VecDeque::new();
        for seed in seeds {
            if visited.insert(*seed) {
                queue.push_back(*seed);
            }
        }

        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            let Some(tx) = self.transactions.get(&current) else {
                continue;
            };
            for parent in tx.prevs() {
                if !settled.contains(parent) && visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
            if let Some(child_refs) = self.children.get(&current) {
                for child in child_refs {
                    if visited.insert(*child) {
                        queue.push_back(*child);
                    }
                }
            }
            result.push(tx.clone());
        }
        result
    }
}

impl GraphStore for InMemoryGraph {
    fn register_observer(&self, observer: TransactionObserver) {
        self.observers.write().expect("lock poisoned").push(observer);
    }

    fn walk(&self, start: &TransactionRef) -> DagResult<CausalWalk> {
        let state = self.inner.read().expect("lock poisoned");
        let snapshot = if start.is_zero() {
            state.snapshot(&state.roots, &HashSet::new())
        } else if state.transactions.contains_key(start) {
            // Merge descendants pull in their other branches; only the
            // start's own ancestors stay out.
            state.snapshot(std::slice::from_ref(start), &state.ancestors_of(start))
        } else {
            return Err(DagError::TransactionNotFound(*start));
        };
        Ok(CausalWalk::new(snapshot))
    }
}

impl std::fmt::Debug for InMemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGraph")
            .field("transaction_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use trellis_types::{PayloadHash, TransactionHeader};

    fn tx(label: &str, prevs: &[&Transaction]) -> Transaction {
        let clock = prevs
            .iter()
            .map(|p| p.lamport_clock() + 1)
            .max()
            .unwrap_or(0);
        Transaction::new(
            TransactionHeader::new("test", PayloadHash::from_bytes(label.as_bytes()))
                .with_prevs(prevs.iter().map(|p| p.reference()).collect())
                .with_lamport_clock(clock),
        )
        .unwrap()
    }

    #[test]
    fn add_and_get() {
        let graph = InMemoryGraph::new();
        let a = tx("a", &[]);
        assert!(graph.add(a.clone()).unwrap());
        assert_eq!(graph.get(&a.reference()), Some(a.clone()));
        assert!(graph.contains(&a.reference()));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.roots(), vec![a.reference()]);
    }

    #[test]
    fn duplicate_add_is_noop() {
        let graph = InMemoryGraph::new();
        let a = tx("a", &[]);
        assert!(graph.add(a.clone()).unwrap());
        assert!(!graph.add(a).unwrap());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn dangling_parent_rejected() {
        let graph = InMemoryGraph::new();
        let a = tx("a", &[]);
        let b = tx("b", &[&a]);
        let err = graph.add(b).unwrap_err();
        assert!(matches!(err, DagError::DanglingParent { parent, .. } if parent == a.reference()));
        assert!(graph.is_empty());
    }

    #[test]
    fn observers_fire_once_per_admission() {
        let graph = InMemoryGraph::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        graph.register_observer(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let a = tx("a", &[]);
        graph.add(a.clone()).unwrap();
        graph.add(a.clone()).unwrap();
        graph.add(tx("b", &[&a])).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observer_sees_admitted_transaction() {
        let graph = Arc::new(InMemoryGraph::new());
        let visible = Arc::new(AtomicUsize::new(0));
        let g = Arc::clone(&graph);
        let v = Arc::clone(&visible);
        graph.register_observer(Box::new(move |t| {
            if g.contains(&t.reference()) {
                v.fetch_add(1, Ordering::SeqCst);
            }
        }));
        graph.add(tx("a", &[])).unwrap();
        assert_eq!(visible.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn walk_from_zero_covers_all_roots() {
        let graph = InMemoryGraph::new();
        let a = tx("a", &[]);
        let b = tx("b", &[]);
        let c = tx("c", &[&a, &b]);
        graph.add(a.clone()).unwrap();
        graph.add(b.clone()).unwrap();
        graph.add(c.clone()).unwrap();

        let order: Vec<_> = graph
            .walk(&TransactionRef::start_of_history())
            .unwrap()
            .map(|t| t.reference())
            .collect();
        assert_eq!(order.len(), 3);
        assert_eq!(order[2], c.reference());
    }

    #[test]
    fn walk_from_ref_covers_descendants_only() {
        let graph = InMemoryGraph::new();
        let a = tx("a", &[]);
        let b = tx("b", &[&a]);
        let c = tx("c", &[&b]);
        let side = tx("side", &[&a]);
        for t in [&a, &b, &c, &side] {
            graph.add(t.clone()).unwrap();
        }

        let order: Vec<_> = graph
            .walk(&b.reference())
            .unwrap()
            .map(|t| t.reference())
            .collect();
        assert_eq!(order, vec![b.reference(), c.reference()]);
    }

    #[test]
    fn walk_from_ref_pulls_in_other_parents_of_merges() {
        let graph = InMemoryGraph::new();
        let r = tx("r", &[]);
        let a = tx("a", &[&r]);
        let b = tx("b", &[&r]);
        let m = tx("m", &[&a, &b]);
        for t in [&r, &a, &b, &m] {
            graph.add(t.clone()).unwrap();
        }

        let order: Vec<_> = graph
            .walk(&a.reference())
            .unwrap()
            .map(|t| t.reference())
            .collect();
        assert_eq!(order.len(), 3);
        assert!(!order.contains(&r.reference()));
        let pos = |x: &Transaction| order.iter().position(|o| *o == x.reference()).unwrap();
        assert!(pos(&a) < pos(&m));
        assert!(pos(&b) < pos(&m));
    }

    #[test]
    fn halted_side_branch_holds_back_merge() {
        let graph = InMemoryGraph::new();
        let r = tx("r", &[]);
        let a = tx("a", &[&r]);
        let b = tx("b", &[&r]);
        let m = tx("m", &[&a, &b]);
        for t in [&r, &a, &b, &m] {
            graph.add(t.clone()).unwrap();
        }

        let mut walk = graph.walk(&a.reference()).unwrap();
        let mut yielded = Vec::new();
        while let Some(t) = walk.next() {
            if t.reference() == b.reference() {
                walk.halt();
            }
            yielded.push(t.reference());
        }
        assert!(yielded.contains(&b.reference()));
        assert!(!yielded.contains(&m.reference()));
    }

    #[test]
    fn walk_from_unknown_ref_fails() {
        let graph = InMemoryGraph::new();
        let missing = TransactionRef::from_bytes(b"missing");
        assert!(matches!(
            graph.walk(&missing),
            Err(DagError::TransactionNotFound(r)) if r == missing
        ));
    }

    #[test]
    fn walk_on_empty_graph_is_empty() {
        let graph = InMemoryGraph::new();
        assert_eq!(graph.walk(&TransactionRef::zero()).unwrap().count(), 0);
    }

    #[test]
    fn heads_are_childless() {
        let graph = InMemoryGraph::new();
        let a = tx("a", &[]);
        let b = tx("b", &[&a]);
        let c = tx("c", &[&a]);
        for t in [&a, &b, &c] {
            graph.add(t.clone()).unwrap();
        }
        let mut expected = vec![b.reference(), c.reference()];
        expected.sort();
        assert_eq!(graph.heads(), expected);
    }
}
