//! Pull-based causal traversal.
//!
//! A [`CausalWalk`] owns a snapshot of the part of the graph it covers and
//! yields transactions in topological order. A transaction is yielded only
//! after every parent inside the snapshot has been yielded and *released*.
//! Pulling the next transaction releases the previous one, unless the caller
//! invoked [`CausalWalk::halt`] first; a halted transaction keeps all of its
//! descendants out of the walk.
//!
//! Parents outside the snapshot count as already satisfied. Graph stores
//! build snapshots so that those are exactly the ancestors of the start.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use trellis_types::{Transaction, TransactionRef};

/// Lazy, ancestors-first sequence of transactions.
#[derive(Debug, Default)]
pub struct CausalWalk {
    transactions: HashMap<TransactionRef, Transaction>,
    /// Forward-edge index restricted to the snapshot.
    children: HashMap<TransactionRef, Vec<TransactionRef>>,
    /// Number of in-snapshot parents not yet released.
    blocked_on: HashMap<TransactionRef, usize>,
    /// Yieldable transactions, lowest (Lamport clock, ref) first.
    ready: BinaryHeap<Reverse<(u64, TransactionRef)>>,
    last: Option<TransactionRef>,
    halted: bool,
}

impl CausalWalk {
    /// Build a walk over a closed set of transactions.
    pub fn new(transactions: impl IntoIterator<Item = Transaction>) -> Self {
        let transactions: HashMap<TransactionRef, Transaction> = transactions
            .into_iter()
            .map(|tx| (tx.reference(), tx))
            .collect();

        let mut children: HashMap<TransactionRef, Vec<TransactionRef>> = HashMap::new();
        let mut blocked_on = HashMap::with_capacity(transactions.len());
        let mut ready = BinaryHeap::new();

        for tx in transactions.values() {
            let mut in_scope = 0;
            for parent in tx.prevs() {
                if transactions.contains_key(parent) {
                    children.entry(*parent).or_default().push(tx.reference());
                    in_scope += 1;
                }
            }
            if in_scope == 0 {
                ready.push(Reverse((tx.lamport_clock(), tx.reference())));
            } else {
                blocked_on.insert(tx.reference(), in_scope);
            }
        }

        Self {
            transactions,
            children,
            blocked_on,
            ready,
            last: None,
            halted: false,
        }
    }

    /// An empty walk.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stop descent below the most recently yielded transaction.
    ///
    /// Has no effect before the first transaction is yielded.
    pub fn halt(&mut self) {
        if self.last.is_some() {
            self.halted = true;
        }
    }

    /// Number of transactions in the snapshot that have not been yielded.
    /// Includes transactions that can no longer be reached because of a halt.
    pub fn remaining(&self) -> usize {
        self.transactions.len()
    }

    fn release_last(&mut self) {
        let Some(last) = self.last.take() else {
            return;
        };
        if std::mem::take(&mut self.halted) {
            return;
        }
        let Some(child_refs) = self.children.get(&last) else {
            return;
        };
        for child in child_refs {
            if let Some(count) = self.blocked_on.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    self.blocked_on.remove(child);
                    if let Some(tx) = self.transactions.get(child) {
                        self.ready.push(Reverse((tx.lamport_clock(), *child)));
                    }
                }
            }
        }
    }
}

impl Iterator for CausalWalk {
    type Item = Transaction;

    fn next(&mut self) -> Option<Transaction> {
        self.release_last();
        let Reverse((_, reference)) = self.ready.pop()?;
        let tx = self.transactions.remove(&reference)?;
        self.last = Some(reference);
        Some(tx)
    }
}
