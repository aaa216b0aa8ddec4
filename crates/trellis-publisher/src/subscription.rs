//! Subscriber registry and fan-out.
//!
//! Receivers are keyed by `(EventType, payload type)`. Several receivers on
//! the same key form a chain: they run in registration order and the first
//! error stops the rest of that chain. Chains on other keys still run.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use trellis_types::Transaction;

/// Payload type key that matches every transaction.
pub const ANY_PAYLOAD_TYPE: &str = "*";

/// Kind of delivery a receiver subscribes to.
///
/// Both kinds are currently delivered together, once the payload of a
/// transaction is present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventType {
    /// A transaction was added to the graph.
    TransactionAdded,
    /// The payload of a transaction became available.
    TransactionPayloadAdded,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TransactionAdded => "TransactionAdded",
            Self::TransactionPayloadAdded => "TransactionPayloadAdded",
        };
        write!(f, "{s}")
    }
}

/// Consumer of published transactions.
///
/// Implemented for any `Fn(&Transaction, &[u8]) -> anyhow::Result<()>`.
/// Receivers run on the publisher's task. A receiver that calls
/// [`Publisher::subscribe`](crate::Publisher::subscribe) takes effect from
/// the next transaction on.
pub trait Receiver: Send + Sync {
    fn receive(&self, transaction: &Transaction, payload: &[u8]) -> anyhow::Result<()>;
}

impl<F> Receiver for F
where
    F: Fn(&Transaction, &[u8]) -> anyhow::Result<()> + Send + Sync,
{
    fn receive(&self, transaction: &Transaction, payload: &[u8]) -> anyhow::Result<()> {
        self(transaction, payload)
    }
}

/// A receiver chain that returned an error.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub event_type: EventType,
    pub payload_type: String,
    pub error: anyhow::Error,
}

/// Outcome of fanning one transaction out to all matching chains.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Chains that ran to completion.
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// `(EventType, payload type)` → receiver chain.
#[derive(Default)]
pub struct SubscriptionTable {
    chains: BTreeMap<EventType, HashMap<String, Vec<Arc<dyn Receiver>>>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a receiver to the chain for `(event_type, payload_type)`.
    pub fn subscribe(
        &mut self,
        event_type: EventType,
        payload_type: impl Into<String>,
        receiver: Arc<dyn Receiver>,
    ) {
        self.chains
            .entry(event_type)
            .or_default()
            .entry(payload_type.into())
            .or_default()
            .push(receiver);
    }

    /// Number of receivers registered across all chains.
    pub fn len(&self) -> usize {
        self.chains
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every chain whose key matches `payload_type`: the exact
    /// type and the wildcard, for each event type.
    pub fn matching(&self, payload_type: &str) -> Vec<Chain> {
        let mut keys = vec![payload_type];
        if payload_type != ANY_PAYLOAD_TYPE {
            keys.push(ANY_PAYLOAD_TYPE);
        }

        let mut chains = Vec::new();
        for (event_type, by_payload_type) in &self.chains {
            for key in &keys {
                if let Some(receivers) = by_payload_type.get(*key) {
                    chains.push(Chain {
                        event_type: *event_type,
                        payload_type: (*key).to_string(),
                        receivers: receivers.clone(),
                    });
                }
            }
        }
        chains
    }

    /// Run every chain matching the transaction.
    pub fn deliver(&self, transaction: &Transaction, payload: &[u8]) -> DeliveryReport {
        deliver_to(&self.matching(transaction.payload_type()), transaction, payload)
    }
}

/// The receivers registered on one key, in registration order.
#[derive(Clone)]
pub struct Chain {
    pub event_type: EventType,
    pub payload_type: String,
    receivers: Vec<Arc<dyn Receiver>>,
}

impl Chain {
    /// Run the receivers in order, stopping at the first error.
    pub fn run(&self, transaction: &Transaction, payload: &[u8]) -> anyhow::Result<()> {
        self.receivers
            .iter()
            .try_for_each(|receiver| receiver.receive(transaction, payload))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("event_type", &self.event_type)
            .field("payload_type", &self.payload_type)
            .field("receivers", &self.receivers.len())
            .finish()
    }
}

/// Run each chain independently; a failing chain does not affect the others.
pub fn deliver_to(chains: &[Chain], transaction: &Transaction, payload: &[u8]) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for chain in chains {
        match chain.run(transaction, payload) {
            Ok(()) => report.delivered += 1,
            Err(error) => report.failures.push(DeliveryFailure {
                event_type: chain.event_type,
                payload_type: chain.payload_type.clone(),
                error,
            }),
        }
    }
    report
}

impl fmt::Debug for SubscriptionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionTable")
            .field("receivers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use trellis_types::{PayloadHash, TransactionHeader};

    fn tx(payload_type: &str) -> Transaction {
        Transaction::new(TransactionHeader::new(
            payload_type,
            PayloadHash::from_bytes(payload_type.as_bytes()),
        ))
        .unwrap()
    }

    /// Appends its name to a shared log, optionally failing afterwards.
    struct Named {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Receiver for Named {
        fn receive(&self, _: &Transaction, _: &[u8]) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                anyhow::bail!("{} refused", self.name);
            }
            Ok(())
        }
    }

    fn named(
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> Arc<dyn Receiver> {
        Arc::new(Named {
            name,
            log: Arc::clone(log),
            fail,
        })
    }

    #[test]
    fn chain_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::TransactionAdded, "json", named("r1", &log, false));
        table.subscribe(EventType::TransactionAdded, "json", named("r2", &log, false));

        let report = table.deliver(&tx("json"), b"{}");
        assert!(report.is_clean());
        assert_eq!(report.delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec!["r1", "r2"]);
    }

    #[test]
    fn failing_receiver_short_circuits_its_chain_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::TransactionAdded, "json", named("r1", &log, true));
        table.subscribe(EventType::TransactionAdded, "json", named("r2", &log, false));
        table.subscribe(
            EventType::TransactionPayloadAdded,
            "json",
            named("other", &log, false),
        );

        let report = table.deliver(&tx("json"), b"{}");
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].event_type, EventType::TransactionAdded);
        assert_eq!(report.failures[0].payload_type, "json");
        assert!(report.failures[0].error.to_string().contains("r1 refused"));
        assert_eq!(*log.lock().unwrap(), vec!["r1", "other"]);
    }

    #[test]
    fn wildcard_matches_every_payload_type() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::TransactionAdded, "json", named("exact", &log, false));
        table.subscribe(
            EventType::TransactionAdded,
            ANY_PAYLOAD_TYPE,
            named("any", &log, false),
        );

        table.deliver(&tx("json"), b"");
        table.deliver(&tx("xml"), b"");
        assert_eq!(*log.lock().unwrap(), vec!["exact", "any", "any"]);
    }

    #[test]
    fn wildcard_typed_transaction_delivered_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = SubscriptionTable::new();
        table.subscribe(
            EventType::TransactionAdded,
            ANY_PAYLOAD_TYPE,
            named("any", &log, false),
        );
        let report = table.deliver(&tx(ANY_PAYLOAD_TYPE), b"");
        assert_eq!(report.delivered, 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn closures_are_receivers() {
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let mut table = SubscriptionTable::new();
        table.subscribe(
            EventType::TransactionPayloadAdded,
            "json",
            Arc::new(move |_: &Transaction, payload: &[u8]| -> anyhow::Result<()> {
                assert_eq!(payload, b"body");
                *counter.lock().unwrap() += 1;
                Ok(())
            }),
        );
        table.deliver(&tx("json"), b"body");
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn matching_snapshot_ignores_later_subscriptions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::TransactionAdded, "json", named("r1", &log, false));
        let chains = table.matching("json");
        table.subscribe(EventType::TransactionAdded, "json", named("r2", &log, false));

        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].payload_type, "json");
        let report = deliver_to(&chains, &tx("json"), b"");
        assert_eq!(report.delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec!["r1"]);
    }

    #[test]
    fn no_match_delivers_nothing() {
        let table = SubscriptionTable::new();
        assert!(table.is_empty());
        let report = table.deliver(&tx("json"), b"");
        assert_eq!(report.delivered, 0);
        assert!(report.is_clean());
    }
}
