//! The replaying graph publisher.
//!
//! [`Publisher::start`] replays the whole graph to the subscribers
//! registered so far, then hands its delivery state to a single task. The
//! graph and payload stores notify that task over a channel; for each
//! notification it runs one publish cycle.
//!
//! # Publish cycle
//!
//! The cycle walks the graph from the front of the resume queue. For each
//! transaction the walk yields:
//!
//! - already visited: descend;
//! - payload present: fan out to subscribers, mark visited, descend;
//! - payload absent: forward private transactions to the bus, then halt
//!   descent, since children may depend on this transaction's effects;
//! - payload store error: abort the cycle, the next trigger retries.
//!
//! The front entry is popped once the walk marks exactly that reference
//! visited. The start-of-history entry seeded at start is never popped, so
//! every cycle walks from the roots and relies on the visited set to skip
//! delivered transactions.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use trellis_dag::GraphStore;
use trellis_events::{BusConnector, StreamContext};
use trellis_payload::PayloadStore;
use trellis_types::{PayloadHash, Transaction, TransactionRef};

use crate::config::PublisherConfig;
use crate::error::{PublishError, PublishResult};
use crate::subscription::{deliver_to, EventType, Receiver, SubscriptionTable};

/// Message handled by the publishing task.
#[derive(Debug)]
enum PublisherEvent {
    TransactionAdded(TransactionRef),
    PayloadWritten(PayloadHash),
    Flush(oneshot::Sender<()>),
    Status(oneshot::Sender<PublisherStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Snapshot of the delivery state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublisherStatus {
    /// Resume queue contents, front first.
    pub pending: Vec<TransactionRef>,
    /// Number of delivered transactions.
    pub visited: usize,
}

enum Lifecycle {
    Idle,
    Starting,
    Running(mpsc::UnboundedSender<PublisherEvent>),
    Stopped,
}

/// Publishes graph transactions together with their payloads, in causal
/// order, exactly once per subscriber.
pub struct Publisher {
    graph: Arc<dyn GraphStore>,
    payloads: Arc<dyn PayloadStore>,
    bus: Arc<dyn BusConnector>,
    config: PublisherConfig,
    subscriptions: Arc<RwLock<SubscriptionTable>>,
    lifecycle: Mutex<Lifecycle>,
}

impl Publisher {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        payloads: Arc<dyn PayloadStore>,
        bus: Arc<dyn BusConnector>,
    ) -> Self {
        Self::with_config(graph, payloads, bus, PublisherConfig::default())
    }

    pub fn with_config(
        graph: Arc<dyn GraphStore>,
        payloads: Arc<dyn PayloadStore>,
        bus: Arc<dyn BusConnector>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            graph,
            payloads,
            bus,
            config,
            subscriptions: Arc::new(RwLock::new(SubscriptionTable::new())),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Register `receiver` for `(event_type, payload_type)`.
    ///
    /// A receiver registered on a key that already has one runs after it,
    /// and only if it succeeded. Receivers registered after [`start`] see
    /// transactions delivered from then on; nothing is replayed to them.
    /// May be called from inside a receiver.
    ///
    /// [`start`]: Publisher::start
    pub fn subscribe(
        &self,
        event_type: EventType,
        payload_type: impl Into<String>,
        receiver: impl Receiver + 'static,
    ) {
        let payload_type = payload_type.into();
        debug!(%event_type, %payload_type, "subscriber registered");
        self.subscriptions
            .write()
            .expect("subscription lock poisoned")
            .subscribe(event_type, payload_type, Arc::new(receiver));
    }

    /// Connect to the bus, hook into both stores and replay the graph.
    ///
    /// Returns once every transaction already resident with its payload has
    /// been delivered. Fails without registering any observer if the bus
    /// cannot be reached within the configured deadline or the private
    /// transaction stream cannot be set up.
    pub async fn start(&self) -> PublishResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock().expect("lifecycle lock poisoned");
            match *lifecycle {
                Lifecycle::Idle => *lifecycle = Lifecycle::Starting,
                _ => return Err(PublishError::AlreadyStarted),
            }
        }

        match self.connect().await {
            Ok(context) => {
                let sender = self.launch(context);
                *self.lifecycle.lock().expect("lifecycle lock poisoned") =
                    Lifecycle::Running(sender);
                Ok(())
            }
            Err(err) => {
                *self.lifecycle.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
                Err(err)
            }
        }
    }

    async fn connect(&self) -> PublishResult<Arc<dyn StreamContext>> {
        self.config.validate()?;
        let deadline = self.config.acquire_timeout();
        let context = tokio::time::timeout(deadline, self.bus.acquire_stream_context())
            .await
            .map_err(|_| PublishError::AcquireTimeout(deadline))??;

        context.ensure_stream(&self.config.private_stream())?;
        info!(
            stream = %self.config.private_tx_stream,
            subject = %self.config.private_tx_subject,
            "private transaction stream ready"
        );
        Ok(context)
    }

    fn launch(&self, context: Arc<dyn StreamContext>) -> mpsc::UnboundedSender<PublisherEvent> {
        let (sender, events) = mpsc::unbounded_channel();

        let added = sender.clone();
        self.graph.register_observer(Box::new(move |tx: &Transaction| {
            let _ = added.send(PublisherEvent::TransactionAdded(tx.reference()));
        }));
        let written = sender.clone();
        self.payloads
            .register_observer(Box::new(move |hash: &PayloadHash| {
                let _ = written.send(PublisherEvent::PayloadWritten(*hash));
            }));

        let mut worker = PublishWorker {
            graph: Arc::clone(&self.graph),
            payloads: Arc::clone(&self.payloads),
            subscriptions: Arc::clone(&self.subscriptions),
            context,
            private_subject: self.config.private_tx_subject.clone(),
            resume_at: VecDeque::new(),
            visited: HashSet::new(),
        };
        worker
            .resume_at
            .push_back(TransactionRef::start_of_history());
        worker.publish();
        info!(delivered = worker.visited.len(), "finished replaying graph");

        tokio::spawn(worker.run(events));
        sender
    }

    fn sender(&self) -> PublishResult<mpsc::UnboundedSender<PublisherEvent>> {
        match &*self.lifecycle.lock().expect("lifecycle lock poisoned") {
            Lifecycle::Running(sender) => Ok(sender.clone()),
            _ => Err(PublishError::NotRunning),
        }
    }

    async fn request<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<T>) -> PublisherEvent,
    ) -> PublishResult<T> {
        let (reply, response) = oneshot::channel();
        self.sender()?
            .send(event(reply))
            .map_err(|_| PublishError::NotRunning)?;
        response.await.map_err(|_| PublishError::NotRunning)
    }

    /// Wait until every trigger received so far has been processed.
    pub async fn flush(&self) -> PublishResult<()> {
        self.request(PublisherEvent::Flush).await
    }

    /// Current delivery state, after every trigger received so far.
    pub async fn status(&self) -> PublishResult<PublisherStatus> {
        self.request(PublisherEvent::Status).await
    }

    /// Stop the publishing task after its current cycle. Triggers that
    /// arrive afterwards are dropped.
    pub async fn shutdown(&self) -> PublishResult<()> {
        self.request(PublisherEvent::Shutdown).await?;
        *self.lifecycle.lock().expect("lifecycle lock poisoned") = Lifecycle::Stopped;
        Ok(())
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let running = matches!(
            *self.lifecycle.lock().expect("lifecycle lock poisoned"),
            Lifecycle::Running(_)
        );
        f.debug_struct("Publisher")
            .field("config", &self.config)
            .field("running", &running)
            .finish()
    }
}

/// Sole owner of the resume queue and visited set.
struct PublishWorker {
    graph: Arc<dyn GraphStore>,
    payloads: Arc<dyn PayloadStore>,
    subscriptions: Arc<RwLock<SubscriptionTable>>,
    context: Arc<dyn StreamContext>,
    private_subject: String,
    resume_at: VecDeque<TransactionRef>,
    visited: HashSet<TransactionRef>,
}

impl PublishWorker {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<PublisherEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                PublisherEvent::TransactionAdded(reference) => {
                    // Resume from the new transaction once its payload shows up.
                    self.resume_at.push_back(reference);
                    self.publish();
                }
                PublisherEvent::PayloadWritten(_) => self.publish(),
                PublisherEvent::Flush(reply) => {
                    let _ = reply.send(());
                }
                PublisherEvent::Status(reply) => {
                    let _ = reply.send(PublisherStatus {
                        pending: self.resume_at.iter().copied().collect(),
                        visited: self.visited.len(),
                    });
                }
                PublisherEvent::Shutdown(reply) => {
                    info!(visited = self.visited.len(), "publisher stopped");
                    let _ = reply.send(());
                    return;
                }
            }
        }
    }

    /// One publish cycle from the front of the resume queue.
    fn publish(&mut self) {
        let Some(&cursor) = self.resume_at.front() else {
            return;
        };
        if let Err(err) = self.walk_from(cursor) {
            error!(cursor = %cursor.short_hex(), %err, "unable to publish graph");
        }
    }

    /// Walk from `cursor`, delivering what is ready. An error aborts the walk
    /// and keeps everything marked visited so far.
    fn walk_from(&mut self, cursor: TransactionRef) -> PublishResult<()> {
        let mut walk = self.graph.walk(&cursor)?;
        while let Some(tx) = walk.next() {
            let reference = tx.reference();
            if !self.visited.contains(&reference) {
                if !self.publish_transaction(&tx)? {
                    walk.halt();
                    continue;
                }
                self.visited.insert(reference);
            }
            if reference == cursor {
                self.resume_at.pop_front();
            }
        }
        Ok(())
    }

    /// Deliver one unvisited transaction. Returns `false` if its payload is
    /// not available yet.
    fn publish_transaction(&self, tx: &Transaction) -> PublishResult<bool> {
        let Some(payload) = self.payloads.read_payload(&tx.payload_hash())? else {
            if tx.is_private() {
                self.forward_private(tx);
            }
            debug!(tx = %tx.reference().short_hex(), "payload not present, halting branch");
            return Ok(false);
        };

        // Receivers run without the table lock so they may subscribe.
        let chains = self
            .subscriptions
            .read()
            .expect("subscription lock poisoned")
            .matching(tx.payload_type());
        let report = deliver_to(&chains, tx, &payload);
        for failure in &report.failures {
            warn!(
                tx = %tx.reference().short_hex(),
                event_type = %failure.event_type,
                payload_type = %failure.payload_type,
                err = %failure.error,
                "transaction subscriber returned an error"
            );
        }
        debug!(
            tx = %tx.reference().short_hex(),
            chains = report.delivered,
            "published transaction"
        );
        Ok(true)
    }

    fn forward_private(&self, tx: &Transaction) {
        let data = Bytes::copy_from_slice(tx.data());
        match self.context.publish_async(&self.private_subject, data) {
            Ok(()) => debug!(tx = %tx.reference().short_hex(), "forwarded private transaction"),
            Err(err) => warn!(
                tx = %tx.reference().short_hex(),
                %err,
                "unable to handle private transaction"
            ),
        }
    }
}
