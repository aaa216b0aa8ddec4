use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{BusError, BusResult};
use crate::stream::{BusConnector, BusMessage, StreamConfig, StreamContext};

/// Default capacity of per-stream broadcast channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A stream: its configuration, retained messages, and live fan-out.
struct Stream {
    config: StreamConfig,
    messages: Vec<BusMessage>,
    sender: broadcast::Sender<BusMessage>,
}

struct BusState {
    reachable: AtomicBool,
    streams: RwLock<HashMap<String, Stream>>,
    channel_capacity: usize,
}

impl BusState {
    fn ensure_stream(&self, config: &StreamConfig) -> BusResult<()> {
        if config.name.is_empty() || config.subjects.is_empty() {
            return Err(BusError::InvalidConfig(format!(
                "stream needs a name and at least one subject: {config:?}"
            )));
        }

        let mut streams = self.streams.write().expect("bus lock poisoned");
        if let Some(existing) = streams.get(&config.name) {
            if existing.config.subjects == config.subjects {
                return Ok(());
            }
            return Err(BusError::StreamConflict {
                name: config.name.clone(),
                existing: existing.config.subjects.clone(),
            });
        }

        for stream in streams.values() {
            if let Some(subject) = config.subjects.iter().find(|s| stream.config.captures(s)) {
                return Err(BusError::SubjectOverlap {
                    subject: subject.clone(),
                    stream: stream.config.name.clone(),
                });
            }
        }

        let (sender, _) = broadcast::channel(self.channel_capacity);
        streams.insert(
            config.name.clone(),
            Stream {
                config: config.clone(),
                messages: Vec::new(),
                sender,
            },
        );
        info!(stream = %config.name, subjects = ?config.subjects, "stream created");
        Ok(())
    }

    fn publish(&self, subject: &str, data: Bytes) -> BusResult<()> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(BusError::Unreachable("connection lost".into()));
        }

        let mut streams = self.streams.write().expect("bus lock poisoned");
        let stream = streams
            .values_mut()
            .find(|s| s.config.captures(subject))
            .ok_or_else(|| BusError::NoStream(subject.to_string()))?;

        let message = BusMessage {
            sequence: stream.messages.len() as u64 + 1,
            subject: subject.to_string(),
            data,
        };
        // No live subscribers is fine; the message is retained on the stream.
        let _ = stream.sender.send(message.clone());
        debug!(subject, sequence = message.sequence, "message published");
        stream.messages.push(message);
        Ok(())
    }
}

struct InMemoryStreamContext {
    state: Arc<BusState>,
}

impl StreamContext for InMemoryStreamContext {
    fn ensure_stream(&self, config: &StreamConfig) -> BusResult<()> {
        self.state.ensure_stream(config)
    }

    fn publish_async(&self, subject: &str, data: Bytes) -> BusResult<()> {
        self.state.publish(subject, data)
    }
}

/// In-process message bus with persistent streams and live fan-out.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct InMemoryBus {
    state: Arc<BusState>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus whose live subscribers buffer up to `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(BusState {
                reachable: AtomicBool::new(true),
                streams: RwLock::new(HashMap::new()),
                channel_capacity: capacity,
            }),
        }
    }

    /// Simulate losing or regaining the connection.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Receive every message published to `stream` from now on.
    pub fn subscribe(&self, stream: &str) -> Option<broadcast::Receiver<BusMessage>> {
        self.state
            .streams
            .read()
            .expect("bus lock poisoned")
            .get(stream)
            .map(|s| s.sender.subscribe())
    }

    /// All messages retained on `stream`, oldest first.
    pub fn messages(&self, stream: &str) -> Vec<BusMessage> {
        self.state
            .streams
            .read()
            .expect("bus lock poisoned")
            .get(stream)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Configuration of `stream`, if it exists.
    pub fn stream_config(&self, stream: &str) -> Option<StreamConfig> {
        self.state
            .streams
            .read()
            .expect("bus lock poisoned")
            .get(stream)
            .map(|s| s.config.clone())
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusConnector for InMemoryBus {
    async fn acquire_stream_context(&self) -> BusResult<Arc<dyn StreamContext>> {
        if !self.state.reachable.load(Ordering::SeqCst) {
            return Err(BusError::Unreachable("no route to bus".into()));
        }
        Ok(Arc::new(InMemoryStreamContext {
            state: Arc::clone(&self.state),
        }))
    }
}

impl std::fmt::Debug for InMemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let streams = self.state.streams.read().expect("bus lock poisoned").len();
        f.debug_struct("InMemoryBus")
            .field("streams", &streams)
            .field("reachable", &self.state.reachable.load(Ordering::SeqCst))
            .finish()
    }
}
