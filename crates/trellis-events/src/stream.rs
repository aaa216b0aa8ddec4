use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::BusResult;

/// Declaration of a persistent stream capturing a set of subjects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    pub subjects: Vec<String>,
}

impl StreamConfig {
    pub fn new(name: impl Into<String>, subjects: Vec<String>) -> Self {
        Self {
            name: name.into(),
            subjects,
        }
    }

    /// Returns `true` if the stream captures `subject`.
    pub fn captures(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }
}

/// A message stored on a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    /// Position in the owning stream, starting at 1.
    pub sequence: u64,
    pub subject: String,
    pub data: Bytes,
}

/// Source of stream contexts.
#[async_trait]
pub trait BusConnector: Send + Sync {
    /// Obtain a context for stream management and publishing. May wait on
    /// the network; callers bound it with their own deadline.
    async fn acquire_stream_context(&self) -> BusResult<Arc<dyn StreamContext>>;
}

/// Handle for managing streams and publishing onto them.
pub trait StreamContext: Send + Sync {
    /// Create the stream unless an identical one exists.
    fn ensure_stream(&self, config: &StreamConfig) -> BusResult<()>;

    /// Hand a message to the bus without waiting for acknowledgement.
    fn publish_async(&self, subject: &str, data: Bytes) -> BusResult<()>;
}
