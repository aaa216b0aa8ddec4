use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the publisher.
///
/// Only [`Publisher::start`](crate::Publisher::start) and the control
/// requests return these to callers; the rest are logged by the publishing
/// task.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The message bus refused a connection or a stream declaration.
    #[error("message bus error: {0}")]
    Bus(#[from] trellis_events::BusError),

    /// No bus connection was obtained within the configured deadline.
    #[error("timed out after {0:?} acquiring a bus connection")]
    AcquireTimeout(Duration),

    /// The graph store could not start a walk.
    #[error("graph error: {0}")]
    Dag(#[from] trellis_dag::DagError),

    /// The payload store failed a read.
    #[error("payload store error: {0}")]
    Payload(#[from] trellis_payload::PayloadError),

    /// Configuration failed to parse or validate.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `start` was called more than once.
    #[error("publisher already started")]
    AlreadyStarted,

    /// The publishing task is not running.
    #[error("publisher is not running")]
    NotRunning,
}

pub type PublishResult<T> = Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_events::BusError;

    #[test]
    fn stream_setup_failure_reads_as_bus_error() {
        let err = PublishError::from(BusError::SubjectOverlap {
            subject: "trellis.private-transactions".into(),
            stream: "OTHER".into(),
        });
        let message = err.to_string();
        assert!(message.starts_with("message bus error"));
        assert!(!message.contains("acquire"));
    }
}
