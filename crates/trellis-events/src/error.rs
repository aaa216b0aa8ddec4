/// Errors produced by the message bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// No connection to the bus could be established.
    #[error("bus unreachable: {0}")]
    Unreachable(String),

    /// A stream with this name exists with a different subject list.
    #[error("stream {name} already exists with subjects {existing:?}")]
    StreamConflict { name: String, existing: Vec<String> },

    /// The subject is already captured by another stream.
    #[error("subject {subject} is already bound to stream {stream}")]
    SubjectOverlap { subject: String, stream: String },

    /// Nothing listens on the subject: no stream captures it.
    #[error("no stream captures subject {0}")]
    NoStream(String),

    /// A stream configuration is unusable.
    #[error("invalid stream config: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the bus crate.
pub type BusResult<T> = std::result::Result<T, BusError>;
