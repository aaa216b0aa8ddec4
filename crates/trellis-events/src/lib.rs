//! Message bus connector for Trellis.
//!
//! The transaction graph is not the only delivery path: transactions whose
//! payload is private are forwarded over a message bus so the intended
//! recipients can fetch the payload out of band. This crate defines the
//! narrow connector interface the publisher needs and an in-process bus
//! implementing it.

pub mod error;
pub mod memory;
pub mod stream;

pub use error::{BusError, BusResult};
pub use memory::InMemoryBus;
pub use stream::{BusConnector, BusMessage, StreamConfig, StreamContext};

/// Stream holding forwarded private transactions.
pub const PRIVATE_TRANSACTIONS_STREAM: &str = "PRIVATE_TRANSACTIONS";

/// Subject private transactions are published on.
pub const PRIVATE_TRANSACTIONS_SUBJECT: &str = "trellis.private-transactions";
