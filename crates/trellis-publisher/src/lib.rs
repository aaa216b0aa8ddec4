//! Publication engine for Trellis.
//!
//! Turns the transaction graph into ordered delivery of
//! `(transaction, payload)` pairs to in-process subscribers. Transactions
//! and payloads arrive independently; a transaction is delivered once its
//! payload is present and every ancestor has been delivered. Transactions
//! whose payload is private are forwarded to the message bus instead, so
//! their recipients can fetch the payload out of band.
//!
//! There is no retry timer. Every admitted transaction and every written
//! payload triggers a publish cycle, and a cycle resumes wherever the last
//! one stopped.

pub mod config;
pub mod error;
pub mod publisher;
pub mod subscription;

pub use config::PublisherConfig;
pub use error::{PublishError, PublishResult};
pub use publisher::{Publisher, PublisherStatus};
pub use subscription::{
    deliver_to, Chain, DeliveryFailure, DeliveryReport, EventType, Receiver, SubscriptionTable,
    ANY_PAYLOAD_TYPE,
};
