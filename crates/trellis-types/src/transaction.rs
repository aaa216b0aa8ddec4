//! Graph transactions.
//!
//! A [`Transaction`] is the unit the graph stores. Its identity is the hash
//! of its encoded [`TransactionHeader`]; the payload it describes lives in a
//! separate store and is linked through [`PayloadHash`].

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::{PayloadHash, TransactionRef};

/// The encoded content of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Causal parents. Empty for a root transaction.
    pub prevs: Vec<TransactionRef>,
    /// Hash of the payload this transaction describes.
    pub payload_hash: PayloadHash,
    /// Content type of the payload, e.g. `application/did+json`.
    pub payload_type: String,
    /// Private address list: one opaque recipient marker per intended
    /// recipient. Non-empty means the payload is not distributed on the
    /// open graph.
    pub pal: Vec<Vec<u8>>,
    /// Lamport clock, one more than the highest parent clock.
    pub lamport_clock: u64,
}

impl TransactionHeader {
    /// Header for a public root transaction.
    pub fn new(payload_type: impl Into<String>, payload_hash: PayloadHash) -> Self {
        Self {
            prevs: Vec::new(),
            payload_hash,
            payload_type: payload_type.into(),
            pal: Vec::new(),
            lamport_clock: 0,
        }
    }

    pub fn with_prevs(mut self, prevs: Vec<TransactionRef>) -> Self {
        self.prevs = prevs;
        self
    }

    pub fn with_pal(mut self, pal: Vec<Vec<u8>>) -> Self {
        self.pal = pal;
        self
    }

    pub fn with_lamport_clock(mut self, clock: u64) -> Self {
        self.lamport_clock = clock;
        self
    }
}

/// An immutable transaction as admitted to the graph.
///
/// Holds the header together with its exact encoded bytes, so the bytes
/// forwarded for private transactions are the ones the reference was
/// computed over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    reference: TransactionRef,
    header: TransactionHeader,
    data: Vec<u8>,
}

impl Transaction {
    /// Encode a header into a transaction.
    pub fn new(header: TransactionHeader) -> Result<Self, TypeError> {
        let data =
            bincode::serialize(&header).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::from_parts(header, data))
    }

    /// Decode a transaction from its encoded bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, TypeError> {
        let header: TransactionHeader =
            bincode::deserialize(&data).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::from_parts(header, data))
    }

    fn from_parts(header: TransactionHeader, data: Vec<u8>) -> Self {
        Self {
            reference: TransactionRef::from_bytes(&data),
            header,
            data,
        }
    }

    pub fn reference(&self) -> TransactionRef {
        self.reference
    }

    pub fn prevs(&self) -> &[TransactionRef] {
        &self.header.prevs
    }

    pub fn payload_hash(&self) -> PayloadHash {
        self.header.payload_hash
    }

    pub fn payload_type(&self) -> &str {
        &self.header.payload_type
    }

    /// The private address list.
    pub fn pal(&self) -> &[Vec<u8>] {
        &self.header.pal
    }

    /// Returns `true` if the transaction names private recipients.
    pub fn is_private(&self) -> bool {
        !self.header.pal.is_empty()
    }

    pub fn lamport_clock(&self) -> u64 {
        self.header.lamport_clock
    }

    /// Returns `true` if the transaction has no parents.
    pub fn is_root(&self) -> bool {
        self.header.prevs.is_empty()
    }

    /// The encoded bytes the reference was computed over.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> &TransactionHeader {
        &self.header
    }
}
