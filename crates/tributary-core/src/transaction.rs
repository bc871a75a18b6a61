//! Ack-gated delivery tickets.
//!
//! A [`Transaction`] pairs a batch of records with a single-resolution
//! acknowledgement primitive. The producer keeps the [`AckReceiver`] half and
//! suspends on it; the consumer resolves the ticket exactly once with
//! [`Transaction::commit`] or [`Transaction::reject`]. Move semantics make a
//! double resolution unrepresentable; dropping the transaction without
//! resolving it closes the channel, which the producer observes as a receive
//! error.

use tokio::sync::oneshot;

use crate::record::Record;

/// Outcome of a downstream delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckStatus {
    /// The consumer accepted the batch.
    Committed,
    /// The consumer refused the batch; the producer must redeliver.
    Rejected { reason: String },
}

/// Producer-side handle resolved when the consumer acks.
pub type AckReceiver = oneshot::Receiver<AckStatus>;

/// One unit of acknowledgement-gated downstream delivery.
#[derive(Debug)]
pub struct Transaction {
    batch: Vec<Record>,
    ack: oneshot::Sender<AckStatus>,
}

impl Transaction {
    /// Create a transaction for a batch of records.
    ///
    /// Returns the transaction (handed to the consumer) and the ack receiver
    /// (kept by the producer).
    pub fn new(batch: Vec<Record>) -> (Self, AckReceiver) {
        let (ack, rx) = oneshot::channel();
        (Self { batch, ack }, rx)
    }

    /// Create a single-record transaction.
    pub fn single(record: Record) -> (Self, AckReceiver) {
        Self::new(vec![record])
    }

    /// The records carried by this transaction.
    pub fn records(&self) -> &[Record] {
        &self.batch
    }

    /// Resolve the transaction as successfully delivered.
    pub fn commit(self) {
        let _ = self.ack.send(AckStatus::Committed);
    }

    /// Resolve the transaction as refused; the producer will redeliver.
    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.ack.send(AckStatus::Rejected {
            reason: reason.into(),
        });
    }
}
