//! Internal events for tributary metrics emission.
//!
//! Each event struct represents a measurable occurrence in a stream pipeline.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.
//!
//! Metrics carry a `target` label naming the stream for multi-stream
//! deployments.

use metrics::counter;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when records are read from a source in the chain.
pub struct RecordsRead {
    pub count: u64,
    /// Source position within the chain.
    pub source: usize,
    /// Target label for multi-stream deployments.
    pub target: String,
}

impl InternalEvent for RecordsRead {
    fn emit(self) {
        trace!(count = self.count, source = self.source, target = %self.target, "Records read");
        counter!(
            "tributary_records_read_total",
            "source" => self.source.to_string(),
            "target" => self.target
        )
        .increment(self.count);
    }
}

/// Event emitted when a transaction is acknowledged by the consumer.
pub struct TransactionsDelivered {
    pub count: u64,
    /// Target label for multi-stream deployments.
    pub target: String,
}

impl InternalEvent for TransactionsDelivered {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Transactions delivered");
        counter!("tributary_transactions_delivered_total", "target" => self.target)
            .increment(self.count);
    }
}

/// Event emitted when the consumer rejects a transaction and it is requeued.
pub struct TransactionsRejected {
    pub count: u64,
    /// Target label for multi-stream deployments.
    pub target: String,
}

impl InternalEvent for TransactionsRejected {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Transactions rejected");
        counter!("tributary_transactions_rejected_total", "target" => self.target)
            .increment(self.count);
    }
}

/// Event emitted when accumulated join entries are flushed at end of pass.
pub struct JoinEntriesFlushed {
    pub count: u64,
    /// Shard/pass index that was flushed.
    pub pass: u32,
    /// Target label for multi-stream deployments.
    pub target: String,
}

impl InternalEvent for JoinEntriesFlushed {
    fn emit(self) {
        trace!(count = self.count, pass = self.pass, target = %self.target, "Join entries flushed");
        counter!("tributary_join_entries_flushed_total", "target" => self.target)
            .increment(self.count);
    }
}

/// Event emitted when a source open attempt finds the resource not ready.
pub struct SourceNotReady {
    /// Source position within the chain.
    pub source: usize,
    /// Target label for multi-stream deployments.
    pub target: String,
}

impl InternalEvent for SourceNotReady {
    fn emit(self) {
        trace!(source = self.source, target = %self.target, "Source not ready");
        counter!(
            "tributary_source_not_ready_total",
            "source" => self.source.to_string(),
            "target" => self.target
        )
        .increment(1);
    }
}
