//! Sinks: downstream consumers of emitted records.

mod stdout;

use async_trait::async_trait;

use crate::error::SinkError;
use tributary_core::record::Record;

pub use stdout::StdoutSink;

/// A destination for delivered record batches.
#[async_trait]
pub trait Sink: Send {
    /// Write one batch of records.
    async fn deliver(&mut self, batch: &[Record]) -> Result<(), SinkError>;
}
