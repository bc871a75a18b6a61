//! Line-oriented stdout sink.

use async_trait::async_trait;
use snafu::ResultExt;
use tokio::io::{AsyncWriteExt, BufWriter, Stdout};

use super::Sink;
use crate::error::{SinkError, WriteSnafu};
use tributary_core::record::Record;

/// Writes each record as one line to stdout.
///
/// String-scalar records print raw; everything else prints as compact JSON.
pub struct StdoutSink {
    out: BufWriter<Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: BufWriter::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn deliver(&mut self, batch: &[Record]) -> Result<(), SinkError> {
        for record in batch {
            let mut line = record.render();
            line.push('\n');
            self.out
                .write_all(line.as_bytes())
                .await
                .context(WriteSnafu)?;
        }
        self.out.flush().await.context(WriteSnafu)
    }
}
