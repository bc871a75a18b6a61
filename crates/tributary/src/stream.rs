//! Stream pipeline: a sequence input wired to a sink.

use std::time::Duration;

use tracing::info;

use tributary_core::config::ComponentKey;
use tributary_core::topology::{Pipeline, PipelineContext};

use crate::config::{Config, StreamConfig};
use crate::error::EngineError;
use crate::input::{InputRegistry, SequenceInput};
use crate::sink::{Sink, StdoutSink};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One configured stream: a sequential input chain feeding the stdout sink.
pub struct StreamPipeline {
    pub key: ComponentKey,
    pub config: StreamConfig,
    pub context: PipelineContext,
}

impl StreamPipeline {
    /// Create pipelines from configuration.
    pub fn from_config(config: &Config, context: PipelineContext) -> Vec<Self> {
        config
            .streams
            .iter()
            .map(|(key, cfg)| Self {
                key: key.clone(),
                config: cfg.clone(),
                context: context.clone(),
            })
            .collect()
    }

    async fn execute(self) -> Result<(), EngineError> {
        let registry = InputRegistry::with_builtins();
        let mut input = SequenceInput::new(self.key.clone(), self.config.sequence, &registry)?;
        let mut sink = StdoutSink::new();
        let shutdown = self.context.shutdown.clone();

        info!(target = %self.key, "Stream started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    input.close();
                    break;
                }
                txn = input.next_transaction() => match txn {
                    None => break,
                    Some(txn) => {
                        sink.deliver(txn.records()).await?;
                        txn.commit();
                    }
                }
            }
        }

        // Ack whatever is still in flight after a shutdown request, then
        // wait for the input to report closed.
        while let Some(txn) = input.next_transaction().await {
            sink.deliver(txn.records()).await?;
            txn.commit();
        }
        input.wait_for_close(CLOSE_TIMEOUT).await
    }
}

impl Pipeline for StreamPipeline {
    type Key = ComponentKey;
    type Error = EngineError;

    fn key(&self) -> &Self::Key {
        &self.key
    }

    async fn run(self) -> Result<(), Self::Error> {
        self.execute().await
    }
}
