//! Orchestration primitives for running stream pipelines.
//!
//! Each configured stream runs as one [`Pipeline`]; the [`PipelineRunner`]
//! spawns them with jittered starts, collects results, and wires the shutdown
//! signal to a shared cancellation token.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use snafu::ResultExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{GlobalConfig, MetricsConfig};
use crate::error::{AddressParseSnafu, MetricsSnafu, SetupError};
use crate::signal::shutdown_signal;

/// Shared resources for pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Maximum jitter in seconds to add before each pipeline starts.
    pub start_jitter_secs: u64,
    /// Cancellation token for graceful shutdown.
    pub shutdown: CancellationToken,
}

/// A self-contained pipeline unit that can be executed.
pub trait Pipeline: Send + 'static {
    /// The key type used to identify this pipeline.
    type Key: Clone + Display + Send + 'static;

    /// The error type returned by this pipeline.
    type Error: std::error::Error + Send + 'static;

    /// Get a reference to the pipeline's key.
    fn key(&self) -> &Self::Key;

    /// Run this pipeline to completion.
    fn run(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Orchestrates multiple pipeline executions with shared shutdown handling.
pub struct PipelineRunner<P: Pipeline> {
    pipelines: Vec<P>,
    shutdown: CancellationToken,
    start_jitter_secs: u64,
    typetag: &'static str,
}

impl<P: Pipeline> PipelineRunner<P> {
    /// Create a new pipeline runner.
    pub fn new(
        pipelines: Vec<P>,
        shutdown: CancellationToken,
        start_jitter_secs: u64,
        typetag: &'static str,
    ) -> Self {
        Self {
            pipelines,
            shutdown,
            start_jitter_secs,
            typetag,
        }
    }

    /// Spawn the shutdown signal handler.
    pub fn spawn_shutdown_handler(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    /// Run all pipelines to completion.
    pub async fn run(self) {
        let mut handles: JoinSet<(P::Key, Result<(), P::Error>)> = JoinSet::new();
        let typetag = self.typetag;

        for pipeline in self.pipelines {
            let shutdown = self.shutdown.clone();
            let key = pipeline.key().clone();
            let start_jitter = random_jitter(self.start_jitter_secs);

            handles.spawn(async move {
                // Stagger start times, but respect shutdown signal
                if !start_jitter.is_zero() {
                    info!(
                        target = %key,
                        jitter_secs = start_jitter.as_secs(),
                        "Delaying {} start for jitter", typetag
                    );
                    if shutdown
                        .run_until_cancelled(tokio::time::sleep(start_jitter))
                        .await
                        .is_none()
                    {
                        info!(target = %key, "Shutdown requested during jitter delay");
                        return (key, Ok(()));
                    }
                }

                let result = pipeline.run().await;
                (key, result)
            });
        }

        info!("Spawned {} {} tasks", handles.len(), typetag);

        while let Some(result) = handles.join_next().await {
            match result {
                Ok((key, Ok(()))) => {
                    info!(target = %key, "{} completed", typetag);
                }
                Ok((key, Err(e))) => {
                    error!(target = %key, error = %e, "{} failed", typetag);
                }
                Err(e) => {
                    error!(error = %e, "{} task panicked", typetag);
                }
            }
        }

        info!("All {}s complete", typetag);
    }
}

/// Run pipelines with shared setup logic.
///
/// Initializes the metrics exporter, creates the shutdown token and context,
/// builds the pipelines via the provided closure, and runs them all with
/// graceful shutdown handling.
pub async fn run_pipelines<P, F>(
    metrics: &MetricsConfig,
    global: &GlobalConfig,
    typetag: &'static str,
    create_pipelines: F,
) -> Result<(), SetupError>
where
    P: Pipeline,
    F: FnOnce(PipelineContext) -> Vec<P>,
{
    let addr = metrics.address.parse().context(AddressParseSnafu)?;
    crate::metrics::init(addr).context(MetricsSnafu)?;

    let shutdown = CancellationToken::new();
    let context = PipelineContext {
        start_jitter_secs: global.start_jitter_secs,
        shutdown: shutdown.clone(),
    };

    let pipelines = create_pipelines(context);

    let runner = PipelineRunner::new(pipelines, shutdown, global.start_jitter_secs, typetag);
    runner.spawn_shutdown_handler();
    runner.run().await;

    Ok(())
}

/// Generate a random jitter duration up to the specified maximum seconds.
pub fn random_jitter(max_secs: u64) -> Duration {
    if max_secs > 0 {
        Duration::from_millis(rand::rng().random_range(0..max_secs * 1000))
    } else {
        Duration::ZERO
    }
}
