//! tributary-core: Shared components for the tributary streaming pipeline engine.
//!
//! This crate contains the primitives the engine crate builds on:
//!
//! - `record` - The schema-agnostic record model flowing through pipelines
//! - `transaction` - Ack-gated delivery tickets for downstream handoff
//! - `config/` - Config paths, multi-file loading, env interpolation, CLI args
//! - `topology` - Orchestration for running multiple stream pipelines
//! - `metrics/` - Prometheus metrics infrastructure and internal events
//! - `signal` - Signal handling for graceful shutdown
//! - `tracing` - Tracing initialization
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod record;
pub mod signal;
pub mod topology;
pub mod tracing;
pub mod transaction;

// Re-export commonly used items
pub use config::{
    CliArgs, ComponentKey, ConfigPath, GlobalConfig, Mergeable, MetricsConfig, interpolate,
    load_from_paths,
};
pub use error::{ConfigError, MetricsError, SetupError};
pub use record::{Record, lookup_path, scalar_key};
pub use signal::shutdown_signal;
pub use topology::{Pipeline, PipelineContext, PipelineRunner, random_jitter, run_pipelines};
pub use tracing::init_tracing;
pub use transaction::{AckReceiver, AckStatus, Transaction};
