//! tributary: A streaming pipeline engine built around a sequential
//! multi-source join input.
//!
//! A stream drains an ordered chain of bounded inputs (plain-text lines,
//! CSV rows, NDJSON documents), optionally correlates records across them by
//! a join key under a bounded-memory sharding scheme, and delivers each
//! emitted record downstream as an acknowledgement-gated transaction.

pub mod config;
pub mod error;
pub mod input;
pub mod sink;
pub mod stream;

// Re-export commonly used items
pub use config::{
    Config, InputConfig, JoinType, MergeStrategy, SequenceConfig, ShardedJoinConfig, StreamConfig,
};
pub use error::{EngineError, InputError, SequenceError, SinkError};
pub use input::{BoxedInput, Input, InputRegistry, SequenceInput};
pub use sink::{Sink, StdoutSink};
pub use stream::StreamPipeline;
pub use tributary_core::{CliArgs, Record, Transaction, init_tracing, run_pipelines};
