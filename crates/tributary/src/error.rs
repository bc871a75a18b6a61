//! Error types for the tributary engine.

use snafu::prelude::*;

// Re-export common errors
pub use tributary_core::error::{ConfigError, MetricsError, SetupError};

/// Errors reported by bounded input sources.
///
/// `NotReady` is the one recoverable variant: the backing resource does not
/// exist yet and the chain driver retries the open with backoff. Everything
/// else is fatal for the run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum InputError {
    /// The backing resource does not exist yet; retried by the driver.
    #[snafu(display("Source not ready: {message}"))]
    NotReady { message: String },

    /// Failed to open the backing resource for a permanent reason.
    #[snafu(display("Failed to open {path}: {source}"))]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// IO error while reading from an open source.
    #[snafu(display("IO error reading {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Failed to decode a unit of input.
    #[snafu(display("Failed to decode {path} line {line}: {message}"))]
    Decode {
        path: String,
        line: u64,
        message: String,
    },

    /// No registered input matches the configured type name.
    #[snafu(display("Unknown input type '{kind}'"))]
    UnknownType { kind: String },

    /// The type-erased input options failed to deserialize.
    #[snafu(display("Invalid config for input '{kind}': {source}"))]
    BuildConfig {
        kind: String,
        source: serde_yaml::Error,
    },

    /// The input was configured without any paths.
    #[snafu(display("Input '{kind}' requires at least one path"))]
    NoPaths { kind: String },
}

impl InputError {
    /// Whether this error is the recoverable "resource not there yet" case.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, InputError::NotReady { .. })
    }
}

/// Errors from the sequential join input's chain driver.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SequenceError {
    /// A source in the chain failed fatally.
    #[snafu(context(false))]
    #[snafu(display("{source}"))]
    Input { source: InputError },

    /// A record lacks the configured join key path.
    #[snafu(display("Record is missing join key path '{path}'"))]
    MissingJoinKey { path: String },

    /// The value at the join key path is not a scalar.
    #[snafu(display("Join key at '{path}' is not a scalar value"))]
    JoinKeyNotScalar { path: String },

    /// A source stayed not-ready past the configured bound.
    #[snafu(display(
        "Source {source_index} was still not ready after {waited_secs}s"
    ))]
    NotReadyTimeout {
        source_index: usize,
        waited_secs: u64,
    },

    /// The downstream consumer dropped the transaction channel.
    #[snafu(display("Downstream consumer dropped the transaction channel"))]
    ChannelClosed,
}

/// Errors that can occur while writing to a sink.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Failed to write a record to the sink.
    #[snafu(display("Failed to write record: {source}"))]
    Write { source: std::io::Error },
}

/// Top-level engine errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Input construction error.
    #[snafu(display("Input error: {source}"))]
    Input { source: InputError },

    /// Sequence chain error.
    #[snafu(display("Sequence error: {source}"))]
    Sequence { source: SequenceError },

    /// Sink error.
    #[snafu(display("Sink error: {source}"))]
    Sink { source: SinkError },

    /// The input did not finish closing within the allowed time.
    #[snafu(display("Input did not close within {timeout_secs}s"))]
    CloseTimeout { timeout_secs: u64 },

    /// Setup error.
    #[snafu(display("Setup error: {source}"))]
    Setup { source: SetupError },
}

impl From<ConfigError> for EngineError {
    fn from(source: ConfigError) -> Self {
        EngineError::Config { source }
    }
}

impl From<InputError> for EngineError {
    fn from(source: InputError) -> Self {
        EngineError::Input { source }
    }
}

impl From<SequenceError> for EngineError {
    fn from(source: SequenceError) -> Self {
        EngineError::Sequence { source }
    }
}

impl From<SinkError> for EngineError {
    fn from(source: SinkError) -> Self {
        EngineError::Sink { source }
    }
}

impl From<SetupError> for EngineError {
    fn from(source: SetupError) -> Self {
        EngineError::Setup { source }
    }
}
