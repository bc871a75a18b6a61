//! Configuration for the tributary engine.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use tributary_core::config::{ComponentKey, ConfigPath, GlobalConfig, Mergeable, MetricsConfig};
use tributary_core::error::{
    EmptyInputChainSnafu, IterationsWithoutIdPathSnafu, ZeroIterationsSnafu,
};

/// Main configuration: a map of named streams plus engine-wide settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Configured streams, keyed by name.
    #[serde(default)]
    pub streams: IndexMap<ComponentKey, StreamConfig>,
    /// Engine-wide settings.
    #[serde(default)]
    pub global: GlobalConfig,
    /// Metrics endpoint settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load, merge, and validate config from the given paths.
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config: Self = tributary_core::config::load_from_paths(paths)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every configured stream.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, stream) in &self.streams {
            stream.sequence.validate(key.id())?;
        }
        Ok(())
    }

    /// Number of configured streams.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

impl Mergeable for Config {
    type Key = ComponentKey;
    type Component = StreamConfig;

    fn components(&self) -> &IndexMap<ComponentKey, StreamConfig> {
        &self.streams
    }
    fn components_mut(&mut self) -> &mut IndexMap<ComponentKey, StreamConfig> {
        &mut self.streams
    }
    fn global(&self) -> &GlobalConfig {
        &self.global
    }
    fn global_mut(&mut self) -> &mut GlobalConfig {
        &mut self.global
    }
    fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }
    fn metrics_mut(&mut self) -> &mut MetricsConfig {
        &mut self.metrics
    }
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::YamlParse { source })
    }
}

/// Configuration for one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// The stream's input chain.
    pub sequence: SequenceConfig,
}

/// Configuration for the sequential multi-source input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Ordered chain of input sources.
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
    /// Optional join across the chain's sources.
    #[serde(default)]
    pub sharded_join: ShardedJoinConfig,
    /// Seconds to wait for an in-flight transaction to resolve on shutdown.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
    /// Maximum seconds to wait for a not-ready source before failing.
    /// Absent means wait indefinitely.
    #[serde(default)]
    pub not_ready_timeout_secs: Option<u64>,
}

fn default_drain_timeout() -> u64 {
    5
}

impl SequenceConfig {
    /// Validate this sequence config for the named stream.
    pub fn validate(&self, stream: &str) -> Result<(), ConfigError> {
        snafu::ensure!(!self.inputs.is_empty(), EmptyInputChainSnafu { stream });
        snafu::ensure!(
            self.sharded_join.iterations >= 1,
            ZeroIterationsSnafu { stream }
        );
        snafu::ensure!(
            self.sharded_join.iterations == 1 || self.sharded_join.enabled(),
            IterationsWithoutIdPathSnafu { stream }
        );
        Ok(())
    }
}

/// One entry of the input chain: a type name plus type-specific options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Registered input type name (e.g. `lines`, `csv`, `ndjson`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific options, deserialized by the registered builder.
    #[serde(flatten)]
    pub options: serde_yaml::Value,
}

/// Join settings for the sequential input.
///
/// Join mode is enabled by a non-empty `id_path`. `iterations` splits the key
/// space into that many shards, re-reading the whole chain once per shard to
/// bound accumulator memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardedJoinConfig {
    /// Field path of the join key; empty disables joining.
    #[serde(default)]
    pub id_path: String,
    /// Shard count (and therefore pass count). Minimum 1.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Join type.
    #[serde(rename = "type", default)]
    pub join_type: JoinType,
    /// Conflict resolution for colliding scalar fields.
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
}

fn default_iterations() -> u32 {
    1
}

impl Default for ShardedJoinConfig {
    fn default() -> Self {
        Self {
            id_path: String::new(),
            iterations: default_iterations(),
            join_type: JoinType::default(),
            merge_strategy: MergeStrategy::default(),
        }
    }
}

impl ShardedJoinConfig {
    /// Whether join mode is enabled.
    pub fn enabled(&self) -> bool {
        !self.id_path.is_empty()
    }
}

/// How the join decides when to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    /// Accumulate everything; emit the full key union at end of pass.
    #[default]
    #[serde(rename = "full-outer")]
    FullOuter,
    /// Emit on each record of the final source; other keys are never emitted.
    #[serde(rename = "outer")]
    Outer,
}

/// Conflict resolution applied when a field collides on merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Collect colliding values into an ordered list.
    #[default]
    Array,
    /// Incoming value overwrites the existing one.
    Replace,
    /// Existing value wins; incoming is discarded.
    Keep,
}
