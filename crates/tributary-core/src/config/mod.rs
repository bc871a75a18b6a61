//! Common configuration types.

mod component_key;
mod loader;
mod vars;

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

pub use component_key::ComponentKey;
pub use loader::{Mergeable, load_from_paths};
pub use vars::{InterpolationResult, interpolate};

/// Default address for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

/// Command-line arguments shared by tributary binaries.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct CliArgs {
    /// Config file or directory paths (repeatable).
    #[arg(short, long = "config")]
    pub config: Vec<PathBuf>,
}

impl CliArgs {
    /// Resolve the raw path arguments into file/directory config paths.
    pub fn config_paths(&self) -> Vec<ConfigPath> {
        self.config
            .iter()
            .map(|p| {
                if p.is_dir() {
                    ConfigPath::Dir(p.clone())
                } else {
                    ConfigPath::File(p.clone())
                }
            })
            .collect()
    }
}

/// A config source: a single YAML file or a directory of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    File(PathBuf),
    Dir(PathBuf),
}

/// Whether the path has a YAML extension.
pub fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Engine-wide settings shared by every stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Maximum random delay in seconds before each stream starts.
    #[serde(default)]
    pub start_jitter_secs: u64,
}

impl GlobalConfig {
    /// Merge non-default values from another config (later files win).
    pub fn merge_from(&mut self, other: GlobalConfig) {
        if other.start_jitter_secs != 0 {
            self.start_jitter_secs = other.start_jitter_secs;
        }
    }
}

/// Metrics endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Address to bind the Prometheus exporter to.
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

fn default_metrics_address() -> String {
    DEFAULT_METRICS_ADDR.to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: default_metrics_address(),
        }
    }
}

impl MetricsConfig {
    /// Merge non-default values from another config (later files win).
    pub fn merge_from(&mut self, other: MetricsConfig) {
        if other.address != DEFAULT_METRICS_ADDR {
            self.address = other.address;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yaml_file() {
        assert!(is_yaml_file(Path::new("config.yaml")));
        assert!(is_yaml_file(Path::new("config.yml")));
        assert!(!is_yaml_file(Path::new("config.toml")));
        assert!(!is_yaml_file(Path::new("config")));
    }

    #[test]
    fn test_global_merge_keeps_existing_on_default() {
        let mut base = GlobalConfig {
            start_jitter_secs: 5,
        };
        base.merge_from(GlobalConfig::default());
        assert_eq!(base.start_jitter_secs, 5);

        base.merge_from(GlobalConfig {
            start_jitter_secs: 9,
        });
        assert_eq!(base.start_jitter_secs, 9);
    }

    #[test]
    fn test_metrics_merge() {
        let mut base = MetricsConfig::default();
        base.merge_from(MetricsConfig {
            address: "127.0.0.1:9999".to_string(),
        });
        assert_eq!(base.address, "127.0.0.1:9999");

        base.merge_from(MetricsConfig::default());
        assert_eq!(base.address, "127.0.0.1:9999");
    }
}
