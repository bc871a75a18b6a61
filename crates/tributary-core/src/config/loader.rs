//! Multi-file configuration loading.

use std::path::Path;

use indexmap::IndexMap;

use crate::config::{ConfigPath, GlobalConfig, MetricsConfig, interpolate, is_yaml_file};
use crate::error::ConfigError;

/// Trait for configs that can be merged from multiple files.
pub trait Mergeable: Sized + Default {
    type Key: Eq + std::hash::Hash + Clone + std::fmt::Display;
    type Component;

    fn components(&self) -> &IndexMap<Self::Key, Self::Component>;
    fn components_mut(&mut self) -> &mut IndexMap<Self::Key, Self::Component>;
    fn global(&self) -> &GlobalConfig;
    fn global_mut(&mut self) -> &mut GlobalConfig;
    fn metrics(&self) -> &MetricsConfig;
    fn metrics_mut(&mut self) -> &mut MetricsConfig;
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError>;

    fn merge(&mut self, mut other: Self) -> Result<(), ConfigError> {
        let duplicates: Vec<String> = other
            .components_mut()
            .keys()
            .filter(|key: &&Self::Key| self.components().contains_key(*key))
            .map(|key: &Self::Key| key.to_string())
            .collect();

        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateComponents { keys: duplicates });
        }

        for (key, component) in other.components_mut().drain(..) {
            self.components_mut().insert(key, component);
        }

        self.global_mut()
            .merge_from(std::mem::take(other.global_mut()));
        self.metrics_mut()
            .merge_from(std::mem::take(other.metrics_mut()));
        Ok(())
    }
}

/// Load and merge a config from the given files and directories.
pub fn load_from_paths<C: Mergeable>(paths: &[ConfigPath]) -> Result<C, ConfigError> {
    let mut config = C::default();
    let mut errors = Vec::new();

    for path in paths {
        let (display, loaded) = match path {
            ConfigPath::File(file_path) => (file_path, load_file::<C>(file_path)),
            ConfigPath::Dir(dir_path) => (dir_path, load_dir::<C>(dir_path)),
        };
        match loaded {
            Ok(partial) => {
                if let Err(e) = config.merge(partial) {
                    errors.push(format!("{}: {}", display.display(), e));
                }
            }
            Err(e) => errors.push(format!("{}: {}", display.display(), e)),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(config)
}

fn load_file<C: Mergeable>(path: &Path) -> Result<C, ConfigError> {
    if !is_yaml_file(path) {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents =
        std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { source })?;

    let result = interpolate(&contents);
    if !result.is_ok() {
        return Err(ConfigError::EnvInterpolation {
            message: result.errors.join("\n"),
        });
    }

    C::parse_yaml(&result.text)
}

fn load_dir<C: Mergeable>(dir: &Path) -> Result<C, ConfigError> {
    let mut config = C::default();
    let mut errors = Vec::new();

    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| ConfigError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let path = entry.path();
            path.is_file() && is_yaml_file(&path)
        })
        .collect();

    files.sort_by_key(|e| e.path());

    for entry in files {
        let path = entry.path();
        match load_file::<C>(&path) {
            Ok(partial) => {
                if let Err(e) = config.merge(partial) {
                    errors.push(format!("{}: {}", path.display(), e));
                }
            }
            Err(e) => errors.push(format!("{}: {}", path.display(), e)),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        streams: IndexMap<String, u32>,
        #[serde(default)]
        global: GlobalConfig,
        #[serde(default)]
        metrics: MetricsConfig,
    }

    impl Mergeable for TestConfig {
        type Key = String;
        type Component = u32;

        fn components(&self) -> &IndexMap<String, u32> {
            &self.streams
        }
        fn components_mut(&mut self) -> &mut IndexMap<String, u32> {
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

    #[test]
    fn test_merge_disjoint_components() {
        let mut a = TestConfig::parse_yaml("streams:\n  one: 1\n").unwrap();
        let b = TestConfig::parse_yaml("streams:\n  two: 2\n").unwrap();
        a.merge(b).unwrap();
        assert_eq!(a.streams.len(), 2);
    }

    #[test]
    fn test_merge_duplicate_components_rejected() {
        let mut a = TestConfig::parse_yaml("streams:\n  one: 1\n").unwrap();
        let b = TestConfig::parse_yaml("streams:\n  one: 9\n").unwrap();
        let err = a.merge(b).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateComponents { keys } if keys == ["one"]));
    }

    #[test]
    fn test_load_from_dir_merges_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "streams:\n  two: 2\n").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "streams:\n  one: 1\n").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not yaml").unwrap();

        let config: TestConfig =
            load_from_paths(&[ConfigPath::Dir(dir.path().to_path_buf())]).unwrap();
        let keys: Vec<_> = config.streams.keys().cloned().collect();
        assert_eq!(keys, ["one", "two"]);
    }

    #[test]
    fn test_load_missing_file_reports_error() {
        let result: Result<TestConfig, _> =
            load_from_paths(&[ConfigPath::File("/nonexistent/config.yaml".into())]);
        assert!(matches!(result, Err(ConfigError::MultipleErrors { .. })));
    }
}
