//! Input type registry.
//!
//! Maps a config `type` name to a short summary plus a builder closure that
//! deserializes the type-erased options payload and constructs the input.
//! Third-party inputs register through the same table as the built-ins.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use super::{BoxedInput, CsvInput, LinesInput, NdjsonInput};
use crate::error::{InputError, UnknownTypeSnafu};
use crate::input::documents::NdjsonConfig;
use crate::input::lines::LinesConfig;
use crate::input::tabular::CsvConfig;

type BuildFn = Box<dyn Fn(serde_yaml::Value) -> Result<BoxedInput, InputError> + Send + Sync>;

struct RegisteredInput {
    summary: &'static str,
    build: BuildFn,
}

/// Registry of constructible input types.
pub struct InputRegistry {
    entries: IndexMap<&'static str, RegisteredInput>,
}

impl InputRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Create a registry with the built-in input types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("lines", "Plain-text files read line by line", |c: LinesConfig| {
            LinesInput::new(c).map(|i| Box::new(i) as BoxedInput)
        });
        registry.register("csv", "CSV files with a header row", |c: CsvConfig| {
            CsvInput::new(c).map(|i| Box::new(i) as BoxedInput)
        });
        registry.register("ndjson", "Line-delimited JSON documents", |c: NdjsonConfig| {
            NdjsonInput::new(c).map(|i| Box::new(i) as BoxedInput)
        });
        registry
    }

    /// Register an input type under a name.
    ///
    /// The builder receives the typed configuration deserialized from the
    /// input's options payload.
    pub fn register<C, F>(&mut self, name: &'static str, summary: &'static str, build: F)
    where
        C: DeserializeOwned,
        F: Fn(C) -> Result<BoxedInput, InputError> + Send + Sync + 'static,
    {
        let build: BuildFn = Box::new(move |options: serde_yaml::Value| {
            let config: C = serde_yaml::from_value(options)
                .map_err(|source| InputError::BuildConfig {
                    kind: name.to_string(),
                    source,
                })?;
            build(config)
        });
        self.entries.insert(name, RegisteredInput { summary, build });
    }

    /// Construct an input of the named type from its options payload.
    pub fn build(&self, kind: &str, options: serde_yaml::Value) -> Result<BoxedInput, InputError> {
        let entry = self
            .entries
            .get(kind)
            .ok_or_else(|| UnknownTypeSnafu { kind }.build())?;
        (entry.build)(options)
    }

    /// Registered type names with their summaries.
    pub fn types(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.entries
            .iter()
            .map(|(name, entry)| (*name, entry.summary))
    }
}

impl Default for InputRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
