//! Line-delimited JSON document input.
//!
//! Reads one or more NDJSON files in order: one JSON document per non-blank
//! line. Invalid JSON is a decode error carrying the line number.

use std::collections::VecDeque;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use snafu::ResultExt;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use super::{Input, open_file};
use crate::error::{DecodeSnafu, InputError, IoSnafu, NoPathsSnafu};
use tributary_core::record::Record;

/// Configuration for the NDJSON input.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NdjsonConfig {
    /// Files to read, drained in order.
    pub paths: Vec<PathBuf>,
}

struct ActiveFile {
    path: PathBuf,
    reader: Lines<BufReader<File>>,
    line: u64,
}

/// Reads line-delimited JSON documents.
pub struct NdjsonInput {
    paths: Vec<PathBuf>,
    readers: VecDeque<ActiveFile>,
}

impl NdjsonInput {
    /// Create an NDJSON input from its configuration.
    pub fn new(config: NdjsonConfig) -> Result<Self, InputError> {
        snafu::ensure!(!config.paths.is_empty(), NoPathsSnafu { kind: "ndjson" });
        Ok(Self {
            paths: config.paths,
            readers: VecDeque::new(),
        })
    }
}

#[async_trait]
impl Input for NdjsonInput {
    async fn open(&mut self) -> Result<(), InputError> {
        // All paths open up front so a missing file surfaces as not-ready
        // before any record is produced.
        self.readers.clear();
        for path in &self.paths {
            let file = open_file(path).await?;
            self.readers.push_back(ActiveFile {
                path: path.clone(),
                reader: BufReader::new(file).lines(),
                line: 0,
            });
        }
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<Record>, InputError> {
        while let Some(active) = self.readers.front_mut() {
            match active.reader.next_line().await.context(IoSnafu {
                path: active.path.display().to_string(),
            })? {
                None => {
                    self.readers.pop_front();
                }
                Some(line) => {
                    active.line += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let value: Value = serde_json::from_str(&line).map_err(|e| {
                        DecodeSnafu {
                            path: active.path.display().to_string(),
                            line: active.line,
                            message: e.to_string(),
                        }
                        .build()
                    })?;
                    return Ok(Some(Record::new(value)));
                }
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        self.readers.clear();
    }
}
