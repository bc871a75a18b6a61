//! Plain-text line input.
//!
//! Reads one or more text files in order and yields one string-scalar record
//! per non-empty line.

use std::collections::VecDeque;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use snafu::ResultExt;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use super::{Input, open_file};
use crate::error::{InputError, IoSnafu, NoPathsSnafu};
use tributary_core::record::Record;

/// Configuration for the line input.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinesConfig {
    /// Files to read, drained in order.
    pub paths: Vec<PathBuf>,
}

/// Reads text files line by line.
#[derive(Debug)]
pub struct LinesInput {
    paths: Vec<PathBuf>,
    readers: VecDeque<(PathBuf, Lines<BufReader<File>>)>,
}

impl LinesInput {
    /// Create a line input from its configuration.
    pub fn new(config: LinesConfig) -> Result<Self, InputError> {
        snafu::ensure!(!config.paths.is_empty(), NoPathsSnafu { kind: "lines" });
        Ok(Self {
            paths: config.paths,
            readers: VecDeque::new(),
        })
    }
}

#[async_trait]
impl Input for LinesInput {
    async fn open(&mut self) -> Result<(), InputError> {
        // All paths open up front so a missing file surfaces as not-ready
        // before any record is produced.
        self.readers.clear();
        for path in &self.paths {
            let file = open_file(path).await?;
            self.readers
                .push_back((path.clone(), BufReader::new(file).lines()));
        }
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<Record>, InputError> {
        while let Some((path, reader)) = self.readers.front_mut() {
            match reader.next_line().await.context(IoSnafu {
                path: path.display().to_string(),
            })? {
                Some(line) if line.is_empty() => continue,
                Some(line) => return Ok(Some(Record::text(line))),
                None => {
                    self.readers.pop_front();
                }
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        self.readers.clear();
    }
}
