//! Tabular (CSV) input.
//!
//! Reads one or more CSV files in order. The first row of each file is the
//! header; every cell decodes as a string scalar keyed by its column name.
//! Rows whose field count differs from the header are a decode error.

use std::collections::VecDeque;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Input, open_file_sync};
use crate::error::{DecodeSnafu, InputError, NoPathsSnafu};
use tributary_core::record::Record;

/// Configuration for the CSV input.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvConfig {
    /// Files to read, drained in order.
    pub paths: Vec<PathBuf>,
}

struct ActiveFile {
    path: PathBuf,
    headers: Vec<String>,
    rows: csv::StringRecordsIntoIter<std::fs::File>,
}

/// Reads CSV files row by row.
pub struct CsvInput {
    paths: Vec<PathBuf>,
    pending: VecDeque<(PathBuf, std::fs::File)>,
    active: Option<ActiveFile>,
}

impl CsvInput {
    /// Create a CSV input from its configuration.
    pub fn new(config: CsvConfig) -> Result<Self, InputError> {
        snafu::ensure!(!config.paths.is_empty(), NoPathsSnafu { kind: "csv" });
        Ok(Self {
            paths: config.paths,
            pending: VecDeque::new(),
            active: None,
        })
    }

    fn activate(&mut self, path: PathBuf, file: std::fs::File) -> Result<(), InputError> {
        let mut reader = csv::Reader::from_reader(file);
        let headers = reader
            .headers()
            .map_err(|e| decode_error(&path, &e))?
            .iter()
            .map(str::to_string)
            .collect();
        self.active = Some(ActiveFile {
            path,
            headers,
            rows: reader.into_records(),
        });
        Ok(())
    }
}

fn decode_error(path: &std::path::Path, error: &csv::Error) -> InputError {
    DecodeSnafu {
        path: path.display().to_string(),
        line: error.position().map(|p| p.line()).unwrap_or(0),
        message: error.to_string(),
    }
    .build()
}

#[async_trait]
impl Input for CsvInput {
    async fn open(&mut self) -> Result<(), InputError> {
        // All paths open up front so a missing file surfaces as not-ready
        // before any record is produced.
        self.pending.clear();
        self.active = None;
        for path in &self.paths {
            let file = open_file_sync(path)?;
            self.pending.push_back((path.clone(), file));
        }
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<Record>, InputError> {
        loop {
            if self.active.is_none() {
                match self.pending.pop_front() {
                    Some((path, file)) => self.activate(path, file)?,
                    None => return Ok(None),
                }
            }
            let Some(active) = self.active.as_mut() else {
                return Ok(None);
            };
            match active.rows.next() {
                None => {
                    self.active = None;
                }
                Some(Err(e)) => return Err(decode_error(&active.path, &e)),
                Some(Ok(row)) => {
                    let mut fields = Map::new();
                    for (name, cell) in active.headers.iter().zip(row.iter()) {
                        fields.insert(name.clone(), Value::String(cell.to_string()));
                    }
                    return Ok(Some(Record::object(fields)));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.pending.clear();
        self.active = None;
    }
}
