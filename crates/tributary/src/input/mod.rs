//! Input sources.
//!
//! An input is a bounded reader: it produces a finite stream of records and
//! reports exhaustion. Concrete readers cover plain-text lines, tabular
//! (CSV) files, and line-delimited JSON documents; the [`registry`] maps
//! config type names to builders, and [`sequence`] chains inputs together
//! with optional join semantics.

pub mod documents;
pub mod lines;
pub mod registry;
pub mod sequence;
pub mod tabular;

use std::path::Path;

use async_trait::async_trait;
use snafu::ResultExt;

use crate::error::{InputError, NotReadySnafu, OpenSnafu};
use tributary_core::record::Record;

pub use documents::NdjsonInput;
pub use lines::LinesInput;
pub use registry::InputRegistry;
pub use sequence::SequenceInput;
pub use tabular::CsvInput;

/// A bounded source of records.
///
/// `open` may be called again after exhaustion to restart the source from
/// the beginning; multi-pass joins rely on this.
#[async_trait]
pub trait Input: Send {
    /// Open (or reopen from the start) the backing resource.
    ///
    /// A resource that does not exist yet reports [`InputError::NotReady`];
    /// the caller retries. Any other failure is permanent.
    async fn open(&mut self) -> Result<(), InputError>;

    /// Produce the next record, or `None` once the source is exhausted.
    async fn next(&mut self) -> Result<Option<Record>, InputError>;

    /// Release the backing resource.
    async fn close(&mut self);
}

/// A boxed input for type-erased chains.
pub type BoxedInput = Box<dyn Input>;

impl std::fmt::Debug for dyn Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Input")
    }
}

/// Open a file, mapping a missing file to the recoverable not-ready case.
pub(crate) async fn open_file(path: &Path) -> Result<tokio::fs::File, InputError> {
    match tokio::fs::File::open(path).await {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => NotReadySnafu {
            message: format!("file '{}' does not exist yet", path.display()),
        }
        .fail(),
        Err(source) => Err(source).context(OpenSnafu {
            path: path.display().to_string(),
        }),
    }
}

/// Blocking variant of [`open_file`] for sync decoders.
pub(crate) fn open_file_sync(path: &Path) -> Result<std::fs::File, InputError> {
    match std::fs::File::open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => NotReadySnafu {
            message: format!("file '{}' does not exist yet", path.display()),
        }
        .fail(),
        Err(source) => Err(source).context(OpenSnafu {
            path: path.display().to_string(),
        }),
    }
}
