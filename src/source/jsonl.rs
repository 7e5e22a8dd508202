//! Newline-delimited JSON dump as a record source.
//!
//! Lets the pipeline run against an export of the `practice_records` table
//! without a live data-store client. One record per line; blank lines are
//! skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use super::{MemorySource, Page, PageQuery, RecordSource};
use crate::error::SourceError;
use crate::record::PracticeRecord;

/// Record source over a JSON-lines file, read fully on open.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    inner: MemorySource,
}

impl JsonLinesSource {
    /// Reads and decodes the dump at `path`.
    ///
    /// # Errors
    /// - `SourceError::Io` if the file cannot be read
    /// - `SourceError::Decode` for the first line that is not a record
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    /// Decodes a dump from any reader.
    ///
    /// # Errors
    /// Same as [`JsonLinesSource::open`].
    pub fn from_reader(reader: impl Read) -> Result<Self, SourceError> {
        let mut records = Vec::new();
        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: PracticeRecord =
                serde_json::from_str(&line).map_err(|e| SourceError::Decode {
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            records.push(record);
        }
        tracing::debug!(records = records.len(), "loaded record dump");
        Ok(Self {
            inner: MemorySource::new(records),
        })
    }

    /// Number of records in the dump.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the dump holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl RecordSource for JsonLinesSource {
    fn fetch_page(&mut self, query: &PageQuery) -> Result<Page, SourceError> {
        self.inner.fetch_page(query)
    }
}
