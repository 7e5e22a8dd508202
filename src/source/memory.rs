//! Vector-backed record source.

use super::{Page, PageQuery, RecordSource};
use crate::error::SourceError;
use crate::record::PracticeRecord;

/// Serves records held in memory, in insertion order.
///
/// Records without `created_at` always match the `since` filter: they cannot
/// be placed relative to the cursor, and skipping them would lose them.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<PracticeRecord>,
    requests: usize,
}

impl MemorySource {
    /// Creates a source over `records`.
    #[must_use]
    pub fn new(records: Vec<PracticeRecord>) -> Self {
        Self {
            records,
            requests: 0,
        }
    }

    /// Appends a record, as if it had just been created in the store.
    pub fn push(&mut self, record: PracticeRecord) {
        self.records.push(record);
    }

    /// Number of `fetch_page` calls served.
    #[must_use]
    pub const fn requests(&self) -> usize {
        self.requests
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the source holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for MemorySource {
    fn fetch_page(&mut self, query: &PageQuery) -> Result<Page, SourceError> {
        self.requests += 1;
        let matching: Vec<&PracticeRecord> = self
            .records
            .iter()
            .filter(|record| match (query.since, record.created_at) {
                (Some(since), Some(created_at)) => created_at >= since,
                _ => true,
            })
            .collect();

        let total = matching.len();
        let records = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();

        Ok(Page {
            records,
            total: Some(total),
        })
    }
}
