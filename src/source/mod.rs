//! Paging record sources.
//!
//! The data store is an external collaborator: anything that can answer
//! "records created at or after `since`, window `[offset, offset + limit)`"
//! implements [`RecordSource`]. [`PagedFetch`] turns that into a lazy, finite
//! iterator of records.
//!
//! End of data is signalled by a short page. A reported total and a page cap
//! bound the number of requests even when a source never returns one.

mod jsonl;
mod memory;

pub use jsonl::JsonLinesSource;
pub use memory::MemorySource;

use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::record::PracticeRecord;

/// One page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// Only records with `created_at >= since`; everything when `None`.
    pub since: Option<DateTime<Utc>>,
    /// Index of the first row of the window.
    pub offset: usize,
    /// Requested page size.
    pub limit: usize,
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<PracticeRecord>,

    /// Total rows matching the filter, if the source reports it.
    pub total: Option<usize>,
}

/// A paginated query interface over practice records.
pub trait RecordSource {
    /// Fetch one window of records matching `query.since`.
    ///
    /// # Errors
    /// Any transport or decoding failure. Returning fewer than `query.limit`
    /// records is not an error; it marks the end of data.
    fn fetch_page(&mut self, query: &PageQuery) -> Result<Page, SourceError>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn fetch_page(&mut self, query: &PageQuery) -> Result<Page, SourceError> {
        (**self).fetch_page(query)
    }
}

/// Lazy iteration over every record a source holds past `since`.
///
/// Restartable: a new `PagedFetch` with the same `since` replays the same
/// window from the start.
pub struct PagedFetch<'a, S: ?Sized> {
    source: &'a mut S,
    since: Option<DateTime<Utc>>,
    page_size: usize,
    max_pages: usize,
    offset: usize,
    pages: usize,
    total: Option<usize>,
    buffer: std::vec::IntoIter<PracticeRecord>,
    finished: bool,
}

impl<'a, S: RecordSource + ?Sized> PagedFetch<'a, S> {
    /// Starts a fetch. `page_size` and `max_pages` are clamped to at least 1.
    pub fn new(
        source: &'a mut S,
        since: Option<DateTime<Utc>>,
        page_size: usize,
        max_pages: usize,
    ) -> Self {
        Self {
            source,
            since,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            offset: 0,
            pages: 0,
            total: None,
            buffer: Vec::new().into_iter(),
            finished: false,
        }
    }

    /// Number of pages requested so far.
    #[must_use]
    pub const fn pages(&self) -> usize {
        self.pages
    }

    /// Row count reported by the source, once known.
    #[must_use]
    pub const fn reported_total(&self) -> Option<usize> {
        self.total
    }

    fn next_page(&mut self) -> Result<(), SourceError> {
        if self.total.is_some_and(|total| self.offset >= total) {
            self.finished = true;
            return Ok(());
        }
        if self.pages >= self.max_pages {
            tracing::warn!(
                pages = self.pages,
                offset = self.offset,
                "page cap reached, stopping fetch"
            );
            self.finished = true;
            return Ok(());
        }

        let query = PageQuery {
            since: self.since,
            offset: self.offset,
            limit: self.page_size,
        };
        let page = self.source.fetch_page(&query)?;
        self.pages += 1;

        let received = page.records.len();
        tracing::debug!(page = self.pages, offset = self.offset, received, "fetched page");

        if let Some(total) = page.total {
            self.total = Some(total);
        }
        if received < self.page_size {
            self.finished = true;
        }
        self.offset += received;
        self.buffer = page.records.into_iter();
        Ok(())
    }
}

impl<S: RecordSource + ?Sized> Iterator for PagedFetch<'_, S> {
    type Item = Result<PracticeRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }
            if self.finished {
                return None;
            }
            if let Err(e) = self.next_page() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves numbered records, `page_len` at a time, for ever.
    struct EndlessSource {
        page_len: usize,
        requests: Vec<PageQuery>,
    }

    impl RecordSource for EndlessSource {
        fn fetch_page(&mut self, query: &PageQuery) -> Result<Page, SourceError> {
            self.requests.push(*query);
            let records = (0..self.page_len)
                .map(|i| PracticeRecord::default().with_id((query.offset + i).to_string()))
                .collect();
            Ok(Page { records, total: None })
        }
    }

    struct FailingSource {
        calls: usize,
    }

    impl RecordSource for FailingSource {
        fn fetch_page(&mut self, query: &PageQuery) -> Result<Page, SourceError> {
            self.calls += 1;
            if query.offset == 0 {
                return Ok(Page {
                    records: vec![PracticeRecord::default(); query.limit],
                    total: None,
                });
            }
            Err(SourceError::Request {
                message: "connection reset".to_string(),
            })
        }
    }

    fn records(n: usize) -> Vec<PracticeRecord> {
        (0..n)
            .map(|i| PracticeRecord::default().with_id(i.to_string()))
            .collect()
    }

    #[test]
    fn test_short_page_ends_fetch() {
        let mut source = MemorySource::new(records(25));
        let mut fetch = PagedFetch::new(&mut source, None, 10, 100);
        let ids: Vec<_> = fetch
            .by_ref()
            .map(|r| r.unwrap().id.unwrap())
            .collect();
        assert_eq!(ids.len(), 25);
        assert_eq!(ids[0], "0");
        assert_eq!(ids[24], "24");
        assert_eq!(fetch.pages(), 3);
    }

    #[test]
    fn test_exact_multiple_needs_one_empty_page() {
        let mut source = MemorySource::new(records(20));
        let mut fetch = PagedFetch::new(&mut source, None, 10, 100);
        assert_eq!(fetch.by_ref().count(), 20);
        // Reported total stops before the empty page.
        assert_eq!(fetch.pages(), 2);
        assert_eq!(fetch.reported_total(), Some(20));
    }

    #[test]
    fn test_empty_source() {
        let mut source = MemorySource::new(Vec::new());
        let mut fetch = PagedFetch::new(&mut source, None, 10, 100);
        assert!(fetch.next().is_none());
        assert_eq!(fetch.pages(), 1);
    }

    #[test]
    fn test_page_cap_bounds_endless_source() {
        let mut source = EndlessSource {
            page_len: 5,
            requests: Vec::new(),
        };
        let count = PagedFetch::new(&mut source, None, 5, 4).count();
        assert_eq!(count, 20);
        assert_eq!(source.requests.len(), 4);
        assert_eq!(source.requests[3].offset, 15);
    }

    #[test]
    fn test_error_is_yielded_once() {
        let mut source = FailingSource { calls: 0 };
        let results: Vec<_> = PagedFetch::new(&mut source, None, 3, 100).collect();
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(Result::is_ok));
        assert!(matches!(results[3], Err(SourceError::Request { .. })));
        assert_eq!(source.calls, 2);
    }

    #[test]
    fn test_restartable() {
        let mut source = MemorySource::new(records(7));
        let first: Vec<_> = PagedFetch::new(&mut source, None, 3, 100)
            .map(Result::unwrap)
            .collect();
        let second: Vec<_> = PagedFetch::new(&mut source, None, 3, 100)
            .map(Result::unwrap)
            .collect();
        assert_eq!(first, second);
    }
}
