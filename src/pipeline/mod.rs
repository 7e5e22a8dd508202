//! Pipeline driver.
//!
//! One run walks a fixed sequence of states:
//!
//! ```text
//! Start → RulesLoaded → CursorRead → Fetching → Normalizing → CursorWritten → Done
//!   │                                   │                          │
//!   └───────────────────────────────────┴──────────────────────────┴──→ Failed
//! ```
//!
//! Rule and cursor-read problems degrade (empty rules, full backfill) instead
//! of failing. A run fails when credentials are missing, when another run
//! holds the cursor lock, when the source errors, when the derived records
//! cannot be delivered, or when the cursor cannot be written. In every failure
//! before `CursorWritten` the previous cursor is left untouched, so re-running
//! is safe.
//!
//! Records reach a [`RecordSink`] during `Normalizing`, before the cursor is
//! written; a cursor never moves past records that were not handed on.

mod config;
mod report;

pub use config::PipelineConfig;
pub use report::{RunReport, RunState};

use std::fmt;
use std::io;

use chrono::{DateTime, Utc};

use crate::cursor::{Cursor, CursorStore};
use crate::error::{CursorError, PipelineError, SourceError, ValidationError};
use crate::keys::derive_all;
use crate::record::NormalizedRecord;
use crate::rules::NormalizationRules;
use crate::source::{PagedFetch, RecordSource};

/// Source of the run timestamp.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Data-store location and key.
#[derive(Clone, Default)]
pub struct SourceCredentials {
    pub url: Option<String>,
    pub key: Option<String>,
}

impl SourceCredentials {
    /// Creates credentials from optional parts; validated when a run starts.
    #[must_use]
    pub fn new(url: Option<String>, key: Option<String>) -> Self {
        Self { url, key }
    }

    /// Checks that both parts are present and non-blank.
    ///
    /// # Errors
    /// `PipelineError::CredentialsMissing` naming the first missing part.
    pub fn validate(&self) -> Result<(), PipelineError> {
        fn present(part: Option<&String>) -> bool {
            part.is_some_and(|value| !value.trim().is_empty())
        }
        if !present(self.url.as_ref()) {
            return Err(PipelineError::CredentialsMissing {
                missing: "SUPABASE_URL",
            });
        }
        if !present(self.key.as_ref()) {
            return Err(PipelineError::CredentialsMissing {
                missing: "SUPABASE_KEY",
            });
        }
        Ok(())
    }

    /// The data-store URL, or `""` if absent.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("url", &self.url)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Opens a record source for validated credentials.
pub trait SourceConnector {
    /// The source type produced.
    type Source: RecordSource;

    /// Connect to the data store.
    ///
    /// # Errors
    /// Any failure to reach or authenticate against the store.
    fn connect(&self, credentials: &SourceCredentials) -> Result<Self::Source, SourceError>;
}

impl<F, S> SourceConnector for F
where
    F: Fn(&SourceCredentials) -> Result<S, SourceError>,
    S: RecordSource,
{
    type Source = S;

    fn connect(&self, credentials: &SourceCredentials) -> Result<S, SourceError> {
        self(credentials)
    }
}

/// Downstream consumer of derived records.
pub trait RecordSink {
    /// Hand on one run's records, in fetch order.
    ///
    /// # Errors
    /// Any failure to persist or forward the records. The run then fails
    /// before the cursor is written.
    fn deliver(&mut self, records: &[NormalizedRecord]) -> io::Result<()>;
}

impl<F> RecordSink for F
where
    F: FnMut(&[NormalizedRecord]) -> io::Result<()>,
{
    fn deliver(&mut self, records: &[NormalizedRecord]) -> io::Result<()> {
        self(records)
    }
}

/// Runs ingestion and key derivation against one cursor.
///
/// # Example
///
/// ```
/// use practice_dedupe::{
///     Cursor, MemoryCursorStore, MemorySource, Pipeline, PipelineConfig, PracticeRecord,
///     RunState, SourceCredentials, SourceError,
/// };
///
/// let pipeline = Pipeline::new(PipelineConfig::default(), Cursor::new(MemoryCursorStore::new()))?;
/// let credentials = SourceCredentials::new(Some("https://db.example".into()), Some("key".into()));
/// let connector = |_: &SourceCredentials| -> Result<MemorySource, SourceError> {
///     Ok(MemorySource::new(vec![PracticeRecord::new("Acme", "1 Main St", "Austin", "78701")]))
/// };
///
/// let report = pipeline.run(&credentials, &connector);
/// assert_eq!(report.final_state(), RunState::Done);
/// assert_eq!(report.records[0].loose_key, "acme|austin");
/// # Ok::<(), practice_dedupe::ValidationError>(())
/// ```
#[derive(Debug)]
pub struct Pipeline<S, C = SystemClock> {
    config: PipelineConfig,
    cursor: Cursor<S>,
    clock: C,
}

impl<S: CursorStore> Pipeline<S, SystemClock> {
    /// Creates a pipeline on the system clock.
    ///
    /// # Errors
    /// Returns the first invalid setting in `config`.
    pub fn new(config: PipelineConfig, cursor: Cursor<S>) -> Result<Self, ValidationError> {
        Ok(Self {
            config: config.validate()?,
            cursor,
            clock: SystemClock,
        })
    }
}

impl<S: CursorStore, C: Clock> Pipeline<S, C> {
    /// Replaces the clock that stamps runs.
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Pipeline<S, C2> {
        Pipeline {
            config: self.config,
            cursor: self.cursor,
            clock,
        }
    }

    /// Returns the cursor this pipeline advances.
    pub const fn cursor(&self) -> &Cursor<S> {
        &self.cursor
    }

    /// Returns the pipeline configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Executes one run, keeping the derived records in the report only.
    pub fn run<K: SourceConnector>(
        &self,
        credentials: &SourceCredentials,
        connector: &K,
    ) -> RunReport {
        let mut keep = |_: &[NormalizedRecord]| -> io::Result<()> { Ok(()) };
        self.run_into(credentials, connector, &mut keep)
    }

    /// Executes one run, delivering derived records to `sink` before the
    /// cursor is written, and reports how far it got.
    ///
    /// The sink is not called when nothing new was fetched. Never panics and
    /// never returns early without a report; failures are recorded in
    /// [`RunReport::error`] with the final state `Failed`.
    pub fn run_into<K, W>(
        &self,
        credentials: &SourceCredentials,
        connector: &K,
        sink: &mut W,
    ) -> RunReport
    where
        K: SourceConnector,
        W: RecordSink + ?Sized,
    {
        let started_at = self.clock.now();
        let mut report = RunReport::new(started_at);
        tracing::info!(%started_at, "pipeline starting");

        if let Err(e) = credentials.validate() {
            return report.fail(e);
        }

        let _guard = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(e) => return report.fail(PipelineError::CursorLocked(e)),
        };

        let rules = match NormalizationRules::load(&self.config.rules_path) {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(error = %e, "using empty normalization rules");
                report.rules_fallback = true;
                NormalizationRules::default()
            }
        };
        report.substitutions = rules.len();
        report.enter(RunState::RulesLoaded);

        let previous = self.cursor.read();
        report.previous_cursor = previous;
        report.enter(RunState::CursorRead);
        match previous {
            Some(since) => tracing::info!(%since, "incremental fetch"),
            None => tracing::info!("no cursor, full backfill"),
        }

        report.enter(RunState::Fetching);
        let mut source = match connector.connect(credentials) {
            Ok(source) => source,
            Err(e) => return report.fail(e.into()),
        };
        tracing::info!(url = credentials.url(), "connected to record source");

        let mut fetch = PagedFetch::new(
            &mut source,
            previous,
            self.config.page_size,
            self.config.max_pages,
        );
        let fetched = match fetch.by_ref().collect::<Result<Vec<_>, _>>() {
            Ok(fetched) => fetched,
            Err(e) => {
                report.pages = fetch.pages();
                return report.fail(e.into());
            }
        };
        report.pages = fetch.pages();
        report.fetched = fetched.len();
        tracing::info!(fetched = report.fetched, pages = report.pages, "fetch complete");

        if fetched.is_empty() {
            tracing::info!("no new records");
        } else {
            report.enter(RunState::Normalizing);
            report.records = derive_all(&fetched, &rules, self.config.workers);
            if let Err(e) = sink.deliver(&report.records) {
                return report.fail(PipelineError::Delivery(e));
            }
            tracing::debug!(records = report.records.len(), "records delivered");
        }

        // Never move the cursor backwards, even if the clock did.
        let next = previous.map_or(started_at, |prev| prev.max(started_at));
        if let Err(e) = self.cursor.write(next) {
            return report.fail(PipelineError::CursorWrite(e));
        }
        report.new_cursor = Some(next);
        report.enter(RunState::CursorWritten);
        report.enter(RunState::Done);

        tracing::info!(
            records = report.records.len(),
            last_run_time = %next,
            "pipeline done"
        );
        report
    }
}

impl RunReport {
    fn fail(mut self, error: PipelineError) -> Self {
        match &error {
            PipelineError::Delivery(_) => tracing::error!(
                error = %error,
                "records were not delivered; the cursor stays where it was"
            ),
            PipelineError::CursorWrite(_) => tracing::error!(
                error = %error,
                "cursor was not advanced; the next run will reprocess this window"
            ),
            PipelineError::CursorLocked(CursorError::Locked { .. }) => {
                tracing::error!(error = %error, "another run is in progress");
            }
            _ => tracing::error!(error = %error, "pipeline failed"),
        }
        self.error = Some(error);
        self.enter(RunState::Failed);
        self
    }
}
