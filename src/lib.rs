//! # practice-dedupe - Matching keys for practice records
//!
//! Incrementally ingests practice records from a paging record source and derives
//! deterministic keys that group records likely describing the same real-world
//! practice.
//!
//! ## Core Concepts
//!
//! - **NormalizationRules**: Declarative token substitution table (abbreviations, synonyms)
//! - **Normalizer**: Pure canonicalization of free text
//! - **Keys**: `exact_key` (name, address, zip) and `loose_key` (name, city)
//! - **Cursor**: Persisted high-water mark bounding each incremental fetch
//! - **Pipeline**: The run state machine tying the pieces together
//!
//! ## Usage
//!
//! ```rust
//! use practice_dedupe::{derive_keys, NormalizationRules, PracticeRecord};
//!
//! let rules = NormalizationRules::from_pairs([("st", "street")]);
//! let record = PracticeRecord::new("John Doe", "123 Main St.", "Chicago", "60606");
//!
//! let normalized = derive_keys(&record, &rules);
//! assert_eq!(normalized.exact_key, "john doe|123 main street|60606");
//! assert_eq!(normalized.loose_key, "john doe|chicago");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Matching-key engine
pub mod error;
pub mod keys;
pub mod normalize;
pub mod record;
pub mod rules;

// Incremental ingestion
pub mod config;
pub mod cursor;
pub mod pipeline;
pub mod source;

mod timestamp;

// Re-export primary types at crate root for convenience
pub use cursor::{Cursor, CursorStore, FileCursorStore, MemoryCursorStore};
pub use error::{
    ConfigError, CursorError, DedupeError, DedupeResult, PipelineError, SourceError,
    ValidationError,
};
pub use keys::{derive_all, derive_keys, KEY_SEPARATOR};
pub use normalize::{canonicalize, normalize};
pub use pipeline::{
    Clock, FixedClock, Pipeline, PipelineConfig, RecordSink, RunReport, RunState,
    SourceConnector, SourceCredentials, SystemClock,
};
pub use record::{NormalizedRecord, PracticeRecord};
pub use rules::NormalizationRules;
pub use source::{JsonLinesSource, MemorySource, Page, PageQuery, PagedFetch, RecordSource};
