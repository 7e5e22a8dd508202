//! Error types for practice-dedupe.
//!
//! All errors are strongly typed using thiserror, one enum per concern plus
//! the [`DedupeError`] umbrella. Most of these degrade rather than abort:
//! rule and cursor-read failures are logged and replaced by defaults at the
//! call site, so only the pipeline-level variants ever end a run.

use std::path::PathBuf;

use thiserror::Error;

/// Validation errors for caller-supplied settings.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' must be at least {min} (got {actual})")]
    BelowMinimum {
        field: &'static str,
        min: usize,
        actual: usize,
    },
}

/// Errors raised while loading the normalization rule file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Rule file not found: {}", path.display())]
    NotFound {
        path: PathBuf,
    },

    #[error("Rule file {} is not valid rule JSON: {message}", path.display())]
    Parse {
        path: PathBuf,
        message: String,
    },

    #[error("Failed to read rule file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a cursor store.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Cursor is unreadable: {message}")]
    Unreadable {
        message: String,
    },

    #[error("Cursor I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize cursor: {message}")]
    Serialize {
        message: String,
    },

    #[error("Cursor is locked by another run: {}", path.display())]
    Locked {
        path: PathBuf,
    },
}

/// Errors raised by a record source while paging.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Record request failed: {message}")]
    Request {
        message: String,
    },

    #[error("Failed to decode record at line {line}: {message}")]
    Decode {
        line: usize,
        message: String,
    },

    #[error("Record source I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Conditions that end a pipeline run in the `Failed` state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing data-store credentials: {missing}")]
    CredentialsMissing {
        missing: &'static str,
    },

    #[error("Fetching records failed: {0}")]
    Source(#[from] SourceError),

    #[error("Another run holds the cursor lock: {0}")]
    CursorLocked(CursorError),

    #[error("Failed to deliver normalized records: {0}")]
    Delivery(#[source] std::io::Error),

    #[error("Failed to persist cursor: {0}")]
    CursorWrite(CursorError),
}

/// Top-level error type for practice-dedupe.
#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl DedupeError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a rule-file error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this error can be replaced by a default and the run continued.
    #[must_use]
    pub const fn is_degradable(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Cursor(e) => matches!(e, CursorError::Unreadable { .. }),
            Self::Validation(_) | Self::Source(_) | Self::Pipeline(_) => false,
        }
    }

    /// Returns true if re-running may succeed without operator action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Source(_) => true,
            Self::Pipeline(e) => matches!(
                e,
                PipelineError::Source(_)
                    | PipelineError::CursorLocked(_)
                    | PipelineError::Delivery(_)
            ),
            Self::Validation(_) | Self::Config(_) | Self::Cursor(_) => false,
        }
    }
}

/// Result type alias for practice-dedupe operations.
pub type DedupeResult<T> = Result<T, DedupeError>;
