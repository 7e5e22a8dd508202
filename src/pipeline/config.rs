//! Pipeline settings.

use std::path::PathBuf;

use crate::error::ValidationError;

/// Configuration for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Rule file; a missing or malformed file degrades to empty rules.
    pub rules_path: PathBuf,
    /// Records requested per page.
    pub page_size: usize,
    /// Upper bound on page requests per run.
    pub max_pages: usize,
    /// Threads used for key derivation.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("normalization_rules.json"),
            page_size: 1000,
            max_pages: 10_000,
            workers: 1,
        }
    }
}

impl PipelineConfig {
    /// Checks bounds, returning the config unchanged when valid.
    ///
    /// # Errors
    /// `ValidationError::BelowMinimum` if any of `page_size`, `max_pages` or
    /// `workers` is zero.
    pub fn validate(self) -> Result<Self, ValidationError> {
        for (field, actual) in [
            ("page_size", self.page_size),
            ("max_pages", self.max_pages),
            ("workers", self.workers),
        ] {
            if actual < 1 {
                return Err(ValidationError::BelowMinimum {
                    field,
                    min: 1,
                    actual,
                });
            }
        }
        Ok(self)
    }
}
