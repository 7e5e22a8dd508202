//! Run states and the per-run report.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::record::NormalizedRecord;

/// Pipeline run states, in the order a successful run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Start,
    RulesLoaded,
    CursorRead,
    Fetching,
    /// Skipped when the fetch returned nothing.
    Normalizing,
    CursorWritten,
    Done,
    /// Terminal; see [`RunReport::error`].
    Failed,
}

impl RunState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::RulesLoaded => "rules_loaded",
            Self::CursorRead => "cursor_read",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::CursorWritten => "cursor_written",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a run did.
#[derive(Debug)]
pub struct RunReport {
    /// Every state entered, starting with `Start`.
    pub states: Vec<RunState>,

    /// Why the run failed, when it did.
    pub error: Option<PipelineError>,

    /// Run timestamp; becomes the new cursor on success.
    pub started_at: DateTime<Utc>,

    pub previous_cursor: Option<DateTime<Utc>>,
    pub new_cursor: Option<DateTime<Utc>>,

    /// True if the rule file could not be used and empty rules were applied.
    pub rules_fallback: bool,
    pub substitutions: usize,

    pub fetched: usize,
    pub pages: usize,

    /// Derived records, in fetch order.
    pub records: Vec<NormalizedRecord>,
}

impl RunReport {
    pub(super) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            states: vec![RunState::Start],
            error: None,
            started_at,
            previous_cursor: None,
            new_cursor: None,
            rules_fallback: false,
            substitutions: 0,
            fetched: 0,
            pages: 0,
            records: Vec::new(),
        }
    }

    pub(super) fn enter(&mut self, state: RunState) {
        tracing::debug!(%state, "pipeline state");
        self.states.push(state);
    }

    /// The last state entered.
    #[must_use]
    pub fn final_state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Start)
    }

    /// Returns true if the run reached `Done`.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.final_state() == RunState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_starts() {
        let report = RunReport::new(Utc::now());
        assert_eq!(report.final_state(), RunState::Start);
        assert!(!report.is_done());
        assert!(!report.final_state().is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RunState::CursorWritten.to_string(), "cursor_written");
        assert_eq!(RunState::Failed.to_string(), "failed");
        assert!(RunState::Failed.is_terminal());
    }
}
