//! Migration run state machine
//!
//! `NotStarted -> Running -> {Completed, Failed}`. The `NotStarted -> Running`
//! edge is a compare-and-set, so only one caller ever starts a run.

use crate::error::MigratorError;
use crate::result::MigrationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use ulid::Ulid;

/// Status of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunStatus {
    /// Migrator constructed, run not invoked
    NotStarted = 0,
    /// Run in progress
    Running = 1,
    /// Every index migrated, created or skipped
    Completed = 2,
    /// At least one index failed, or the run aborted
    Failed = 3,
}

impl RunStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Completed,
            _ => Self::Failed,
        }
    }

    /// Check if the run has ended
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Statuses reachable from `from`
#[must_use]
pub fn allowed_transitions(from: RunStatus) -> Vec<RunStatus> {
    use RunStatus::{Completed, Failed, NotStarted, Running};
    match from {
        NotStarted => vec![Running],
        Running => vec![Completed, Failed],
        Completed | Failed => vec![],
    }
}

/// Validate a status transition
///
/// # Errors
/// - `IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: RunStatus, to: RunStatus) -> Result<(), MigratorError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(MigratorError::IllegalTransition { from, to })
    }
}

/// Atomic run status
#[derive(Debug)]
pub struct RunState {
    status: AtomicU8,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// State at `NotStarted`
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(RunStatus::NotStarted as u8),
        }
    }

    /// Current status
    #[inline]
    #[must_use]
    pub fn status(&self) -> RunStatus {
        RunStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Move `from -> to` if the state is still `from`
    ///
    /// # Errors
    /// - `IllegalTransition` if the edge is not allowed or the state moved
    pub fn transition(&self, from: RunStatus, to: RunStatus) -> Result<(), MigratorError> {
        validate_transition(from, to)?;
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| MigratorError::IllegalTransition {
                from: RunStatus::from_u8(actual),
                to,
            })
    }

    /// Claim the run
    ///
    /// # Errors
    /// - `AlreadyRun` if the run was claimed before
    pub fn begin(&self) -> Result<(), MigratorError> {
        self.transition(RunStatus::NotStarted, RunStatus::Running)
            .map_err(|_| MigratorError::AlreadyRun)
    }
}

/// Snapshot of a migration run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationRun {
    /// Run id
    pub id: Ulid,
    /// Status
    pub status: RunStatus,
    /// Set when the run was claimed
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the run ended
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-index results, sorted by alias
    pub results: Vec<MigrationResult>,
}

impl MigrationRun {
    /// Fresh run
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Ulid::new(),
            status: RunStatus::NotStarted,
            started_at: None,
            completed_at: None,
            results: Vec::new(),
        }
    }
}

impl Default for MigrationRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn transition_table() {
        assert_eq!(allowed_transitions(RunStatus::NotStarted), vec![RunStatus::Running]);
        assert!(validate_transition(RunStatus::Running, RunStatus::Failed).is_ok());
        assert!(validate_transition(RunStatus::Completed, RunStatus::Running).is_err());
        assert!(validate_transition(RunStatus::NotStarted, RunStatus::Completed).is_err());
    }

    #[test]
    fn begin_only_once() {
        let state = RunState::new();
        assert!(state.begin().is_ok());
        assert_eq!(state.begin(), Err(MigratorError::AlreadyRun));
        state.transition(RunStatus::Running, RunStatus::Failed).unwrap();
        assert_eq!(state.begin(), Err(MigratorError::AlreadyRun));
        assert!(state.status().is_terminal());
    }

    #[test]
    fn stale_transition_reports_actual_state() {
        let state = RunState::new();
        let err = state.transition(RunStatus::Running, RunStatus::Completed).unwrap_err();
        assert_eq!(
            err,
            MigratorError::IllegalTransition {
                from: RunStatus::NotStarted,
                to: RunStatus::Completed
            }
        );
    }

    #[test]
    fn concurrent_begin_has_one_winner() {
        let state = Arc::new(RunState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.begin().is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(state.status(), RunStatus::Running);
    }
}
