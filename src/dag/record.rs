// src/dag/record.rs

//! Per-unit execution records and their state machine.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::engine::{UnitId, UnitValue};

/// Lifecycle state of a unit within one run.
///
/// ```text
/// Idle -> Running -> Success
/// Idle -> Running -> Failed
/// Idle -> Skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Idle,
    Running,
    Success,
    Failed,
    Skipped,
}

impl UnitStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UnitStatus::Success | UnitStatus::Failed | UnitStatus::Skipped
        )
    }

    fn can_transition_to(self, next: UnitStatus) -> bool {
        matches!(
            (self, next),
            (UnitStatus::Idle, UnitStatus::Running)
                | (UnitStatus::Idle, UnitStatus::Skipped)
                | (UnitStatus::Running, UnitStatus::Success)
                | (UnitStatus::Running, UnitStatus::Failed)
        )
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitStatus::Idle => "idle",
            UnitStatus::Running => "running",
            UnitStatus::Success => "success",
            UnitStatus::Failed => "failed",
            UnitStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Why a unit ended up `Skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The unit's gate evaluated to false. Dependents still run.
    ConditionNotMet,
    /// `dependency` failed, or was itself skipped because of a failure.
    /// Dependents are skipped too.
    DependencyFailed { dependency: UnitId },
}

impl SkipReason {
    /// Whether dependents of a unit skipped for this reason may still run.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, SkipReason::ConditionNotMet)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ConditionNotMet => f.write_str("condition not met"),
            SkipReason::DependencyFailed { dependency } => {
                write!(f, "dependency failed ({dependency})")
            }
        }
    }
}

/// Audit record for a single unit.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub id: UnitId,
    pub status: UnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<UnitValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    pub duration: Option<Duration>,
}

fn serialize_duration_ms<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match duration {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

impl ExecutionRecord {
    pub fn new(id: impl Into<UnitId>) -> Self {
        Self {
            id: id.into(),
            status: UnitStatus::Idle,
            result: None,
            error: None,
            skip_reason: None,
            started_at: None,
            completed_at: None,
            duration: None,
        }
    }

    /// Human-readable explanation for a non-success terminal state.
    pub fn reason(&self) -> Option<String> {
        match self.status {
            UnitStatus::Failed => self.error.clone(),
            UnitStatus::Skipped => self.skip_reason.as_ref().map(|r| r.to_string()),
            _ => None,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = ExecutionRecord::new(std::mem::take(&mut self.id));
    }

    fn transition(&mut self, next: UnitStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(
                unit = %self.id,
                from = %self.status,
                to = %next,
                "rejecting invalid unit state transition"
            );
            return false;
        }
        self.status = next;
        true
    }

    pub(crate) fn mark_running(&mut self, at: DateTime<Utc>) -> bool {
        if !self.transition(UnitStatus::Running) {
            return false;
        }
        self.started_at = Some(at);
        true
    }

    pub(crate) fn mark_success(
        &mut self,
        value: UnitValue,
        completed_at: DateTime<Utc>,
        duration: Duration,
    ) -> bool {
        if !self.transition(UnitStatus::Success) {
            return false;
        }
        self.result = Some(value);
        self.completed_at = Some(completed_at);
        self.duration = Some(duration);
        true
    }

    pub(crate) fn mark_failed(
        &mut self,
        message: String,
        completed_at: DateTime<Utc>,
        duration: Duration,
    ) -> bool {
        if !self.transition(UnitStatus::Failed) {
            return false;
        }
        self.error = Some(message);
        self.completed_at = Some(completed_at);
        self.duration = Some(duration);
        true
    }

    pub(crate) fn mark_skipped(&mut self, reason: SkipReason, at: DateTime<Utc>) -> bool {
        if !self.transition(UnitStatus::Skipped) {
            return false;
        }
        self.skip_reason = Some(reason);
        self.completed_at = Some(at);
        self.duration = Some(Duration::ZERO);
        true
    }
}
