// src/engine/outcome.rs

//! What a run hands back to the host application.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::dag::{ExecutionRecord, UnitStatus};
use crate::engine::Results;

/// Final result store, every execution record (registration order) and the
/// wall-clock duration of one `Orchestrator::run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub results: Results,
    pub executions: Vec<ExecutionRecord>,
    #[serde(rename = "total_duration_ms", serialize_with = "serialize_millis")]
    pub total_duration: Duration,
}

fn serialize_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(d.as_millis() as u64)
}

impl RunOutcome {
    pub fn record(&self, id: &str) -> Option<&ExecutionRecord> {
        self.executions.iter().find(|rec| rec.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<UnitStatus> {
        self.record(id).map(|rec| rec.status)
    }

    fn ids_with(&self, status: UnitStatus) -> Vec<&str> {
        self.executions
            .iter()
            .filter(|rec| rec.status == status)
            .map(|rec| rec.id.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_with(UnitStatus::Success)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.ids_with(UnitStatus::Failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_with(UnitStatus::Skipped)
    }

    pub fn all_succeeded(&self) -> bool {
        self.executions
            .iter()
            .all(|rec| rec.status == UnitStatus::Success)
    }

    pub fn has_failures(&self) -> bool {
        self.executions
            .iter()
            .any(|rec| rec.status == UnitStatus::Failed)
    }

    /// One-line summary, e.g. `3 of 5 units succeeded (1 failed, 1 skipped)`.
    pub fn summary(&self) -> String {
        let total = self.executions.len();
        let ok = self.succeeded().len();
        let failed = self.failed().len();
        let skipped = self.skipped().len();

        let mut line = format!("{ok} of {total} units succeeded");
        if failed > 0 || skipped > 0 {
            line.push_str(&format!(" ({failed} failed, {skipped} skipped)"));
        }
        line
    }
}
