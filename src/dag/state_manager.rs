// src/dag/state_manager.rs

//! Per-run state management for units in the wave scheduler.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::dag::DagGraph;
use crate::dag::record::{ExecutionRecord, SkipReason, UnitStatus};
use crate::engine::UnitId;

/// Manages state transitions that span several records (failure propagation,
/// readiness).
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    records: &'a mut [ExecutionRecord],
    index: &'a HashMap<UnitId, usize>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        records: &'a mut [ExecutionRecord],
        index: &'a HashMap<UnitId, usize>,
    ) -> Self {
        Self {
            graph,
            records,
            index,
        }
    }

    /// Skip every idle unit that has a failed dependency, transitively.
    ///
    /// A unit skipped here blocks its own dependents in turn, so the sweep
    /// repeats until nothing changes. Returns the newly skipped ids in the
    /// order they were skipped.
    pub fn skip_dependents_of_failures(&mut self, at: DateTime<Utc>) -> Vec<UnitId> {
        let mut newly_skipped = Vec::new();

        loop {
            let mut changed = false;

            for pos in 0..self.records.len() {
                if self.records[pos].status != UnitStatus::Idle {
                    continue;
                }

                let blocker = {
                    let ro = ReadOnlyStateManager::new(self.graph, &*self.records, self.index);
                    ro.failed_dependency_of(&self.records[pos].id)
                };

                if let Some(dependency) = blocker {
                    let rec = &mut self.records[pos];
                    debug!(
                        unit = %rec.id,
                        dependency = %dependency,
                        "dependency failed; skipping unit"
                    );
                    if rec.mark_skipped(SkipReason::DependencyFailed { dependency }, at) {
                        newly_skipped.push(rec.id.clone());
                        changed = true;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        newly_skipped
    }

    /// Idle units whose dependencies are all satisfied, in registration order.
    pub fn collect_ready_units(&self) -> Vec<UnitId> {
        let ro = ReadOnlyStateManager::new(self.graph, &*self.records, self.index);

        self.records
            .iter()
            .filter(|rec| rec.status == UnitStatus::Idle && ro.deps_satisfied(&rec.id))
            .map(|rec| rec.id.clone())
            .collect()
    }

    /// Check if every unit is in a terminal state.
    pub fn all_units_terminal(&self) -> bool {
        self.records.iter().all(|rec| rec.status.is_terminal())
    }
}

/// A read-only view for dependency checks.
pub struct ReadOnlyStateManager<'a> {
    graph: &'a DagGraph,
    records: &'a [ExecutionRecord],
    index: &'a HashMap<UnitId, usize>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        records: &'a [ExecutionRecord],
        index: &'a HashMap<UnitId, usize>,
    ) -> Self {
        Self {
            graph,
            records,
            index,
        }
    }

    fn record(&self, id: &str) -> Option<&ExecutionRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    /// Whether every dependency of `id` ended in `Success`, or was skipped
    /// because its own gate was false.
    pub fn deps_satisfied(&self, id: &str) -> bool {
        for dep_name in self.graph.dependencies_of(id) {
            let dep = match self.record(dep_name) {
                Some(d) => d,
                None => {
                    warn!(unit = %id, dep = %dep_name, "dependency missing from records");
                    return false;
                }
            };

            let satisfied = match dep.status {
                UnitStatus::Success => true,
                UnitStatus::Skipped => dep
                    .skip_reason
                    .as_ref()
                    .is_some_and(SkipReason::satisfies_dependents),
                UnitStatus::Idle | UnitStatus::Running | UnitStatus::Failed => false,
            };

            if !satisfied {
                return false;
            }
        }

        true
    }

    /// First dependency of `id` that failed, or was skipped because of an
    /// upstream failure.
    pub fn failed_dependency_of(&self, id: &str) -> Option<UnitId> {
        self.graph
            .dependencies_of(id)
            .iter()
            .find(|dep_name| {
                self.record(dep_name).is_some_and(|dep| match dep.status {
                    UnitStatus::Failed => true,
                    UnitStatus::Skipped => dep
                        .skip_reason
                        .as_ref()
                        .is_some_and(|r| !r.satisfies_dependents()),
                    _ => false,
                })
            })
            .cloned()
    }
}
