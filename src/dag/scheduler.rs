use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::record::{ExecutionRecord, SkipReason, UnitStatus};
use crate::dag::scheduler_step::WaveStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::engine::{UnitId, UnitValue};

/// Wave scheduler: the immutable unit graph plus one execution record per
/// unit.
///
/// This is the pure core of the orchestrator. It has no Tokio types, runs no
/// user code and performs no IO. It is responsible for:
/// - computing the next batch of units whose dependencies are satisfied
/// - skipping (transitively) every unit downstream of a failure
/// - applying per-unit state transitions and rejecting invalid ones
#[derive(Debug)]
pub struct WaveScheduler {
    graph: DagGraph,
    /// Arena of records in registration order.
    records: Vec<ExecutionRecord>,
    /// Unit id -> position in `records`.
    index: HashMap<UnitId, usize>,
    /// Waves launched in the current run.
    wave_counter: u64,
}

impl WaveScheduler {
    /// Build a scheduler over a graph. The graph is expected to have passed
    /// [`DagGraph::validate`].
    pub fn new(graph: DagGraph) -> Self {
        let records: Vec<ExecutionRecord> = graph.units().map(ExecutionRecord::new).collect();
        let index = records
            .iter()
            .enumerate()
            .map(|(pos, rec)| (rec.id.clone(), pos))
            .collect();

        Self {
            graph,
            records,
            index,
            wave_counter: 0,
        }
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Put every record back to `Idle` for a fresh run.
    pub fn reset(&mut self) {
        for rec in &mut self.records {
            rec.reset();
        }
        self.wave_counter = 0;
        debug!(units = self.records.len(), "scheduler: reset all records to idle");
    }

    /// Number of waves launched since the last reset.
    pub fn waves_launched(&self) -> u64 {
        self.wave_counter
    }

    pub fn record(&self, id: &str) -> Option<&ExecutionRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    /// All records, in registration order.
    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ExecutionRecord> {
        self.records
    }

    pub fn status_of(&self, id: &str) -> Option<UnitStatus> {
        self.record(id).map(|rec| rec.status)
    }

    /// Whether the dependencies of `id` are satisfied right now.
    ///
    /// Returns `None` if the unit is unknown.
    pub fn deps_satisfied(&self, id: &str) -> Option<bool> {
        self.index.get(id)?;
        let ro = ReadOnlyStateManager::new(&self.graph, &self.records, &self.index);
        Some(ro.deps_satisfied(id))
    }

    pub fn all_terminal(&self) -> bool {
        self.records.iter().all(|rec| rec.status.is_terminal())
    }

    /// Compute the next wave.
    ///
    /// First every idle unit downstream of a failure is skipped, then the
    /// remaining idle units with satisfied dependencies are returned as the
    /// ready set. The ready units are still `Idle`; the caller decides per
    /// unit whether to start it (`mark_running`) or skip it on its gate.
    pub fn next_wave(&mut self) -> WaveStep {
        self.next_wave_at(Utc::now())
    }

    pub fn next_wave_at(&mut self, now: DateTime<Utc>) -> WaveStep {
        let mut manager = StateManager::new(&self.graph, &mut self.records, &self.index);
        let newly_skipped = manager.skip_dependents_of_failures(now);
        let ready = manager.collect_ready_units();
        let finished = manager.all_units_terminal();

        let wave = if ready.is_empty() {
            0
        } else {
            self.wave_counter += 1;
            self.wave_counter
        };

        if finished {
            info!(waves = self.wave_counter, "scheduler: all units terminal");
        } else if ready.is_empty() {
            let stuck: Vec<&str> = self
                .records
                .iter()
                .filter(|rec| rec.status == UnitStatus::Idle)
                .map(|rec| rec.id.as_str())
                .collect();
            warn!(?stuck, "scheduler: idle units remain but none is ready");
        } else {
            debug!(wave, ?ready, ?newly_skipped, "scheduler: computed wave");
        }

        WaveStep {
            wave,
            newly_skipped,
            ready,
            finished,
        }
    }

    fn record_mut(&mut self, id: &str) -> Option<&mut ExecutionRecord> {
        match self.index.get(id) {
            Some(&pos) => Some(&mut self.records[pos]),
            None => {
                warn!(unit = %id, "transition for unknown unit; ignoring");
                None
            }
        }
    }

    /// `Idle -> Running`. Returns `false` if the transition was rejected.
    pub fn mark_running(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        self.record_mut(id).is_some_and(|rec| rec.mark_running(at))
    }

    /// `Running -> Success`.
    pub fn mark_success(
        &mut self,
        id: &str,
        value: UnitValue,
        completed_at: DateTime<Utc>,
        duration: Duration,
    ) -> bool {
        self.record_mut(id)
            .is_some_and(|rec| rec.mark_success(value, completed_at, duration))
    }

    /// `Running -> Failed`. Dependents are skipped on the next
    /// [`next_wave`](Self::next_wave).
    pub fn mark_failed(
        &mut self,
        id: &str,
        message: impl Into<String>,
        completed_at: DateTime<Utc>,
        duration: Duration,
    ) -> bool {
        let message = message.into();
        self.record_mut(id)
            .is_some_and(|rec| rec.mark_failed(message, completed_at, duration))
    }

    /// `Idle -> Skipped`.
    pub fn mark_skipped(&mut self, id: &str, reason: SkipReason, at: DateTime<Utc>) -> bool {
        self.record_mut(id)
            .is_some_and(|rec| rec.mark_skipped(reason, at))
    }
}
