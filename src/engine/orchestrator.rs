// src/engine/orchestrator.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::PlanFile;
use crate::dag::{DagGraph, ExecutionRecord, SkipReason, UnitStatus, WaveScheduler, WaveStep};
use crate::engine::unit::{GateDecision, panic_message};
use crate::engine::{Results, RunOutcome, UnitId, UnitSpec, UnitValue};
use crate::errors::Result;

/// Callback invoked once per unit when it reaches a terminal state.
pub type ProgressObserver = Arc<dyn Fn(&ExecutionRecord) + Send + Sync>;

/// Runs a graph of units in dependency-ordered parallel waves.
///
/// The orchestrator owns every piece of mutable state: the execution records
/// (through a [`WaveScheduler`]), the result store and the progress observer.
/// Producers only ever see a read-only [`Results`] snapshot.
///
/// `run` spawns producers onto a Tokio `JoinSet`, so it must be awaited
/// inside a Tokio runtime.
pub struct Orchestrator {
    graph: DagGraph,
    units: Vec<UnitSpec>,
    index: HashMap<String, usize>,
    records: Vec<ExecutionRecord>,
    results: Results,
    observer: Option<ProgressObserver>,
    /// Kept between runs and reset; dropped whenever a unit is added.
    scheduler: Option<WaveScheduler>,
}

/// What a producer task hands back to the wave loop.
struct UnitCompletion {
    id: UnitId,
    outcome: std::result::Result<UnitValue, String>,
    completed_at: DateTime<Utc>,
    duration: Duration,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("units", &self.units)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            graph: DagGraph::new(),
            units: Vec::new(),
            index: HashMap::new(),
            records: Vec::new(),
            results: Results::new(),
            observer: None,
            scheduler: None,
        }
    }

    /// Build an orchestrator holding one command unit per plan entry.
    pub fn from_plan(plan: &PlanFile) -> Result<Self> {
        let mut orchestrator = Self::new();
        for unit in crate::exec::units_from_plan(plan) {
            orchestrator.add_unit(unit)?;
        }
        Ok(orchestrator)
    }

    /// Construction-time variant of [`on_progress`](Self::on_progress).
    pub fn with_progress<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ExecutionRecord) + Send + Sync + 'static,
    {
        self.on_progress(observer);
        self
    }

    /// Register a unit.
    ///
    /// Fails with `DuplicateUnit` if the id is taken. Dependencies are not
    /// checked here, so units can be added in any order; `run` validates them.
    pub fn add_unit(&mut self, unit: UnitSpec) -> Result<()> {
        self.graph
            .insert(unit.id().to_string(), unit.dependencies().iter().cloned())?;

        debug!(
            unit = %unit.id(),
            deps = ?unit.dependencies(),
            gated = unit.has_condition(),
            "registered unit"
        );

        self.scheduler = None;
        self.index.insert(unit.id().to_string(), self.units.len());
        self.records.push(ExecutionRecord::new(unit.id()));
        self.units.push(unit);
        Ok(())
    }

    /// Set the progress observer, replacing any previous one.
    pub fn on_progress<F>(&mut self, observer: F)
    where
        F: Fn(&ExecutionRecord) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Execution records of the latest run (all `Idle` before the first run).
    pub fn executions(&self) -> &[ExecutionRecord] {
        &self.records
    }

    /// Value produced by `id` in the latest run; `None` unless it succeeded.
    pub fn get_result(&self, id: &str) -> Option<&UnitValue> {
        self.results.get(id)
    }

    /// Typed variant of [`get_result`](Self::get_result).
    pub fn get_result_as<T: DeserializeOwned>(&self, id: &str) -> Option<T> {
        self.results.get_as(id)
    }

    /// Execute the whole graph.
    ///
    /// Fails only for graph-level problems (unknown dependency, cycle), and
    /// then before any producer has been invoked. Individual unit failures
    /// are reported through the returned records and the progress observer.
    ///
    /// Records and results of the previous run are cleared first, even when
    /// validation then rejects the graph. Dropping the returned future aborts
    /// every producer still in flight.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        let started = Instant::now();

        self.results = Results::new();
        self.records.iter_mut().for_each(ExecutionRecord::reset);

        if let Err(e) = self.graph.validate() {
            error!(error = %e, "unit graph rejected; nothing was executed");
            return Err(e);
        }

        info!(units = self.units.len(), "orchestrator: starting run");

        let mut scheduler = match self.scheduler.take() {
            Some(mut scheduler) => {
                scheduler.reset();
                scheduler
            }
            None => WaveScheduler::new(self.graph.clone()),
        };
        let mut results = Results::new();

        loop {
            let step = scheduler.next_wave();

            for id in &step.newly_skipped {
                self.notify(&scheduler, id);
            }

            if step.finished {
                break;
            }

            if step.is_stalled() {
                // Unreachable for a validated graph.
                warn!("orchestrator: no unit is ready; stopping run early");
                break;
            }

            self.run_wave(&mut scheduler, &mut results, step).await;
        }

        let outcome = RunOutcome {
            results: results.clone(),
            executions: scheduler.records().to_vec(),
            total_duration: started.elapsed(),
        };

        info!(
            total_ms = outcome.total_duration.as_millis() as u64,
            waves = scheduler.waves_launched(),
            summary = %outcome.summary(),
            "orchestrator: run finished"
        );

        self.records = outcome.executions.clone();
        self.results = results;
        self.scheduler = Some(scheduler);

        Ok(outcome)
    }

    /// Launch every ready unit of one wave and wait for all of them.
    ///
    /// Producers run in a `JoinSet` owned by this future, so they are aborted
    /// if the run is dropped.
    async fn run_wave(&self, scheduler: &mut WaveScheduler, results: &mut Results, step: WaveStep) {
        let snapshot = results.clone();
        let mut in_flight: JoinSet<UnitCompletion> = JoinSet::new();
        let mut launched: Vec<(UnitId, Instant)> = Vec::new();

        for id in step.ready {
            let Some(unit) = self.index.get(&id).map(|&pos| &self.units[pos]) else {
                warn!(unit = %id, "ready unit has no definition; ignoring");
                continue;
            };

            match unit.evaluate_gate(&snapshot) {
                GateDecision::Run => {}
                GateDecision::Skip => {
                    debug!(unit = %id, wave = step.wave, "condition not met; skipping unit");
                    scheduler.mark_skipped(&id, SkipReason::ConditionNotMet, Utc::now());
                    self.notify(scheduler, &id);
                    continue;
                }
                GateDecision::Panicked(msg) => {
                    let now = Utc::now();
                    warn!(unit = %id, error = %msg, "condition panicked; failing unit");
                    scheduler.mark_running(&id, now);
                    scheduler.mark_failed(&id, format!("condition panicked: {msg}"), now, Duration::ZERO);
                    self.notify(scheduler, &id);
                    continue;
                }
            }

            scheduler.mark_running(&id, Utc::now());
            info!(unit = %id, wave = step.wave, "starting unit");

            let work = unit.produce(snapshot.clone());
            let task_id = id.clone();
            in_flight.spawn(async move {
                let clock = Instant::now();
                let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(format!("{err:#}")),
                    Err(payload) => Err(format!("unit panicked: {}", panic_message(payload.as_ref()))),
                };
                UnitCompletion {
                    id: task_id,
                    outcome,
                    completed_at: Utc::now(),
                    duration: clock.elapsed(),
                }
            });
            launched.push((id, Instant::now()));
        }

        let mut produced: Vec<(UnitId, UnitValue)> = Vec::new();

        while let Some(joined) = in_flight.join_next().await {
            let done = match joined {
                Ok(done) => done,
                Err(join_err) => {
                    // Units left running are failed below.
                    warn!(error = %join_err, "unit task ended without a result");
                    continue;
                }
            };

            match done.outcome {
                Ok(value) => {
                    info!(unit = %done.id, duration_ms = done.duration.as_millis() as u64, "unit succeeded");
                    scheduler.mark_success(&done.id, value.clone(), done.completed_at, done.duration);
                    produced.push((done.id.clone(), value));
                }
                Err(message) => {
                    warn!(unit = %done.id, error = %message, "unit failed");
                    scheduler.mark_failed(&done.id, message, done.completed_at, done.duration);
                }
            }

            self.notify(scheduler, &done.id);
        }

        for (id, clock) in launched {
            if scheduler.status_of(&id) == Some(UnitStatus::Running) {
                scheduler.mark_failed(&id, "unit task aborted", Utc::now(), clock.elapsed());
                self.notify(scheduler, &id);
            }
        }

        // Merge only once the whole wave is done.
        drop(snapshot);
        for (id, value) in produced {
            results.insert(id, value);
        }
    }

    fn notify(&self, scheduler: &WaveScheduler, id: &str) {
        let (Some(observer), Some(record)) = (&self.observer, scheduler.record(id)) else {
            return;
        };
        observer(record);
    }
}
