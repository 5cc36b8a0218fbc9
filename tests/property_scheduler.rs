// tests/property_scheduler.rs
mod common;
use crate::common::fake_units::{CallLog, failing_unit, value_unit};

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;
use wavedag::dag::{DagGraph, SkipReason, UnitStatus, WaveScheduler};
use wavedag::engine::{Orchestrator, Results};

/// A random acyclic graph: unit N may only depend on units 0..N-1.
#[derive(Debug, Clone)]
struct Scenario {
    deps: Vec<BTreeSet<usize>>,
    failing: Vec<bool>,
    gated_off: Vec<bool>,
}

impl Scenario {
    fn name(i: usize) -> String {
        format!("unit_{i}")
    }

    fn graph(&self) -> DagGraph {
        DagGraph::from_units(self.deps.iter().enumerate().map(|(i, deps)| {
            (Self::name(i), deps.iter().map(|&d| Self::name(d)).collect::<Vec<_>>())
        }))
        .unwrap()
    }

    /// Status every unit must end in, computed directly from the rules:
    /// a unit downstream of a failure is skipped, otherwise its gate decides,
    /// otherwise it runs.
    fn expected(&self) -> Vec<(UnitStatus, bool)> {
        let mut out: Vec<(UnitStatus, bool)> = Vec::with_capacity(self.deps.len());
        for (i, deps) in self.deps.iter().enumerate() {
            let blocked = deps.iter().any(|&d| {
                let (status, dep_blocked) = out[d];
                status == UnitStatus::Failed || dep_blocked
            });
            let status = if blocked || self.gated_off[i] {
                UnitStatus::Skipped
            } else if self.failing[i] {
                UnitStatus::Failed
            } else {
                UnitStatus::Success
            };
            out.push((status, blocked));
        }
        out
    }
}

fn scenario_strategy(max_units: usize) -> impl Strategy<Value = Scenario> {
    (1..=max_units).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n),
            proptest::collection::vec(proptest::bool::weighted(0.2), n),
            proptest::collection::vec(proptest::bool::weighted(0.15), n),
        )
            .prop_map(move |(raw_deps, failing, gated_off)| {
                // Sanitize dependencies: only allow deps < i
                let deps = raw_deps
                    .into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            potential.into_iter().map(|d| d % i).collect()
                        }
                    })
                    .collect();
                Scenario {
                    deps,
                    failing,
                    gated_off,
                }
            })
    })
}

proptest! {
    #[test]
    fn test_scheduler_drives_every_unit_to_its_expected_state(scenario in scenario_strategy(12)) {
        let mut scheduler = WaveScheduler::new(scenario.graph());
        let n = scenario.deps.len();

        // Wave in which each unit became terminal.
        let mut settled_in: HashMap<String, u64> = HashMap::new();
        let mut steps = 0;

        loop {
            steps += 1;
            prop_assert!(steps <= n + 1, "scheduler did not terminate");

            let step = scheduler.next_wave();
            for id in &step.newly_skipped {
                settled_in.insert(id.clone(), step.wave);
            }
            if step.finished {
                break;
            }
            prop_assert!(!step.is_stalled(), "stalled with idle units: {:?}", scheduler.records());

            for id in &step.ready {
                // Every dependency is already terminal when a unit becomes ready.
                prop_assert_eq!(scheduler.deps_satisfied(id), Some(true));
                for dep in scheduler.graph().dependencies_of(id) {
                    prop_assert!(settled_in.contains_key(dep), "{} ready before {}", id, dep);
                }
            }

            for id in step.ready.clone() {
                let i: usize = id.trim_start_matches("unit_").parse().unwrap();
                let now = Utc::now();
                if scenario.gated_off[i] {
                    prop_assert!(scheduler.mark_skipped(&id, SkipReason::ConditionNotMet, now));
                } else {
                    prop_assert!(scheduler.mark_running(&id, now));
                    if scenario.failing[i] {
                        prop_assert!(scheduler.mark_failed(&id, "boom", now, Duration::ZERO));
                    } else {
                        prop_assert!(scheduler.mark_success(&id, json!(i), now, Duration::ZERO));
                    }
                }
                settled_in.insert(id, step.wave);
            }
        }

        prop_assert!(scheduler.all_terminal());

        for (i, (status, blocked)) in scenario.expected().into_iter().enumerate() {
            let rec = scheduler.record(&Scenario::name(i)).unwrap();
            prop_assert_eq!(rec.status, status, "unit_{}", i);

            let skipped_for_failure = matches!(rec.skip_reason, Some(SkipReason::DependencyFailed { .. }));
            prop_assert_eq!(skipped_for_failure, blocked, "unit_{}", i);

            if let Some(SkipReason::DependencyFailed { dependency }) = &rec.skip_reason {
                let dep_status = scheduler.status_of(dependency).unwrap();
                prop_assert!(dep_status == UnitStatus::Failed || dep_status == UnitStatus::Skipped);
            }
        }
    }

    #[test]
    fn test_orchestrator_invokes_exactly_the_non_skipped_units(scenario in scenario_strategy(8)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let log = CallLog::new();
        let mut orchestrator = Orchestrator::new();
        for (i, deps) in scenario.deps.iter().enumerate() {
            let name = Scenario::name(i);
            let mut unit = if scenario.failing[i] {
                failing_unit(&name, "boom", &log)
            } else {
                value_unit(&name, json!(i), &log)
            };
            unit = unit.depends_on(deps.iter().map(|&d| Scenario::name(d)));
            if scenario.gated_off[i] {
                unit = unit.when(|_r: &Results| false);
            }
            orchestrator.add_unit(unit).unwrap();
        }

        let outcome = runtime.block_on(orchestrator.run()).unwrap();

        for (i, (status, _)) in scenario.expected().into_iter().enumerate() {
            let name = Scenario::name(i);
            prop_assert_eq!(outcome.status_of(&name), Some(status));
            let invoked = if status == UnitStatus::Skipped { 0 } else { 1 };
            prop_assert_eq!(log.count(&name), invoked, "{}", name);
            prop_assert_eq!(outcome.results.contains(&name), status == UnitStatus::Success);
        }
    }
}
