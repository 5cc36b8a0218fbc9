#![allow(dead_code)]

pub use wavedag_test_utils::{builders, fake_units, init_tracing, with_timeout};

use wavedag::engine::RunOutcome;

/// Assert that every dependency finished no later than its dependent started.
pub fn assert_dependencies_finished_first(outcome: &RunOutcome, deps: &[(&str, &str)]) {
    for (unit, dep) in deps {
        let u = outcome.record(unit).expect("unit record");
        let d = outcome.record(dep).expect("dependency record");
        let started = u.started_at.expect("unit started");
        let finished = d.completed_at.expect("dependency finished");
        assert!(
            finished <= started,
            "{unit} started at {started} before {dep} finished at {finished}"
        );
    }
}
