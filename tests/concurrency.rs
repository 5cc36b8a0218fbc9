// tests/concurrency.rs
mod common;
use crate::common::fake_units::{CallLog, delayed_unit, value_unit};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Barrier;
use wavedag::dag::UnitStatus;
use wavedag::engine::{Orchestrator, Results, UnitSpec};

type TestResult = Result<(), Box<dyn Error>>;

/// A unit that can only finish once `barrier` has been reached by every
/// other unit sharing it.
fn rendezvous_unit(id: &str, barrier: &Arc<Barrier>) -> UnitSpec {
    let barrier = Arc::clone(barrier);
    let name = id.to_string();
    UnitSpec::new(id, move |_r: Results| {
        let barrier = Arc::clone(&barrier);
        let name = name.clone();
        async move {
            barrier.wait().await;
            Ok(json!(name))
        }
    })
}

#[tokio::test]
async fn independent_units_are_running_at_the_same_time() -> TestResult {
    // Would deadlock (and hit the test timeout) if X and Y ran one after the other.
    with_timeout(async {
        init_tracing();
        let barrier = Arc::new(Barrier::new(2));

        let mut o = Orchestrator::new();
        o.add_unit(rendezvous_unit("X", &barrier))?;
        o.add_unit(rendezvous_unit("Y", &barrier))?;

        let outcome = o.run().await?;
        assert!(outcome.all_succeeded());

        let x = outcome.record("X").unwrap();
        let y = outcome.record("Y").unwrap();
        assert!(x.started_at.unwrap() <= y.completed_at.unwrap());
        assert!(y.started_at.unwrap() <= x.completed_at.unwrap());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn concurrent_current_thread_runtime_also_overlaps() -> TestResult {
    // The default `#[tokio::test]` runtime is single-threaded; spawning still
    // interleaves producers on it.
    with_timeout(async {
        init_tracing();
        let barrier = Arc::new(Barrier::new(3));

        let mut o = Orchestrator::new();
        o.add_unit(rendezvous_unit("a", &barrier))?;
        o.add_unit(rendezvous_unit("b", &barrier))?;
        o.add_unit(rendezvous_unit("c", &barrier))?;
        o.add_unit(
            UnitSpec::new("joined", |r: Results| async move { Ok(json!(r.len())) })
                .depends_on(["a", "b", "c"]),
        )?;

        let outcome = o.run().await?;
        assert_eq!(outcome.results.get("joined"), Some(&json!(3)));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn next_wave_waits_for_the_slowest_unit_of_the_current_wave() -> TestResult {
    with_timeout(async {
        init_tracing();
        let log = CallLog::new();

        // fast -> follow-up; slow is an unrelated sibling of fast.
        let mut o = Orchestrator::new();
        o.add_unit(value_unit("fast", json!(1), &log))?;
        o.add_unit(delayed_unit("slow", json!(2), Duration::from_millis(80), &log))?;
        o.add_unit(value_unit("follow_up", json!(3), &log).after("fast"))?;

        let outcome = o.run().await?;

        let slow = outcome.record("slow").unwrap();
        let follow_up = outcome.record("follow_up").unwrap();
        assert!(slow.completed_at.unwrap() <= follow_up.started_at.unwrap());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn results_of_a_wave_become_visible_only_to_later_waves() -> TestResult {
    with_timeout(async {
        init_tracing();

        // Both units run in the first wave; neither may observe the other.
        let mut o = Orchestrator::new();
        o.add_unit(UnitSpec::new("first", |r: Results| async move {
            Ok(json!(r.len()))
        }))?;
        o.add_unit(UnitSpec::new("second", |r: Results| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(json!(r.contains("first")))
        }))?;

        let outcome = o.run().await?;
        assert_eq!(outcome.results.get("first"), Some(&json!(0)));
        assert_eq!(outcome.results.get("second"), Some(&json!(false)));
        Ok(())
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wide_wave_on_multi_thread_runtime() -> TestResult {
    with_timeout(async {
        init_tracing();
        let log = CallLog::new();

        let mut o = Orchestrator::new();
        for i in 0..16 {
            o.add_unit(delayed_unit(&format!("leaf_{i}"), json!(i), Duration::from_millis(50), &log))?;
        }
        o.add_unit(
            UnitSpec::new("sum", |r: Results| async move {
                let total: i64 = r.iter().filter_map(|(_, v)| v.as_i64()).sum();
                Ok(json!(total))
            })
            .depends_on((0..16).map(|i| format!("leaf_{i}"))),
        )?;

        let outcome = o.run().await?;

        assert_eq!(outcome.status_of("sum"), Some(UnitStatus::Success));
        assert_eq!(outcome.results.get("sum"), Some(&json!(120)));
        // Sixteen 50ms sleeps back to back would take 800ms.
        assert!(outcome.total_duration < Duration::from_millis(600));
        assert_eq!(log.total(), 16);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn dropping_a_run_aborts_producers_still_in_flight() -> TestResult {
    with_timeout(async {
        init_tracing();
        let completed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&completed);
        let mut o = Orchestrator::new();
        o.add_unit(UnitSpec::new("slow", move |_r: Results| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("done"))
            }
        }))?;

        let abandoned = tokio::time::timeout(Duration::from_millis(20), o.run()).await;
        assert!(abandoned.is_err(), "run should still be in flight");

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);

        // The orchestrator is still usable after an abandoned run.
        let outcome = o.run().await?;
        assert!(outcome.all_succeeded());
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        Ok(())
    })
    .await
}
