// src/lib.rs

//! Dependency-graph orchestrator that runs named units in parallel waves.
//!
//! ```no_run
//! use serde_json::json;
//! use wavedag::engine::{Orchestrator, Results, UnitSpec};
//!
//! # async fn demo() -> wavedag::errors::Result<()> {
//! let mut orchestrator = Orchestrator::new();
//! orchestrator.add_unit(UnitSpec::new("prices", |_r: Results| async { Ok(json!(12.5)) }))?;
//! orchestrator.add_unit(
//!     UnitSpec::new("valuation", |r: Results| async move {
//!         let price: f64 = r.get_as("prices").unwrap_or_default();
//!         Ok(json!(price * 20.0))
//!     })
//!     .after("prices")
//!     .when(|r: &Results| r.contains("prices")),
//! )?;
//!
//! let outcome = orchestrator.run().await?;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::PlanFile;
use crate::config::loader::load_and_validate;
use crate::dag::{DagGraph, UnitStatus};
use crate::engine::{Orchestrator, RunOutcome};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and validation
/// - command units and the orchestrator
/// - live progress logging
/// - the final report (text or JSON)
pub async fn run(args: CliArgs) -> Result<()> {
    let plan_path = args.plan.clone();
    let plan = load_and_validate(&plan_path)?;

    if args.dry_run {
        print_dry_run(&plan)?;
        return Ok(());
    }

    let mut orchestrator = Orchestrator::from_plan(&plan)?.with_progress(|rec| {
        if rec.status == UnitStatus::Success {
            let duration_ms = rec.duration.map(|d| d.as_millis() as u64).unwrap_or(0);
            info!(unit = %rec.id, duration_ms, "progress: unit succeeded");
        } else {
            let reason = rec.reason().unwrap_or_default();
            warn!(
                unit = %rec.id,
                status = %rec.status,
                reason = %reason,
                "progress: unit did not succeed"
            );
        }
    });

    info!(plan = %plan_path.display(), units = orchestrator.unit_count(), "running plan");
    let outcome = orchestrator.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_report(&outcome);
    }

    if args.strict && outcome.has_failures() {
        anyhow::bail!("{} unit(s) failed", outcome.failed().len());
    }

    Ok(())
}

/// Text report: one line per unit plus the summary.
fn print_report(outcome: &RunOutcome) {
    for rec in &outcome.executions {
        let ms = rec
            .duration
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "-".to_string());
        match rec.reason() {
            Some(reason) => println!("{:<24} {:<8} {:>8}  {}", rec.id, rec.status, ms, reason),
            None => println!("{:<24} {:<8} {:>8}", rec.id, rec.status, ms),
        }
    }
    println!();
    println!(
        "{} in {}ms",
        outcome.summary(),
        outcome.total_duration.as_millis()
    );
}

/// Dry-run output: units, deps, commands and the wave layout.
fn print_dry_run(plan: &PlanFile) -> Result<()> {
    println!("wavedag dry-run");
    if let Some(secs) = plan.config.unit_timeout_secs {
        println!("  config.unit_timeout_secs = {secs}");
    }
    println!();

    println!("units ({}):", plan.unit.len());
    for (id, unit) in plan.unit.iter() {
        println!("  - {id}");
        println!("      cmd: {}", unit.cmd);
        if !unit.after.is_empty() {
            println!("      after: {:?}", unit.after);
        }
        println!("      output: {:?}", unit.output);
        if let Some(timeout) = plan.effective_timeout(unit) {
            println!("      timeout: {}s", timeout.as_secs());
        }
        if let Some(ref cond) = unit.condition {
            println!(
                "      condition: {}{} {:?} {}",
                cond.unit, cond.pointer, cond.op, cond.value
            );
        }
    }

    let graph = DagGraph::from_units(
        plan.unit
            .iter()
            .map(|(id, unit)| (id.clone(), unit.after.clone())),
    )?;
    println!();
    println!("waves:");
    for (n, wave) in graph.waves()?.iter().enumerate() {
        println!("  {}: {}", n + 1, wave.join(", "));
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
