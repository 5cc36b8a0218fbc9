// src/exec/mod.rs

//! Command-backed units for plan files.
//!
//! The orchestrator itself only knows about producers. This module supplies
//! the producers the `wavedag` binary uses:
//!
//! - [`command`] runs a unit's `cmd` with `tokio::process::Command`, passes
//!   dependency results in the environment and turns stdout into the unit's
//!   value.
//! - [`condition`] turns `[unit.<id>.condition]` sections into gates.

pub mod command;
pub mod condition;

pub use command::CommandUnit;
pub use condition::condition_gate;

use crate::config::PlanFile;
use crate::engine::UnitSpec;

/// One command unit per `[unit.<id>]` entry, gated by its condition if any.
pub fn units_from_plan(plan: &PlanFile) -> Vec<UnitSpec> {
    plan.unit
        .iter()
        .map(|(id, cfg)| {
            let unit =
                CommandUnit::from_config(id.clone(), cfg, plan.effective_timeout(cfg)).into_unit();
            match &cfg.condition {
                Some(cond) => unit.when(condition_gate(cond.clone())),
                None => unit,
            }
        })
        .collect()
}
