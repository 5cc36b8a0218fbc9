// src/config/validate.rs

use crate::config::model::{PlanFile, RawPlanFile};
use crate::dag::DagGraph;
use crate::errors::{Result, WavedagError};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::WavedagError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.unit))
    }
}

/// Check a raw plan without consuming it.
pub fn validate_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_units(plan)?;
    validate_global_config(plan)?;
    validate_units(plan)?;
    validate_dag(plan)?;
    Ok(())
}

fn ensure_has_units(plan: &RawPlanFile) -> Result<()> {
    if plan.unit.is_empty() {
        return Err(WavedagError::Config(
            "plan must contain at least one [unit.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(plan: &RawPlanFile) -> Result<()> {
    if plan.config.unit_timeout_secs == Some(0) {
        return Err(WavedagError::Config(
            "[config].unit_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_units(plan: &RawPlanFile) -> Result<()> {
    for (id, unit) in plan.unit.iter() {
        if unit.cmd.trim().is_empty() {
            return Err(WavedagError::Config(format!(
                "unit '{id}' has an empty `cmd`"
            )));
        }

        if unit.timeout_secs == Some(0) {
            return Err(WavedagError::Config(format!(
                "unit '{id}' has `timeout_secs = 0`; omit it to disable the timeout"
            )));
        }

        if let Some(cond) = &unit.condition {
            if !unit.after.contains(&cond.unit) {
                return Err(WavedagError::Config(format!(
                    "unit '{id}' has a condition on '{}', which is not listed in `after`",
                    cond.unit
                )));
            }
            if !cond.pointer.is_empty() && !cond.pointer.starts_with('/') {
                return Err(WavedagError::Config(format!(
                    "unit '{id}' has condition pointer '{}'; JSON pointers start with '/'",
                    cond.pointer
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    let graph = DagGraph::from_units(
        plan.unit
            .iter()
            .map(|(id, unit)| (id.clone(), unit.after.clone())),
    )?;
    graph.validate()
}
