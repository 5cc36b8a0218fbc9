// src/exec/condition.rs

//! Gates built from plan-file `condition` sections.

use std::cmp::Ordering;

use serde_json::Value;
use tracing::debug;

use crate::config::ConditionConfig;
use crate::engine::Results;
use crate::types::CompareOp;

/// Evaluate a condition against the current results.
///
/// The left-hand side is the value of `cond.unit` at `cond.pointer`. Numbers
/// compare numerically and strings lexicographically. Anything missing or of
/// mismatched type makes ordering comparisons false.
pub fn evaluate(cond: &ConditionConfig, results: &Results) -> bool {
    let left = results
        .get(&cond.unit)
        .and_then(|v| v.pointer(&cond.pointer));

    let verdict = compare(cond.op, left, &cond.value);
    debug!(
        unit = %cond.unit,
        pointer = %cond.pointer,
        op = ?cond.op,
        ?left,
        right = %cond.value,
        verdict,
        "evaluated condition"
    );
    verdict
}

/// Turn a condition into a gate closure for [`crate::engine::UnitSpec::when`].
pub fn condition_gate(cond: ConditionConfig) -> impl Fn(&Results) -> bool + Send + Sync + 'static {
    move |results: &Results| evaluate(&cond, results)
}

fn compare(op: CompareOp, left: Option<&Value>, right: &Value) -> bool {
    let Some(left) = left else {
        return false;
    };

    match op {
        CompareOp::Exists => true,
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering(left, right), Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match ordering(left, right) {
        Some(ord) => ord == Ordering::Equal,
        None => left == right,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}
