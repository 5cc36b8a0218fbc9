use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// How a command unit's stdout is turned into its result value.
///
/// - `Json`: stdout is parsed as a JSON document (default). Empty output
///   becomes `null`.
/// - `Text`: stdout is stored as a trimmed JSON string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Text,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Json
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            other => Err(format!(
                "invalid output format: {other} (expected \"json\" or \"text\")"
            )),
        }
    }
}

/// Comparison used by a plan-file `condition` gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// True iff the referenced value is present (the `value` field is ignored).
    Exists,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eq" | "==" => Ok(CompareOp::Eq),
            "ne" | "!=" => Ok(CompareOp::Ne),
            "gt" | ">" => Ok(CompareOp::Gt),
            "ge" | ">=" => Ok(CompareOp::Ge),
            "lt" | "<" => Ok(CompareOp::Lt),
            "le" | "<=" => Ok(CompareOp::Le),
            "exists" => Ok(CompareOp::Exists),
            other => Err(format!("invalid comparison operator: {other}")),
        }
    }
}
