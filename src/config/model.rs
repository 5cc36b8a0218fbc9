// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{CompareOp, OutputFormat};

/// Plan file exactly as read from TOML, before validation.
///
/// ```toml
/// [config]
/// unit_timeout_secs = 60
///
/// [unit.prices]
/// cmd = "fetch-prices --json"
///
/// [unit.valuation]
/// cmd = "value-company"
/// after = ["prices"]
///
/// [unit.valuation.condition]
/// unit = "prices"
/// pointer = "/close"
/// op = "gt"
/// value = 10
/// ```
///
/// All sections are optional at the TOML level; validation requires at least
/// one unit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlanFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All units from `[unit.<id>]`, keyed by unit id.
    #[serde(default)]
    pub unit: BTreeMap<String, UnitConfig>,
}

/// A plan that passed validation. Only obtainable through
/// `PlanFile::try_from(raw)` or the loader.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: ConfigSection,
    pub unit: BTreeMap<String, UnitConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(config: ConfigSection, unit: BTreeMap<String, UnitConfig>) -> Self {
        Self { config, unit }
    }

    /// Timeout for a unit: its own `timeout_secs`, else the global default.
    pub fn effective_timeout(&self, unit: &UnitConfig) -> Option<Duration> {
        unit.timeout_secs
            .or(self.config.unit_timeout_secs)
            .map(Duration::from_secs)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Default per-unit timeout in seconds. No timeout when absent.
    #[serde(default)]
    pub unit_timeout_secs: Option<u64>,
}

/// `[unit.<id>]` section: a unit backed by a shell command.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    /// Command line, run through the platform shell.
    pub cmd: String,

    /// Ids of the units that must finish first.
    #[serde(default)]
    pub after: Vec<String>,

    /// How stdout becomes the unit's value.
    #[serde(default)]
    pub output: OutputFormat,

    /// Per-unit timeout in seconds; overrides `[config].unit_timeout_secs`.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Optional gate evaluated once the dependencies are done.
    #[serde(default)]
    pub condition: Option<ConditionConfig>,
}

/// `[unit.<id>.condition]`: compare a value produced by a dependency.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConditionConfig {
    /// Unit whose result is inspected. Must be listed in `after`.
    pub unit: String,

    /// JSON pointer into that result (`""` is the whole value).
    #[serde(default)]
    pub pointer: String,

    pub op: CompareOp,

    /// Right-hand side. Ignored for `exists`.
    #[serde(default)]
    pub value: serde_json::Value,
}
