#![allow(dead_code)]

use std::collections::BTreeMap;
use wavedag::config::{ConditionConfig, ConfigSection, PlanFile, RawPlanFile, UnitConfig};
use wavedag::types::{CompareOp, OutputFormat};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: ConfigSection::default(),
                unit: BTreeMap::new(),
            },
        }
    }

    pub fn with_unit(mut self, id: &str, unit: UnitConfig) -> Self {
        self.plan.unit.insert(id.to_string(), unit);
        self
    }

    pub fn with_unit_timeout_secs(mut self, secs: u64) -> Self {
        self.plan.config.unit_timeout_secs = Some(secs);
        self
    }

    /// The raw plan, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `UnitConfig`.
pub struct UnitConfigBuilder {
    unit: UnitConfig,
}

impl UnitConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            unit: UnitConfig {
                cmd: cmd.to_string(),
                after: vec![],
                output: OutputFormat::Json,
                timeout_secs: None,
                condition: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.unit.after.push(dep.to_string());
        self
    }

    pub fn text_output(mut self) -> Self {
        self.unit.output = OutputFormat::Text;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.unit.timeout_secs = Some(secs);
        self
    }

    pub fn condition(
        mut self,
        unit: &str,
        pointer: &str,
        op: CompareOp,
        value: serde_json::Value,
    ) -> Self {
        self.unit.condition = Some(ConditionConfig {
            unit: unit.to_string(),
            pointer: pointer.to_string(),
            op,
            value,
        });
        self
    }

    pub fn build(self) -> UnitConfig {
        self.unit
    }
}
