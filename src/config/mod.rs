// src/config/mod.rs

//! Plan files for the `wavedag` binary.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate it, including graph correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{ConditionConfig, ConfigSection, PlanFile, RawPlanFile, UnitConfig};
pub use validate::validate_plan;
