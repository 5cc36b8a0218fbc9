// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Graph-definition problems (`DuplicateUnit`, `UnknownDependency`, `Cycle`)
//! are the only errors `Orchestrator::run` ever returns. Failures inside a
//! unit's producer are recorded on its execution record instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WavedagError {
    #[error("Duplicate unit: '{0}' is already registered")]
    DuplicateUnit(String),

    #[error("Unknown dependency: unit '{unit}' depends on unregistered unit '{dependency}'")]
    UnknownDependency { unit: String, dependency: String },

    #[error("Cycle detected in unit graph: {0}")]
    Cycle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WavedagError {
    /// Whether this error describes a malformed graph (as opposed to IO or
    /// plan-file problems).
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            WavedagError::DuplicateUnit(_)
                | WavedagError::UnknownDependency { .. }
                | WavedagError::Cycle(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WavedagError>;
