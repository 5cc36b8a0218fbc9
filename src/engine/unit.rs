// src/engine/unit.rs

//! Caller-supplied unit definitions.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::{Results, UnitId, UnitValue};

/// Future returned by a producer. It must own everything it needs: the
/// orchestrator spawns it as its own Tokio task.
pub type ProducerFuture = Pin<Box<dyn Future<Output = anyhow::Result<UnitValue>> + Send>>;

/// The asynchronous work behind a unit.
///
/// Implemented for every `Fn(Results) -> impl Future<Output =
/// anyhow::Result<UnitValue>>`, so closures and async functions can be
/// registered directly.
pub trait Producer: Send + Sync {
    fn produce(&self, results: Results) -> ProducerFuture;
}

impl<F, Fut> Producer for F
where
    F: Fn(Results) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<UnitValue>> + Send + 'static,
{
    fn produce(&self, results: Results) -> ProducerFuture {
        Box::pin(self(results))
    }
}

/// Predicate over completed results. `false` skips the unit.
pub type Gate = Arc<dyn Fn(&Results) -> bool + Send + Sync>;

/// Outcome of evaluating a unit's gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GateDecision {
    Run,
    Skip,
    /// The gate panicked; the unit is recorded as failed.
    Panicked(String),
}

/// A named unit of work with declared dependencies.
#[derive(Clone)]
pub struct UnitSpec {
    id: UnitId,
    dependencies: Vec<UnitId>,
    producer: Arc<dyn Producer>,
    condition: Option<Gate>,
}

impl fmt::Debug for UnitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitSpec")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("has_condition", &self.condition.is_some())
            .finish_non_exhaustive()
    }
}

impl UnitSpec {
    pub fn new<P>(id: impl Into<UnitId>, producer: P) -> Self
    where
        P: Producer + 'static,
    {
        Self::from_producer(id, Arc::new(producer))
    }

    /// Build a unit around an already shared producer.
    pub fn from_producer(id: impl Into<UnitId>, producer: Arc<dyn Producer>) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            producer,
            condition: None,
        }
    }

    /// Add one dependency.
    pub fn after(mut self, dependency: impl Into<UnitId>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Add several dependencies, in order.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Only run the unit if `gate` returns `true` once its dependencies are
    /// done. Replaces any earlier gate.
    pub fn when<G>(mut self, gate: G) -> Self
    where
        G: Fn(&Results) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(gate));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dependencies(&self) -> &[UnitId] {
        &self.dependencies
    }

    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    pub(crate) fn produce(&self, results: Results) -> ProducerFuture {
        self.producer.produce(results)
    }

    pub(crate) fn evaluate_gate(&self, results: &Results) -> GateDecision {
        let Some(gate) = &self.condition else {
            return GateDecision::Run;
        };

        match catch_unwind(AssertUnwindSafe(|| gate(results))) {
            Ok(true) => GateDecision::Run,
            Ok(false) => GateDecision::Skip,
            Err(payload) => GateDecision::Panicked(panic_message(payload.as_ref())),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
