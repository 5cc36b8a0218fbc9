// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::engine::UnitId;
use crate::errors::{Result, WavedagError};

/// Internal node structure: immediate deps in declaration order.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: units that must be terminal before this one runs.
    deps: Vec<UnitId>,
}

/// In-memory unit graph keyed by unit id.
///
/// Units can be inserted in any order; a dependency may name a unit that is
/// only inserted later. Call [`DagGraph::validate`] once the graph is complete
/// to reject unknown dependencies and cycles.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    /// Registration order, used for deterministic iteration.
    order: Vec<UnitId>,
    nodes: HashMap<UnitId, DagNode>,
    /// Reverse edges. May contain keys for units that were never inserted.
    dependents: HashMap<UnitId, Vec<UnitId>>,
}

impl DagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(id, deps)` pairs in registration order.
    pub fn from_units<I, D>(units: I) -> Result<Self>
    where
        I: IntoIterator<Item = (UnitId, D)>,
        D: IntoIterator<Item = UnitId>,
    {
        let mut graph = DagGraph::new();
        for (id, deps) in units {
            graph.insert(id, deps)?;
        }
        Ok(graph)
    }

    /// Register a unit and its dependencies. Duplicate dependency names are
    /// collapsed, keeping the first occurrence.
    pub fn insert<D>(&mut self, id: UnitId, deps: D) -> Result<()>
    where
        D: IntoIterator<Item = UnitId>,
    {
        if self.nodes.contains_key(&id) {
            return Err(WavedagError::DuplicateUnit(id));
        }

        let mut seen = HashSet::new();
        let deps: Vec<UnitId> = deps.into_iter().filter(|d| seen.insert(d.clone())).collect();

        for dep in &deps {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .push(id.clone());
        }

        self.order.push(id.clone());
        self.nodes.insert(id, DagNode { deps });
        Ok(())
    }

    /// All unit ids, in registration order.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Position of a unit in registration order.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|u| u == id)
    }

    /// Immediate dependencies of a unit.
    pub fn dependencies_of(&self, id: &str) -> &[UnitId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a unit (units that list it as a dependency).
    pub fn dependents_of(&self, id: &str) -> &[UnitId] {
        self.dependents
            .get(id)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Every unit reachable by following dependents from `id`, excluding
    /// `id` itself.
    pub fn transitive_dependents_of(&self, id: &str) -> Vec<UnitId> {
        let mut stack: Vec<UnitId> = self.dependents_of(id).to_vec();
        let mut visited: HashSet<UnitId> = HashSet::new();
        let mut out = Vec::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            stack.extend(self.dependents_of(&name).iter().cloned());
            out.push(name);
        }

        out
    }

    /// Reject unknown dependencies, then cycles.
    pub fn validate(&self) -> Result<()> {
        self.validate_dependencies()?;
        self.validate_acyclic()?;
        Ok(())
    }

    fn validate_dependencies(&self) -> Result<()> {
        for id in &self.order {
            for dep in self.dependencies_of(id) {
                if !self.nodes.contains_key(dep) {
                    return Err(WavedagError::UnknownDependency {
                        unit: id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_acyclic(&self) -> Result<()> {
        // Edge direction: dep -> unit.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in &self.order {
            graph.add_node(id.as_str());
        }

        for id in &self.order {
            for dep in self.dependencies_of(id) {
                if dep == id {
                    return Err(WavedagError::Cycle(format!(
                        "unit '{id}' depends on itself"
                    )));
                }
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(WavedagError::Cycle(format!(
                "cycle detected in unit graph involving unit '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// Static wave layout: the batches the graph would run in if every unit
    /// succeeded. Each wave lists units in registration order.
    pub fn waves(&self) -> Result<Vec<Vec<UnitId>>> {
        self.validate()?;

        let mut remaining: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|id| (id.as_str(), self.dependencies_of(id).len()))
            .collect();
        let mut waves = Vec::new();

        while !remaining.is_empty() {
            let wave: Vec<UnitId> = self
                .order
                .iter()
                .filter(|id| remaining.get(id.as_str()) == Some(&0))
                .cloned()
                .collect();

            for id in &wave {
                remaining.remove(id.as_str());
                for dependent in self.dependents_of(id) {
                    if let Some(count) = remaining.get_mut(dependent.as_str()) {
                        *count -= 1;
                    }
                }
            }

            waves.push(wave);
        }

        Ok(waves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(units: &[(&str, &[&str])]) -> DagGraph {
        DagGraph::from_units(units.iter().map(|(id, deps)| {
            (
                id.to_string(),
                deps.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            )
        }))
        .unwrap()
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut g = DagGraph::new();
        g.insert("A".into(), Vec::new()).unwrap();
        let err = g.insert("A".into(), Vec::new()).unwrap_err();
        assert!(matches!(err, WavedagError::DuplicateUnit(id) if id == "A"));
    }

    #[test]
    fn dependencies_may_be_registered_later() {
        let g = graph(&[("B", &["A"]), ("A", &[])]);
        assert!(g.validate().is_ok());
        assert_eq!(g.dependents_of("A"), ["B".to_string()]);
    }

    #[test]
    fn unknown_dependency_names_unit_and_dependency() {
        let g = graph(&[("A", &["ghost"])]);
        match g.validate() {
            Err(WavedagError::UnknownDependency { unit, dependency }) => {
                assert_eq!(unit, "A");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let g = graph(&[("A", &["B"]), ("B", &["A"])]);
        match g.validate() {
            Err(WavedagError::Cycle(msg)) => assert!(msg.contains('A') || msg.contains('B')),
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let g = graph(&[("A", &["A"])]);
        assert!(matches!(g.validate(), Err(WavedagError::Cycle(_))));
    }

    #[test]
    fn duplicate_dependencies_collapse() {
        let g = graph(&[("A", &[]), ("B", &["A", "A"])]);
        assert_eq!(g.dependencies_of("B").len(), 1);
        assert_eq!(g.dependents_of("A").len(), 1);
    }

    #[test]
    fn waves_layer_the_graph() {
        let g = graph(&[
            ("report", &["valuation", "news"]),
            ("prices", &[]),
            ("news", &[]),
            ("valuation", &["prices"]),
        ]);
        let waves = g.waves().unwrap();
        assert_eq!(
            waves,
            vec![
                vec!["prices".to_string(), "news".to_string()],
                vec!["valuation".to_string()],
                vec!["report".to_string()],
            ]
        );
    }

    #[test]
    fn transitive_dependents_follow_the_chain() {
        let g = graph(&[("A", &[]), ("B", &["A"]), ("C", &["B"]), ("D", &[])]);
        let mut deps = g.transitive_dependents_of("A");
        deps.sort();
        assert_eq!(deps, vec!["B".to_string(), "C".to_string()]);
    }
}
