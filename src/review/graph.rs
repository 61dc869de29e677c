//! Dependency graph over registered checks.
//!
//! The graph is built once per session from the active check set and
//! validated acyclic at registration time with Kahn's algorithm; a cyclic
//! configuration is a construction error, never a hung round. Declared
//! dependencies that reference checks outside the active set are skipped:
//! a check simply gets no context from an absent dependency.
//!
//! Execution order comes out as waves: groups of checks whose dependencies
//! are all satisfied by earlier waves. Checks within a wave share no edges
//! and are safe to run concurrently. Wave membership is ordered by
//! registration index, so the flattened order is stable and reproducible
//! for the same registry.

use crate::errors::PipelineError;
use crate::review::units::{CheckKind, CheckUnit};
use std::collections::{HashMap, HashSet};

/// Index into the registered unit list.
pub type UnitIndex = usize;

/// A validated directed acyclic graph over the active checks.
#[derive(Debug)]
pub struct CheckGraph {
    kinds: Vec<CheckKind>,
    index_map: HashMap<CheckKind, UnitIndex>,
    /// index → checks that depend on it
    forward_edges: Vec<Vec<UnitIndex>>,
    /// index → checks it depends on
    reverse_edges: Vec<Vec<UnitIndex>>,
}

impl CheckGraph {
    /// Build and validate a graph from the registered units.
    pub fn build(units: &[CheckUnit]) -> Result<Self, PipelineError> {
        if units.is_empty() {
            return Err(PipelineError::EmptyRegistry);
        }

        let mut index_map = HashMap::new();
        for (i, unit) in units.iter().enumerate() {
            if index_map.insert(unit.kind, i).is_some() {
                return Err(PipelineError::DuplicateCheck(unit.kind.id().to_string()));
            }
        }

        let mut forward_edges: Vec<Vec<UnitIndex>> = vec![Vec::new(); units.len()];
        let mut reverse_edges: Vec<Vec<UnitIndex>> = vec![Vec::new(); units.len()];

        for (to_idx, unit) in units.iter().enumerate() {
            for dep in &unit.dependencies {
                // A dependency outside the active set contributes no edge.
                if let Some(&from_idx) = index_map.get(dep) {
                    forward_edges[from_idx].push(to_idx);
                    reverse_edges[to_idx].push(from_idx);
                }
            }
        }

        let graph = Self {
            kinds: units.iter().map(|u| u.kind).collect(),
            index_map,
            forward_edges,
            reverse_edges,
        };
        graph.validate_no_cycles()?;
        Ok(graph)
    }

    /// Validate acyclicity with Kahn's algorithm.
    fn validate_no_cycles(&self) -> Result<(), PipelineError> {
        let mut in_degree: Vec<usize> = self.reverse_edges.iter().map(Vec::len).collect();
        let mut queue: Vec<UnitIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut processed = 0;
        while let Some(node) = queue.pop() {
            processed += 1;
            for &dependent in &self.forward_edges[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if processed != self.kinds.len() {
            let cycle: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .map(|(i, _)| self.kinds[i].id().to_string())
                .collect();
            return Err(PipelineError::DependencyCycle(cycle));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn get_index(&self, kind: CheckKind) -> Option<UnitIndex> {
        self.index_map.get(&kind).copied()
    }

    /// Checks the given check depends on (within the active set).
    pub fn dependencies(&self, index: UnitIndex) -> &[UnitIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Compute execution waves.
    ///
    /// Each wave lists the indices of checks whose dependencies are
    /// satisfied by prior waves, in registration order.
    pub fn compute_waves(&self) -> Vec<Vec<UnitIndex>> {
        let mut waves = Vec::new();
        let mut completed: HashSet<UnitIndex> = HashSet::new();

        loop {
            let ready: Vec<UnitIndex> = (0..self.kinds.len())
                .filter(|i| !completed.contains(i))
                .filter(|&i| self.dependencies(i).iter().all(|d| completed.contains(d)))
                .collect();

            if ready.is_empty() {
                break;
            }
            completed.extend(ready.iter().copied());
            waves.push(ready);
        }
        waves
    }

    /// Stable topological order: waves flattened, registration order within
    /// each wave.
    pub fn topo_order(&self) -> Vec<UnitIndex> {
        self.compute_waves().into_iter().flatten().collect()
    }
}
