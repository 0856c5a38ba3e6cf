//! Dependency graph over declared resources.
//!
//! Edges point from a dependent resource to the resource it consumes an
//! attribute of. The topological order is the authoritative creation order:
//! dependencies first, ties broken by declaration order so two synthesis
//! runs over the same input produce identical, diffable plans.
//!
//! Identity bindings are deliberately not edges. They are applied in a later
//! phase (see `binding`), which is what keeps a role granting itself access
//! to the cluster it was created alongside from looking like a cycle.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::resource::{ResourceId, ResourceModel};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    dependency: ResourceId,
    attribute: String,
}

/// Directed dependency edges, keyed by the dependent resource.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<ResourceId, Vec<Edge>>,
    edge_count: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` consumes `attribute` of `to`.
    ///
    /// Re-recording an identical edge is a no-op.
    pub fn add_edge(&mut self, from: ResourceId, to: ResourceId, attribute: impl Into<String>) {
        let edge = Edge {
            dependency: to,
            attribute: attribute.into(),
        };
        let entry = self.edges.entry(from).or_default();
        if entry.contains(&edge) {
            return;
        }
        debug!(
            "edge: #{} depends on #{} via '{}'",
            from.index(),
            to.index(),
            edge.attribute
        );
        entry.push(edge);
        self.edge_count += 1;
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Resources `from` depends on, in declaration order.
    pub fn dependencies_of(&self, from: ResourceId) -> Vec<ResourceId> {
        let mut deps: Vec<ResourceId> = self
            .edges
            .get(&from)
            .map(|edges| edges.iter().map(|e| e.dependency).collect())
            .unwrap_or_default();
        deps.sort();
        deps.dedup();
        deps
    }

    /// Depth-first topological sort over every resource in the model.
    ///
    /// Returns each resource exactly once, every dependency before its
    /// dependents. A cycle aborts with the full member list; it is never
    /// broken by an arbitrary ordering choice.
    pub fn topological_order(&self, model: &ResourceModel) -> SynthResult<Vec<ResourceId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; model.len()];
        let mut order = Vec::with_capacity(model.len());
        let mut path: Vec<ResourceId> = Vec::new();

        fn visit(
            graph: &DependencyGraph,
            model: &ResourceModel,
            node: ResourceId,
            marks: &mut Vec<Mark>,
            path: &mut Vec<ResourceId>,
            order: &mut Vec<ResourceId>,
        ) -> SynthResult<()> {
            match marks[node.index()] {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    // Slice the current path from the first occurrence of
                    // the revisited node to name every cycle participant.
                    let start = path.iter().position(|n| *n == node).unwrap_or(0);
                    let mut members: Vec<String> = path[start..]
                        .iter()
                        .map(|id| {
                            model
                                .get(*id)
                                .map(|r| r.label())
                                .unwrap_or_else(|_| format!("#{}", id.index()))
                        })
                        .collect();
                    members.push(
                        model
                            .get(node)
                            .map(|r| r.label())
                            .unwrap_or_else(|_| format!("#{}", node.index())),
                    );
                    return Err(SynthError::Cycle { members });
                }
                Mark::Unvisited => {}
            }

            marks[node.index()] = Mark::InProgress;
            path.push(node);
            for dep in graph.dependencies_of(node) {
                visit(graph, model, dep, marks, path, order)?;
            }
            path.pop();
            marks[node.index()] = Mark::Done;
            order.push(node);
            Ok(())
        }

        for index in 0..model.len() {
            visit(
                self,
                model,
                ResourceId(index),
                &mut marks,
                &mut path,
                &mut order,
            )?;
        }

        Ok(order)
    }
}
