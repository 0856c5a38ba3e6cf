//! Synthesis driver.
//!
//! `App` is the explicit construction context: every declaring call names
//! its owning unit, and all process-wide mutable state (dependency graph,
//! output registry) lives here rather than in ambient globals. Construction
//! is a pure declaration phase; `synthesize` is the resolution phase that
//! walks the topological order, provisions, applies bindings, and finalizes
//! outputs. Any error aborts the pass with no outputs published.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::binding::{self, BindingKind, PendingBinding, PrincipalSource};
use crate::error::{SynthError, SynthResult};
use crate::graph::DependencyGraph;
use crate::output::OutputRegistry;
use crate::provision::{Provisioner, ResourceDescriptor};
use crate::resource::{AttrRef, ResourceId, ResourceKind, ResourceModel, Value};
use crate::stack::{UnitId, UnitTree};

/// Construction context for one synthesis pass.
///
/// Discarded and rebuilt wholesale on the next invocation; there is no
/// in-place mutation of a previously synthesized graph.
pub struct App {
    model: ResourceModel,
    graph: DependencyGraph,
    units: UnitTree,
    outputs: OutputRegistry,
    bindings: Vec<PendingBinding>,
}

impl App {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            model: ResourceModel::new(),
            graph: DependencyGraph::new(),
            units: UnitTree::new(root_name),
            outputs: OutputRegistry::new(),
            bindings: Vec::new(),
        }
    }

    pub fn root(&self) -> UnitId {
        self.units.root()
    }

    /// Create a child composition unit.
    pub fn child_unit(&mut self, parent: UnitId, name: impl Into<String>) -> UnitId {
        self.units.child(parent, name)
    }

    pub fn unit_path(&self, unit: UnitId) -> String {
        self.units.path(unit)
    }

    /// Declare a resource owned by `unit`.
    ///
    /// Registers one dependency edge per referenced input. References must
    /// point at resources of `unit` or an ancestor, or at a direct child's
    /// declared output; anything else violates unit encapsulation.
    pub fn declare(
        &mut self,
        unit: UnitId,
        kind: ResourceKind,
        name: impl Into<String>,
        inputs: BTreeMap<String, Value>,
    ) -> SynthResult<ResourceId> {
        let name = name.into();
        if self
            .model
            .iter()
            .any(|r| r.unit == unit && r.name == name)
        {
            return Err(SynthError::DuplicateResource {
                unit: self.units.path(unit),
                name,
            });
        }

        let mut refs = Vec::new();
        for value in inputs.values() {
            value.collect_refs(&mut refs);
        }
        for r in &refs {
            self.check_visibility(unit, r)?;
        }
        let edges: Vec<(ResourceId, String)> = refs
            .into_iter()
            .map(|r| (r.resource, r.attribute.clone()))
            .collect();

        let id = self.model.declare(unit, kind, name, inputs);
        for (dependency, attribute) in edges {
            self.graph.add_edge(id, dependency, attribute);
        }
        Ok(id)
    }

    /// Lazy reference to an attribute of a declared resource.
    pub fn attribute(&self, id: ResourceId, name: impl Into<String>) -> AttrRef {
        self.model.attribute(id, name)
    }

    /// Add an explicit ordering edge with no attribute flow.
    pub fn add_dependency(&mut self, from: ResourceId, to: ResourceId) {
        self.graph.add_edge(from, to, "depends-on");
    }

    /// Export an output of `unit`. The value may hold deferred references,
    /// resolved when synthesis completes.
    pub fn export(
        &mut self,
        unit: UnitId,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> SynthResult<()> {
        let value = value.into();
        let mut refs = Vec::new();
        value.collect_refs(&mut refs);
        for r in &refs {
            self.check_visibility(unit, r)?;
        }
        self.outputs.register(unit, name, value);
        Ok(())
    }

    /// Consume a direct child's declared output from its parent.
    pub fn import(&self, parent: UnitId, child: UnitId, name: &str) -> SynthResult<Value> {
        if !self.units.is_child_of(child, parent) {
            return Err(SynthError::ForeignReference {
                consumer_unit: self.units.path(parent),
                producer: self.units.path(child),
            });
        }
        self.outputs
            .exported(child, name)
            .cloned()
            .ok_or_else(|| SynthError::UnknownOutput {
                unit: self.units.path(child),
                name: name.to_string(),
            })
    }

    /// Record a deferred administrator binding on a cluster.
    pub fn bind_administrator(&mut self, cluster: ResourceId, principal: PrincipalSource) {
        debug!("pending administrator binding on #{}", cluster.index());
        self.bindings.push(PendingBinding {
            cluster,
            principal,
            kind: BindingKind::Administrator,
        });
    }

    /// Record a deferred masters-role binding on a cluster.
    pub fn bind_master_role(&mut self, cluster: ResourceId, role: ResourceId) {
        debug!(
            "pending master-role binding of #{} on #{}",
            role.index(),
            cluster.index()
        );
        self.bindings.push(PendingBinding {
            cluster,
            principal: PrincipalSource::Created(role),
            kind: BindingKind::MasterRole,
        });
    }

    /// Creation order without provisioning anything: the plan.
    pub fn creation_order(&self) -> SynthResult<Vec<String>> {
        let order = self.graph.topological_order(&self.model)?;
        order.iter().map(|id| self.resource_path(*id)).collect()
    }

    /// A resolved output. Fails with `NotYetResolved` until synthesis has
    /// completed the full graph.
    pub fn output(&self, unit: UnitId, name: &str) -> SynthResult<String> {
        self.outputs.output(unit, name, &self.units)
    }

    pub fn model(&self) -> &ResourceModel {
        &self.model
    }

    fn resource_path(&self, id: ResourceId) -> SynthResult<String> {
        let record = self.model.get(id)?;
        Ok(format!("{}/{}", self.units.path(record.unit), record.name))
    }

    /// Enforce the unit encapsulation rule for one reference consumed from
    /// `consumer`.
    fn check_visibility(&self, consumer: UnitId, r: &AttrRef) -> SynthResult<()> {
        let producer = self.model.get(r.resource)?;
        if self.units.is_ancestor_or_self(producer.unit, consumer) {
            return Ok(());
        }
        if self.units.is_child_of(producer.unit, consumer)
            && self.outputs.is_exported_ref(producer.unit, r)
        {
            return Ok(());
        }
        Err(SynthError::ForeignReference {
            consumer_unit: self.units.path(consumer),
            producer: format!("{}/{}", self.units.path(producer.unit), producer.name),
        })
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("resources", &self.model.len())
            .field("edges", &self.graph.edge_count())
            .field("units", &self.units.len())
            .field("outputs", &self.outputs.len())
            .field("pending_bindings", &self.bindings.len())
            .finish()
    }
}

/// The result of a completed synthesis pass.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Resource paths in creation order.
    pub creation_order: Vec<String>,
    outputs: BTreeMap<String, String>,
    pub bindings_applied: usize,
}

impl SynthesisResult {
    /// Every finalized output, keyed by `unit/path/name`.
    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }
}

/// Run the resolution phase over a constructed `App`.
///
/// Order is computed first: a cycle aborts before a single provisioning
/// call is issued. Each resource is then provisioned in order, bindings are
/// applied, and outputs finalized. On any error the pass aborts and no
/// output state is published.
pub async fn synthesize(
    app: &mut App,
    provisioner: &dyn Provisioner,
) -> SynthResult<SynthesisResult> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(
        "synthesis {} starting: {} resource(s), {} edge(s)",
        run_id,
        app.model.len(),
        app.graph.edge_count()
    );

    let order = app.graph.topological_order(&app.model)?;

    for id in &order {
        let descriptor = build_descriptor(app, *id)?;
        info!(
            "provisioning {} '{}'",
            descriptor.kind, descriptor.name
        );
        let attributes =
            provisioner
                .provision(&descriptor)
                .await
                .map_err(|source| SynthError::Provisioning {
                    resource: descriptor.name.clone(),
                    source,
                })?;
        app.model.record_attributes(*id, attributes)?;
    }

    let applied = binding::apply_bindings(&app.bindings, &app.model, provisioner).await?;

    app.outputs.finalize(&app.model, &app.units)?;
    let outputs = app
        .outputs
        .finalized()
        .cloned()
        .unwrap_or_default();

    let creation_order = order
        .iter()
        .map(|id| app.resource_path(*id))
        .collect::<SynthResult<Vec<_>>>()?;

    let completed_at = Utc::now();
    info!(
        "synthesis {} complete: {} resource(s), {} output(s)",
        run_id,
        creation_order.len(),
        outputs.len()
    );

    Ok(SynthesisResult {
        run_id,
        started_at,
        completed_at,
        creation_order,
        outputs,
        bindings_applied: applied.len(),
    })
}

fn build_descriptor(app: &App, id: ResourceId) -> SynthResult<ResourceDescriptor> {
    let record = app.model.get(id)?;
    let mut inputs = BTreeMap::new();
    for (key, value) in &record.inputs {
        inputs.insert(key.clone(), app.model.resolve_value(value)?);
    }
    Ok(ResourceDescriptor {
        kind: record.kind,
        name: record.name.clone(),
        unit_path: app.units.path(record.unit),
        inputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_within_a_unit_rejected() {
        let mut app = App::new("root");
        let root = app.root();
        app.declare(root, ResourceKind::Network, "vpc", BTreeMap::new())
            .unwrap();
        let err = app
            .declare(root, ResourceKind::Network, "vpc", BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, SynthError::DuplicateResource { .. }));
    }

    #[test]
    fn test_same_name_in_sibling_units_allowed() {
        let mut app = App::new("root");
        let a = app.child_unit(app.root(), "a");
        let b = app.child_unit(app.root(), "b");
        app.declare(a, ResourceKind::SecurityRules, "rules", BTreeMap::new())
            .unwrap();
        app.declare(b, ResourceKind::SecurityRules, "rules", BTreeMap::new())
            .unwrap();
    }

    #[test]
    fn test_sibling_reference_is_foreign() {
        let mut app = App::new("root");
        let a = app.child_unit(app.root(), "a");
        let b = app.child_unit(app.root(), "b");
        let producer = app
            .declare(a, ResourceKind::Network, "vpc", BTreeMap::new())
            .unwrap();

        let mut inputs = BTreeMap::new();
        inputs.insert(
            "vpc_id".to_string(),
            Value::Ref(app.attribute(producer, "vpc_id")),
        );
        let err = app
            .declare(b, ResourceKind::SecurityRules, "rules", inputs)
            .unwrap_err();
        assert!(matches!(err, SynthError::ForeignReference { .. }));
    }

    #[test]
    fn test_ancestor_reference_is_visible() {
        let mut app = App::new("root");
        let root = app.root();
        let child = app.child_unit(root, "cache");
        let vpc = app
            .declare(root, ResourceKind::Network, "vpc", BTreeMap::new())
            .unwrap();

        let mut inputs = BTreeMap::new();
        inputs.insert(
            "vpc_id".to_string(),
            Value::Ref(app.attribute(vpc, "vpc_id")),
        );
        app.declare(child, ResourceKind::SecurityRules, "rules", inputs)
            .unwrap();
    }

    #[test]
    fn test_child_resource_visible_to_parent_only_via_export() {
        let mut app = App::new("root");
        let root = app.root();
        let child = app.child_unit(root, "cache");
        let group = app
            .declare(child, ResourceKind::CacheReplicationGroup, "redis", BTreeMap::new())
            .unwrap();
        let endpoint = app.attribute(group, "primary_endpoint_address");

        // Not exported yet: the parent may not reach in.
        let mut inputs = BTreeMap::new();
        inputs.insert("endpoint".to_string(), Value::Ref(endpoint.clone()));
        let err = app
            .declare(root, ResourceKind::BuildProject, "build", inputs.clone())
            .unwrap_err();
        assert!(matches!(err, SynthError::ForeignReference { .. }));

        // Exported: the same reference becomes legal.
        app.export(child, "redis_url", endpoint).unwrap();
        app.declare(root, ResourceKind::BuildProject, "build", inputs)
            .unwrap();
    }

    #[test]
    fn test_import_requires_direct_child() {
        let mut app = App::new("root");
        let a = app.child_unit(app.root(), "a");
        let b = app.child_unit(app.root(), "b");
        let _ = a;

        let err = app.import(b, b, "x").unwrap_err();
        assert!(matches!(err, SynthError::ForeignReference { .. }));
    }

    #[test]
    fn test_output_before_synthesis_not_yet_resolved() {
        let mut app = App::new("root");
        let root = app.root();
        app.export(root, "name", Value::literal("platform")).unwrap();

        let err = app.output(root, "name").unwrap_err();
        assert!(matches!(err, SynthError::NotYetResolved { .. }));
    }
}
