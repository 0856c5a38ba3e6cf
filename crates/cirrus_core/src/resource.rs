//! Typed resource model.
//!
//! Resources are declared during the construction phase and carry no
//! computed attributes until the synthesis driver has walked the dependency
//! graph and the provisioning collaborator has returned them. Declaring a
//! resource never blocks: inputs may reference attributes that do not exist
//! yet, and dereferencing such a reference early is a construction fault.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::stack::UnitId;

/// Opaque handle to a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub(crate) usize);

impl ResourceId {
    /// Position in declaration order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The kinds of resources the model knows how to order and wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    SubnetGroup,
    SecurityRules,
    Registry,
    CacheReplicationGroup,
    Cluster,
    IdentityRole,
    BuildProject,
    StorageBucket,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::SubnetGroup => "subnet-group",
            ResourceKind::SecurityRules => "security-rules",
            ResourceKind::Registry => "registry",
            ResourceKind::CacheReplicationGroup => "cache-replication-group",
            ResourceKind::Cluster => "cluster",
            ResourceKind::IdentityRole => "identity-role",
            ResourceKind::BuildProject => "build-project",
            ResourceKind::StorageBucket => "storage-bucket",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lazy reference to a named attribute of another resource.
///
/// Holding an `AttrRef` is always legal; resolving one is only legal once
/// the producer resource has been provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrRef {
    pub resource: ResourceId,
    pub attribute: String,
}

impl AttrRef {
    pub fn new(resource: ResourceId, attribute: impl Into<String>) -> Self {
        Self {
            resource,
            attribute: attribute.into(),
        }
    }
}

/// A declared input value: a literal, a collection, a lazy reference, or a
/// string template interpolating lazy references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Literal(String),
    Number(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Ref(AttrRef),
    /// `{placeholder}` occurrences are substituted with resolved reference
    /// values at synthesis completion.
    Template {
        template: String,
        refs: BTreeMap<String, AttrRef>,
    },
}

impl Value {
    pub fn literal(s: impl Into<String>) -> Self {
        Value::Literal(s.into())
    }

    pub fn reference(r: AttrRef) -> Self {
        Value::Ref(r)
    }

    /// Collect every attribute reference nested in this value.
    pub fn collect_refs<'a>(&'a self, out: &mut Vec<&'a AttrRef>) {
        match self {
            Value::Literal(_) | Value::Number(_) | Value::Bool(_) => {}
            Value::List(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Value::Map(entries) => {
                for item in entries.values() {
                    item.collect_refs(out);
                }
            }
            Value::Ref(r) => out.push(r),
            Value::Template { refs, .. } => out.extend(refs.values()),
        }
    }
}

impl From<AttrRef> for Value {
    fn from(r: AttrRef) -> Self {
        Value::Ref(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Literal(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Literal(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

/// Attributes returned by the provisioning collaborator for one resource.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A single declared resource.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub unit: UnitId,
    pub kind: ResourceKind,
    pub name: String,
    pub inputs: BTreeMap<String, Value>,
    attributes: Option<Attributes>,
}

impl ResourceRecord {
    /// Human-readable identity used in logs and errors.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.kind)
    }

    pub fn is_resolved(&self) -> bool {
        self.attributes.is_some()
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_ref()
    }
}

/// Arena of every resource declared during a synthesis pass.
///
/// The model owns declaration order, which the dependency graph uses as the
/// deterministic tie-break for unordered resources.
#[derive(Debug, Default)]
pub struct ResourceModel {
    resources: Vec<ResourceRecord>,
}

impl ResourceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Returns immediately with a handle; attribute
    /// resolution happens later, driven by the synthesis walk.
    pub fn declare(
        &mut self,
        unit: UnitId,
        kind: ResourceKind,
        name: impl Into<String>,
        inputs: BTreeMap<String, Value>,
    ) -> ResourceId {
        let id = ResourceId(self.resources.len());
        let name = name.into();
        debug!("declaring {} '{}' in unit {:?}", kind, name, unit);
        self.resources.push(ResourceRecord {
            id,
            unit,
            kind,
            name,
            inputs,
            attributes: None,
        });
        id
    }

    pub fn get(&self, id: ResourceId) -> SynthResult<&ResourceRecord> {
        self.resources
            .get(id.0)
            .ok_or_else(|| SynthError::UnknownResource(format!("#{}", id.0)))
    }

    /// Lazy reference to a named attribute of `id`.
    pub fn attribute(&self, id: ResourceId, name: impl Into<String>) -> AttrRef {
        AttrRef::new(id, name)
    }

    /// Record the attributes the provisioning collaborator returned.
    pub fn record_attributes(&mut self, id: ResourceId, attributes: Attributes) -> SynthResult<()> {
        let record = self
            .resources
            .get_mut(id.0)
            .ok_or_else(|| SynthError::UnknownResource(format!("#{}", id.0)))?;
        record.attributes = Some(attributes);
        Ok(())
    }

    /// Resolve a reference to its concrete value.
    ///
    /// Fails with `UnresolvedAttribute` if the producer has not been
    /// provisioned yet, or if it resolved without the requested attribute.
    pub fn resolve_ref(&self, r: &AttrRef) -> SynthResult<serde_json::Value> {
        let record = self.get(r.resource)?;
        let attrs = record
            .attributes()
            .ok_or_else(|| SynthError::UnresolvedAttribute {
                resource: record.label(),
                attribute: r.attribute.clone(),
            })?;
        attrs
            .get(&r.attribute)
            .cloned()
            .ok_or_else(|| SynthError::UnresolvedAttribute {
                resource: record.label(),
                attribute: r.attribute.clone(),
            })
    }

    /// Resolve an input value, recursively replacing references with the
    /// attributes their producers computed.
    pub fn resolve_value(&self, value: &Value) -> SynthResult<serde_json::Value> {
        match value {
            Value::Literal(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Number(n) => Ok(serde_json::Value::from(*n)),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::List(items) => {
                let resolved: SynthResult<Vec<_>> =
                    items.iter().map(|v| self.resolve_value(v)).collect();
                Ok(serde_json::Value::Array(resolved?))
            }
            Value::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (key, item) in entries {
                    map.insert(key.clone(), self.resolve_value(item)?);
                }
                Ok(serde_json::Value::Object(map))
            }
            Value::Ref(r) => self.resolve_ref(r),
            Value::Template { template, refs } => {
                let mut rendered = template.clone();
                for (placeholder, r) in refs {
                    let resolved = self.resolve_ref(r)?;
                    let text = match resolved {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    rendered = rendered.replace(&format!("{{{placeholder}}}"), &text);
                }
                Ok(serde_json::Value::String(rendered))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.resources.iter()
    }

    /// Number of resources still awaiting attributes.
    pub fn unresolved_count(&self) -> usize {
        self.resources.iter().filter(|r| !r.is_resolved()).count()
    }
}
