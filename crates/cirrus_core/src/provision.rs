//! Boundary to the provisioning collaborator.
//!
//! The driver hands the collaborator fully resolved descriptors, one at a
//! time, in topological order. The collaborator either returns the complete
//! attribute set for the resource or a failure; partial results do not
//! exist at this boundary, and failures are never retried here.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binding::ResolvedBinding;
use crate::resource::{Attributes, ResourceKind};

/// A failure reported by the provisioning collaborator.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProvisionFailure {
    pub message: String,
}

impl ProvisionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A fully specified resource: kind plus resolved literal inputs only.
///
/// By the time a descriptor is built, every reference among the resource's
/// declared inputs has been replaced by its producer's computed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: String,
    pub unit_path: String,
    pub inputs: BTreeMap<String, serde_json::Value>,
}

/// The external collaborator that actually creates resources.
///
/// Treated as synchronous per resource: each call is awaited to completion
/// before the next descriptor is built.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create one resource and return its computed attributes.
    async fn provision(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Attributes, ProvisionFailure>;

    /// Wire one resolved trust relationship.
    async fn apply_binding(&self, binding: &ResolvedBinding) -> Result<(), ProvisionFailure>;

    /// Mutate an identity created in this pass by attaching a policy.
    ///
    /// Never called for externally referenced identities; those are looked
    /// up as-is and must not be altered.
    async fn attach_policy(&self, identity: &str, policy: &str) -> Result<(), ProvisionFailure>;
}
