//! Deferred identity bindings.
//!
//! A binding grants a principal trust over a cluster. Both sides may be
//! declared in either order, so bindings are recorded as pending at
//! declaration time and applied only after the dependency graph has been
//! walked and every resource's identifying attributes exist. Bindings never
//! contribute graph edges; that is what keeps trust wiring from creating
//! false cycles against resource creation.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SynthError, SynthResult};
use crate::provision::Provisioner;
use crate::resource::{ResourceId, ResourceModel};

/// The trust relationship being granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// Principal becomes a cluster administrator.
    Administrator,
    /// Principal becomes the cluster's masters role.
    MasterRole,
}

impl BindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Administrator => "administrator",
            BindingKind::MasterRole => "master-role",
        }
    }
}

/// Where the principal of a binding comes from.
///
/// Externally supplied identities are looked up, not created, and are
/// immutable: the resolver must never attach or alter policies on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalSource {
    /// An identity resource created within this synthesis pass.
    Created(ResourceId),
    /// An existing role, referenced by ARN.
    ExternalRoleArn(String),
    /// An existing IAM user, referenced by name.
    ExternalUserName(String),
}

impl PrincipalSource {
    pub fn is_external(&self) -> bool {
        !matches!(self, PrincipalSource::Created(_))
    }
}

/// A binding recorded during construction, awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBinding {
    pub cluster: ResourceId,
    pub principal: PrincipalSource,
    pub kind: BindingKind,
}

/// A binding with both sides resolved, ready for the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedBinding {
    pub cluster_name: String,
    pub principal: String,
    pub kind: BindingKind,
    /// Whether the principal is an external, immutable identity.
    pub external: bool,
}

/// Apply every pending binding against the resolved model.
///
/// Must run after the topological walk: a binding whose cluster or created
/// principal never resolved is a fatal construction error, not a retry.
pub async fn apply_bindings(
    pending: &[PendingBinding],
    model: &ResourceModel,
    provisioner: &dyn Provisioner,
) -> SynthResult<Vec<ResolvedBinding>> {
    let mut applied = Vec::with_capacity(pending.len());

    for binding in pending {
        // An id the model has never seen is a missing target, same as a
        // resolved-but-nameless one.
        let cluster =
            model
                .get(binding.cluster)
                .map_err(|_| SynthError::BindingTargetMissing {
                    binding: binding.kind.as_str().to_string(),
                    target: format!("resource #{}", binding.cluster.index()),
                })?;
        let cluster_name = cluster
            .attributes()
            .and_then(|attrs| attrs.get("name"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| SynthError::BindingTargetMissing {
                binding: binding.kind.as_str().to_string(),
                target: cluster.label(),
            })?;

        let (principal, external) = match &binding.principal {
            PrincipalSource::Created(id) => {
                let record = model
                    .get(*id)
                    .map_err(|_| SynthError::BindingTargetMissing {
                        binding: binding.kind.as_str().to_string(),
                        target: format!("resource #{}", id.index()),
                    })?;
                let arn = record
                    .attributes()
                    .and_then(|attrs| attrs.get("arn"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| SynthError::BindingTargetMissing {
                        binding: binding.kind.as_str().to_string(),
                        target: record.label(),
                    })?;
                // A created identity gets the cluster-access policy attached
                // before the trust mapping is wired.
                provisioner
                    .attach_policy(&arn, &format!("cluster-access/{cluster_name}"))
                    .await
                    .map_err(|source| SynthError::Provisioning {
                        resource: record.label(),
                        source,
                    })?;
                (arn, false)
            }
            PrincipalSource::ExternalRoleArn(arn) => (arn.clone(), true),
            PrincipalSource::ExternalUserName(user) => (user.clone(), true),
        };

        let resolved = ResolvedBinding {
            cluster_name: cluster_name.clone(),
            principal,
            kind: binding.kind,
            external,
        };
        debug!(
            "binding {} on cluster '{}' (external: {})",
            resolved.kind.as_str(),
            resolved.cluster_name,
            resolved.external
        );
        provisioner
            .apply_binding(&resolved)
            .await
            .map_err(|source| SynthError::Provisioning {
                resource: cluster.label(),
                source,
            })?;
        applied.push(resolved);
    }

    if !applied.is_empty() {
        info!("applied {} identity binding(s)", applied.len());
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::{ProvisionFailure, ResourceDescriptor};
    use crate::resource::Attributes;

    mockall::mock! {
        Prov {}

        #[async_trait::async_trait]
        impl Provisioner for Prov {
            async fn provision(
                &self,
                descriptor: &ResourceDescriptor,
            ) -> Result<Attributes, ProvisionFailure>;
            async fn apply_binding(
                &self,
                binding: &ResolvedBinding,
            ) -> Result<(), ProvisionFailure>;
            async fn attach_policy(&self, identity: &str, policy: &str)
                -> Result<(), ProvisionFailure>;
        }
    }

    #[test]
    fn test_external_sources_are_flagged() {
        assert!(PrincipalSource::ExternalRoleArn("arn:aws:iam::1:role/x".into()).is_external());
        assert!(PrincipalSource::ExternalUserName("admin".into()).is_external());
        assert!(!PrincipalSource::Created(crate::resource::ResourceId(0)).is_external());
    }

    #[tokio::test]
    async fn test_binding_against_unknown_cluster_is_a_missing_target() {
        let model = ResourceModel::new();
        let pending = vec![PendingBinding {
            cluster: ResourceId(7),
            principal: PrincipalSource::ExternalRoleArn("arn:aws:iam::1:role/x".into()),
            kind: BindingKind::Administrator,
        }];

        let mut mock = MockProv::new();
        mock.expect_apply_binding().times(0);
        mock.expect_attach_policy().times(0);

        let err = apply_bindings(&pending, &model, &mock).await.unwrap_err();
        assert!(matches!(err, SynthError::BindingTargetMissing { .. }));
    }

    #[tokio::test]
    async fn test_binding_with_unknown_created_principal_is_a_missing_target() {
        let units = crate::stack::UnitTree::new("platform");
        let mut model = ResourceModel::new();
        let cluster = model.declare(
            units.root(),
            crate::resource::ResourceKind::Cluster,
            "workloads",
            std::collections::BTreeMap::new(),
        );
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), serde_json::json!("workloads"));
        model.record_attributes(cluster, attrs).unwrap();

        let pending = vec![PendingBinding {
            cluster,
            principal: PrincipalSource::Created(ResourceId(99)),
            kind: BindingKind::MasterRole,
        }];

        let mut mock = MockProv::new();
        mock.expect_apply_binding().times(0);
        mock.expect_attach_policy().times(0);

        let err = apply_bindings(&pending, &model, &mock).await.unwrap_err();
        assert!(matches!(err, SynthError::BindingTargetMissing { .. }));
    }
}
