//! Deterministic in-memory provisioning collaborator.
//!
//! Stands in for the real cloud boundary so a full synthesis pass can run
//! in tests and in the CLI. Attribute values are derived from the
//! descriptor alone, so two passes over the same input produce identical
//! results.

use async_trait::async_trait;
use tracing::debug;

use cirrus_core::{
    Attributes, ProvisionFailure, Provisioner, ResolvedBinding, ResourceDescriptor, ResourceKind,
};

/// Simulated provisioner with a fixed account and region identity.
#[derive(Debug, Clone)]
pub struct SimProvisioner {
    pub account: String,
    pub region: String,
}

impl Default for SimProvisioner {
    fn default() -> Self {
        Self {
            account: "111111111111".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

impl SimProvisioner {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:aws:{}:{}:{}:{}",
            service, self.region, self.account, resource
        )
    }

    /// Subnet ids for one visibility class, in the declared AZ order.
    fn subnet_ids(
        descriptor: &ResourceDescriptor,
        key: &str,
        visibility: &str,
    ) -> serde_json::Value {
        let subnets = descriptor
            .inputs
            .get(key)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let ids: Vec<serde_json::Value> = subnets
            .iter()
            .map(|entry| {
                let az = entry
                    .get("availability_zone")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                serde_json::json!(format!("subnet-{}-{}-{}", visibility, descriptor.name, az))
            })
            .collect();
        serde_json::Value::Array(ids)
    }

    fn input_str<'a>(descriptor: &'a ResourceDescriptor, key: &str) -> &'a str {
        descriptor
            .inputs
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

#[async_trait]
impl Provisioner for SimProvisioner {
    async fn provision(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Attributes, ProvisionFailure> {
        debug!("simulating {} '{}'", descriptor.kind, descriptor.name);
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), serde_json::json!(descriptor.name.clone()));

        match descriptor.kind {
            ResourceKind::Network => {
                attrs.insert(
                    "vpc_id".into(),
                    serde_json::json!(format!("vpc-{}", descriptor.name)),
                );
                attrs.insert(
                    "cidr".into(),
                    serde_json::json!(Self::input_str(descriptor, "cidr")),
                );
                attrs.insert(
                    "public_subnet_ids".into(),
                    Self::subnet_ids(descriptor, "public_subnets", "public"),
                );
                attrs.insert(
                    "private_subnet_ids".into(),
                    Self::subnet_ids(descriptor, "private_subnets", "private"),
                );
            }
            ResourceKind::SubnetGroup => {
                // Subnet ids must be fully enumerated by the time the group
                // is provisioned; an empty collection means the ordering
                // contract was broken upstream.
                let subnet_ids = descriptor
                    .inputs
                    .get("subnet_ids")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default();
                if subnet_ids.is_empty() {
                    return Err(ProvisionFailure::new(format!(
                        "subnet group '{}' received no subnet ids",
                        descriptor.name
                    )));
                }
                attrs.insert("subnet_ids".into(), serde_json::Value::Array(subnet_ids));
            }
            ResourceKind::SecurityRules => {
                attrs.insert(
                    "security_group_id".into(),
                    serde_json::json!(format!("sg-{}", descriptor.name)),
                );
                if let Some(ingress) = descriptor.inputs.get("ingress") {
                    attrs.insert("ingress".into(), ingress.clone());
                }
            }
            ResourceKind::Registry => {
                let repository = Self::input_str(descriptor, "repository_name").to_string();
                attrs.insert("name".into(), serde_json::json!(repository.clone()));
                attrs.insert(
                    "arn".into(),
                    serde_json::json!(self.arn("ecr", &format!("repository/{repository}"))),
                );
                attrs.insert(
                    "uri".into(),
                    serde_json::json!(format!(
                        "{}.dkr.ecr.{}.amazonaws.com/{}",
                        self.account, self.region, repository
                    )),
                );
            }
            ResourceKind::CacheReplicationGroup => {
                attrs.insert(
                    "primary_endpoint_address".into(),
                    serde_json::json!(format!(
                        "{}.0001.{}.cache.amazonaws.com",
                        descriptor.name, self.region
                    )),
                );
                attrs.insert("primary_endpoint_port".into(), serde_json::json!("6379"));
            }
            ResourceKind::Cluster => {
                attrs.insert(
                    "arn".into(),
                    serde_json::json!(self.arn("eks", &format!("cluster/{}", descriptor.name))),
                );
                attrs.insert(
                    "endpoint".into(),
                    serde_json::json!(format!(
                        "https://{}.eks.{}.amazonaws.com",
                        descriptor.name, self.region
                    )),
                );
                attrs.insert(
                    "oidc_issuer_url".into(),
                    serde_json::json!(format!(
                        "https://oidc.eks.{}.amazonaws.com/id/{}",
                        self.region, descriptor.name
                    )),
                );
            }
            ResourceKind::IdentityRole => {
                attrs.insert(
                    "arn".into(),
                    serde_json::json!(format!(
                        "arn:aws:iam::{}:role/{}",
                        self.account, descriptor.name
                    )),
                );
            }
            ResourceKind::BuildProject => {
                attrs.insert(
                    "project_id".into(),
                    serde_json::json!(format!("{}-project", descriptor.name)),
                );
            }
            ResourceKind::StorageBucket => {
                attrs.insert(
                    "arn".into(),
                    serde_json::json!(format!("arn:aws:s3:::{}", descriptor.name)),
                );
            }
        }

        Ok(attrs)
    }

    async fn apply_binding(&self, binding: &ResolvedBinding) -> Result<(), ProvisionFailure> {
        debug!(
            "simulating {} binding of '{}' on cluster '{}'",
            binding.kind.as_str(),
            binding.principal,
            binding.cluster_name
        );
        Ok(())
    }

    async fn attach_policy(&self, identity: &str, policy: &str) -> Result<(), ProvisionFailure> {
        debug!("simulating policy '{}' on '{}'", policy, identity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_registry_attributes_are_derived_from_inputs() {
        let sim = SimProvisioner::default();
        let mut inputs = BTreeMap::new();
        inputs.insert(
            "repository_name".to_string(),
            serde_json::json!("payment-web"),
        );
        let descriptor = ResourceDescriptor {
            kind: ResourceKind::Registry,
            name: "registry".to_string(),
            unit_path: "platform".to_string(),
            inputs,
        };

        let attrs = sim.provision(&descriptor).await.unwrap();
        assert_eq!(attrs["name"], serde_json::json!("payment-web"));
        assert_eq!(
            attrs["uri"],
            serde_json::json!("111111111111.dkr.ecr.us-east-1.amazonaws.com/payment-web")
        );
    }

    #[tokio::test]
    async fn test_empty_subnet_group_is_a_provisioning_failure() {
        let sim = SimProvisioner::default();
        let mut inputs = BTreeMap::new();
        inputs.insert("subnet_ids".to_string(), serde_json::json!([]));
        let descriptor = ResourceDescriptor {
            kind: ResourceKind::SubnetGroup,
            name: "cache-subnets".to_string(),
            unit_path: "platform/cache".to_string(),
            inputs,
        };

        assert!(sim.provision(&descriptor).await.is_err());
    }
}
