//! Container-orchestration cluster.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cirrus_core::{App, AttrRef, PrincipalSource, ResourceId, ResourceKind, UnitId, Value};

use crate::error::AwsResult;
use crate::iam::Role;

/// Declarative description of a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub version: String,
    pub default_capacity: u32,
}

impl ClusterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.19".to_string(),
            default_capacity: 2,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_default_capacity(mut self, capacity: u32) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Declare the cluster. The network is handed in explicitly by whoever
    /// owns it; the cluster's unit never reaches into a parent for it.
    pub fn instantiate(
        &self,
        app: &mut App,
        unit: UnitId,
        vpc_id: Value,
        masters_role: &Role,
    ) -> AwsResult<Cluster> {
        let mut inputs = BTreeMap::new();
        inputs.insert("version".to_string(), Value::literal(self.version.as_str()));
        inputs.insert(
            "default_capacity".to_string(),
            Value::Number(i64::from(self.default_capacity)),
        );
        inputs.insert("vpc_id".to_string(), vpc_id);
        inputs.insert(
            "masters_role_arn".to_string(),
            Value::Ref(masters_role.arn_ref()),
        );

        let id = app.declare(unit, ResourceKind::Cluster, self.name.as_str(), inputs)?;
        Ok(Cluster { id })
    }
}

/// Handle to a declared cluster.
#[derive(Debug, Clone, Copy)]
pub struct Cluster {
    pub id: ResourceId,
}

impl Cluster {
    pub fn name_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "name")
    }

    pub fn arn_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "arn")
    }

    pub fn endpoint_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "endpoint")
    }

    /// OIDC issuer URL recorded when the cluster resolves.
    pub fn oidc_issuer_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "oidc_issuer_url")
    }

    /// Bind an existing role, by ARN, as a cluster administrator.
    ///
    /// The role is looked up, not created: it stays immutable and no
    /// policy is ever attached to it.
    pub fn grant_administrator_role(&self, app: &mut App, role_arn: impl Into<String>) {
        app.bind_administrator(self.id, PrincipalSource::ExternalRoleArn(role_arn.into()));
    }

    /// Bind an existing IAM user, by name, as a cluster administrator.
    pub fn grant_administrator_user(&self, app: &mut App, user_name: impl Into<String>) {
        app.bind_administrator(self.id, PrincipalSource::ExternalUserName(user_name.into()));
    }

    /// Bind a role created in this pass as the cluster's masters role.
    ///
    /// Deferred: legal to call before either side has resolved.
    pub fn grant_master_role(&self, app: &mut App, role: &Role) {
        app.bind_master_role(self.id, role.id);
    }
}
