//! Identity roles and trust principals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cirrus_core::{App, AttrRef, ResourceId, ResourceKind, UnitId, Value};

use crate::error::AwsResult;

/// Who may assume a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPrincipal {
    /// A service principal, e.g. `codebuild.amazonaws.com`.
    Service(String),
    /// The root of a specific account.
    Account(String),
    /// The root of the current account.
    AccountRoot,
}

impl TrustPrincipal {
    fn as_input(&self) -> String {
        match self {
            TrustPrincipal::Service(service) => format!("service:{service}"),
            TrustPrincipal::Account(account) => format!("account:{account}"),
            TrustPrincipal::AccountRoot => "account-root".to_string(),
        }
    }
}

/// One inline policy statement. Resources may be literals or deferred
/// references to computed ARNs.
#[derive(Debug, Clone)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn new(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
        }
    }

    fn as_input(&self) -> Value {
        let mut entry = BTreeMap::new();
        entry.insert(
            "actions".to_string(),
            Value::List(
                self.actions
                    .iter()
                    .map(|a| Value::literal(a.as_str()))
                    .collect(),
            ),
        );
        entry.insert("resources".to_string(), Value::List(self.resources.clone()));
        Value::Map(entry)
    }
}

/// Declarative description of an identity role created in this pass.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub name: String,
    pub assumed_by: TrustPrincipal,
    managed_policies: Vec<String>,
    statements: Vec<PolicyStatement>,
}

impl RoleSpec {
    pub fn new(name: impl Into<String>, assumed_by: TrustPrincipal) -> Self {
        Self {
            name: name.into(),
            assumed_by,
            managed_policies: Vec::new(),
            statements: Vec::new(),
        }
    }

    pub fn with_managed_policy(mut self, policy: impl Into<String>) -> Self {
        self.managed_policies.push(policy.into());
        self
    }

    /// Grant `actions` over `resources` via an inline statement.
    pub fn allow(mut self, actions: &[&str], resources: Vec<Value>) -> Self {
        self.statements.push(PolicyStatement::new(actions, resources));
        self
    }

    pub fn instantiate(&self, app: &mut App, unit: UnitId) -> AwsResult<Role> {
        let mut inputs = BTreeMap::new();
        inputs.insert(
            "assumed_by".to_string(),
            Value::literal(self.assumed_by.as_input()),
        );
        inputs.insert(
            "managed_policies".to_string(),
            Value::List(
                self.managed_policies
                    .iter()
                    .map(|p| Value::literal(p.as_str()))
                    .collect(),
            ),
        );
        inputs.insert(
            "statements".to_string(),
            Value::List(self.statements.iter().map(|s| s.as_input()).collect()),
        );

        let id = app.declare(unit, ResourceKind::IdentityRole, self.name.as_str(), inputs)?;
        Ok(Role { id })
    }
}

/// Handle to a role created in this synthesis pass.
#[derive(Debug, Clone, Copy)]
pub struct Role {
    pub id: ResourceId,
}

impl Role {
    pub fn arn_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "arn")
    }

    pub fn name_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_principal_inputs() {
        assert_eq!(
            TrustPrincipal::Service("codebuild.amazonaws.com".into()).as_input(),
            "service:codebuild.amazonaws.com"
        );
        assert_eq!(
            TrustPrincipal::Account("111122223333".into()).as_input(),
            "account:111122223333"
        );
        assert_eq!(TrustPrincipal::AccountRoot.as_input(), "account-root");
    }

    #[test]
    fn test_role_statement_references_create_edges() {
        let mut app = App::new("platform");
        let root = app.root();
        let registry = app
            .declare(root, ResourceKind::Registry, "images", BTreeMap::new())
            .unwrap();

        let arn = app.attribute(registry, "arn");
        RoleSpec::new(
            "build-role",
            TrustPrincipal::Service("codebuild.amazonaws.com".into()),
        )
        .with_managed_policy("AWSLambda_FullAccess")
        .allow(&["ecr:*"], vec![Value::Ref(arn)])
        .instantiate(&mut app, root)
        .unwrap();

        // The role must be created after the registry it is scoped to.
        let order = app.creation_order().unwrap();
        assert_eq!(order, vec!["platform/images", "platform/build-role"]);
    }
}
