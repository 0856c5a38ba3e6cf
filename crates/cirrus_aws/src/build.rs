//! Build pipeline project.
//!
//! The synthesis core only needs to know the project exists and exposes a
//! project identifier; compiling, containerizing, and pushing images happen
//! in the build collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cirrus_core::{App, AttrRef, ResourceId, ResourceKind, UnitId, Value};

use crate::error::AwsResult;
use crate::iam::Role;
use crate::registry::Registry;

/// Declarative description of a build project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildProjectSpec {
    pub name: String,
    /// Source repository the external hook triggers from.
    pub source_repository: String,
}

impl BuildProjectSpec {
    pub fn new(name: impl Into<String>, source_repository: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_repository: source_repository.into(),
        }
    }

    /// Declare the project with push/pull rights on `registry` via `role`.
    pub fn instantiate(
        &self,
        app: &mut App,
        unit: UnitId,
        registry: &Registry,
        role: &Role,
    ) -> AwsResult<BuildProject> {
        let mut inputs = BTreeMap::new();
        inputs.insert(
            "source_repository".to_string(),
            Value::literal(self.source_repository.as_str()),
        );
        inputs.insert("image_uri".to_string(), Value::Ref(registry.uri_ref()));
        inputs.insert("role_arn".to_string(), Value::Ref(role.arn_ref()));

        let id = app.declare(unit, ResourceKind::BuildProject, self.name.as_str(), inputs)?;
        Ok(BuildProject { id })
    }
}

/// Handle to a declared build project.
#[derive(Debug, Clone, Copy)]
pub struct BuildProject {
    pub id: ResourceId,
}

impl BuildProject {
    pub fn project_id_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "project_id")
    }
}
