//! Container image registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cirrus_core::{App, AttrRef, ResourceId, ResourceKind, UnitId, Value};

use crate::error::AwsResult;

/// Declarative description of a container registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySpec {
    pub repository_name: String,
    /// Expire untagged images older than this many days.
    pub expire_images_after_days: Option<u32>,
    /// Tear the repository down with the stack instead of orphaning it.
    pub destroy_on_removal: bool,
}

impl RegistrySpec {
    pub fn new(repository_name: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
            expire_images_after_days: Some(30),
            destroy_on_removal: true,
        }
    }

    pub fn with_image_expiry_days(mut self, days: Option<u32>) -> Self {
        self.expire_images_after_days = days;
        self
    }

    pub fn with_destroy_on_removal(mut self, destroy: bool) -> Self {
        self.destroy_on_removal = destroy;
        self
    }

    pub fn instantiate(&self, app: &mut App, unit: UnitId) -> AwsResult<Registry> {
        let mut inputs = BTreeMap::new();
        inputs.insert(
            "repository_name".to_string(),
            Value::literal(self.repository_name.as_str()),
        );
        inputs.insert(
            "destroy_on_removal".to_string(),
            Value::Bool(self.destroy_on_removal),
        );
        if let Some(days) = self.expire_images_after_days {
            inputs.insert(
                "expire_images_after_days".to_string(),
                Value::Number(i64::from(days)),
            );
        }

        let id = app.declare(unit, ResourceKind::Registry, "registry", inputs)?;
        Ok(Registry { id })
    }
}

/// Handle to a declared registry.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    pub id: ResourceId,
}

impl Registry {
    pub fn name_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "name")
    }

    pub fn arn_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "arn")
    }

    /// Fully qualified repository URI, e.g. for `docker push`.
    pub fn uri_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "uri")
    }
}
