//! Storage bucket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cirrus_core::{App, AttrRef, ResourceId, ResourceKind, UnitId, Value};

use crate::error::AwsResult;

/// Declarative description of a storage bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    pub versioned: bool,
}

impl BucketSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versioned: false,
        }
    }

    pub fn with_versioning(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    pub fn instantiate(&self, app: &mut App, unit: UnitId) -> AwsResult<Bucket> {
        let mut inputs = BTreeMap::new();
        inputs.insert("versioned".to_string(), Value::Bool(self.versioned));

        let id = app.declare(unit, ResourceKind::StorageBucket, self.name.as_str(), inputs)?;
        Ok(Bucket { id })
    }
}

/// Handle to a declared bucket.
#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    pub id: ResourceId,
}

impl Bucket {
    pub fn name_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "name")
    }

    pub fn arn_ref(&self) -> AttrRef {
        AttrRef::new(self.id, "arn")
    }
}
