//! Output registry.
//!
//! Units export name/value pairs; the registry resolves them to concrete
//! strings in one all-or-nothing pass once every resource has resolved.
//! Keys are path-qualified (`unit/path/name`), so sibling units may export
//! the same name without collision.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{SynthError, SynthResult};
use crate::resource::{AttrRef, ResourceModel, Value};
use crate::stack::{UnitId, UnitTree};

#[derive(Debug, Clone)]
struct OutputEntry {
    unit: UnitId,
    name: String,
    value: Value,
}

/// Collects exported outputs and resolves them at synthesis completion.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    entries: Vec<OutputEntry>,
    finalized: Option<BTreeMap<String, String>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an output of `unit`. Re-registering the same name replaces
    /// the previous value.
    pub fn register(&mut self, unit: UnitId, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.unit == unit && e.name == name)
        {
            warn!("replacing output '{}' of unit {:?}", name, unit);
            existing.value = value;
            return;
        }
        debug!("registered output '{}' of unit {:?}", name, unit);
        self.entries.push(OutputEntry { unit, name, value });
    }

    /// The declared (unresolved) value of an export, for parent consumption.
    pub fn exported(&self, unit: UnitId, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.unit == unit && e.name == name)
            .map(|e| &e.value)
    }

    /// Whether `unit` exports an output that is exactly a reference to
    /// `(resource, attribute)`. This is the gate that lets a parent consume
    /// a child's resource without reaching into the child's internals.
    pub fn is_exported_ref(&self, unit: UnitId, r: &AttrRef) -> bool {
        self.entries.iter().any(|e| {
            e.unit == unit
                && match &e.value {
                    Value::Ref(exported) => exported == r,
                    _ => false,
                }
        })
    }

    /// Resolve every registered output against the completed model.
    ///
    /// Fails with `IncompleteGraph` if any resource is still unresolved;
    /// nothing is published in that case.
    pub fn finalize(&mut self, model: &ResourceModel, units: &UnitTree) -> SynthResult<()> {
        let missing = model.unresolved_count();
        if missing > 0 {
            return Err(SynthError::IncompleteGraph { missing });
        }

        let mut resolved = BTreeMap::new();
        for entry in &self.entries {
            let value = model.resolve_value(&entry.value)?;
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            let key = format!("{}/{}", units.path(entry.unit), entry.name);
            resolved.insert(key, text);
        }
        self.finalized = Some(resolved);
        Ok(())
    }

    /// One resolved output. Fails with `NotYetResolved` before `finalize`.
    pub fn output(&self, unit: UnitId, name: &str, units: &UnitTree) -> SynthResult<String> {
        let finalized = self
            .finalized
            .as_ref()
            .ok_or_else(|| SynthError::NotYetResolved {
                unit: units.path(unit),
                name: name.to_string(),
            })?;
        let key = format!("{}/{}", units.path(unit), name);
        finalized
            .get(&key)
            .cloned()
            .ok_or_else(|| SynthError::UnknownOutput {
                unit: units.path(unit),
                name: name.to_string(),
            })
    }

    /// The full finalized map, if `finalize` has run.
    pub fn finalized(&self) -> Option<&BTreeMap<String, String>> {
        self.finalized.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
