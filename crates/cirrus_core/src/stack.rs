//! Composition units ("stacks").
//!
//! Units form a tree rooted at the deployment. A unit's resources may
//! reference resources of ancestor units; siblings and descendants are
//! opaque except through declared outputs. There is no ambient "current
//! stack": every declaring call names its owning unit explicitly.

use serde::{Deserialize, Serialize};

/// Opaque handle to a composition unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub(crate) usize);

#[derive(Debug, Clone)]
struct UnitRecord {
    name: String,
    parent: Option<UnitId>,
}

/// The tree of composition units for one synthesis pass.
#[derive(Debug)]
pub struct UnitTree {
    units: Vec<UnitRecord>,
}

impl UnitTree {
    /// Create a tree with a single root unit.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            units: vec![UnitRecord {
                name: root_name.into(),
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> UnitId {
        UnitId(0)
    }

    /// Create a child unit under `parent`.
    pub fn child(&mut self, parent: UnitId, name: impl Into<String>) -> UnitId {
        let id = UnitId(self.units.len());
        self.units.push(UnitRecord {
            name: name.into(),
            parent: Some(parent),
        });
        id
    }

    pub fn name(&self, unit: UnitId) -> &str {
        &self.units[unit.0].name
    }

    pub fn parent(&self, unit: UnitId) -> Option<UnitId> {
        self.units[unit.0].parent
    }

    /// Slash-separated path from the root, e.g. `payment-platform/cache`.
    ///
    /// Paths are the namespace for output keys, so sibling units with
    /// same-named outputs can never collide.
    pub fn path(&self, unit: UnitId) -> String {
        let mut segments = vec![self.units[unit.0].name.as_str()];
        let mut cursor = self.units[unit.0].parent;
        while let Some(parent) = cursor {
            segments.push(self.units[parent.0].name.as_str());
            cursor = self.units[parent.0].parent;
        }
        segments.reverse();
        segments.join("/")
    }

    /// Whether `ancestor` is `unit` itself or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: UnitId, unit: UnitId) -> bool {
        let mut cursor = Some(unit);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.units[current.0].parent;
        }
        false
    }

    /// Whether `child` is a direct child of `parent`.
    pub fn is_child_of(&self, child: UnitId, parent: UnitId) -> bool {
        self.units[child.0].parent == Some(parent)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
