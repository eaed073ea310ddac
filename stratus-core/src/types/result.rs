//! Operation result types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Named outputs reported by the engine, sorted by name.
pub type StackOutputs = BTreeMap<String, serde_json::Value>;

/// Resource change counts as reported by the engine's own summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub unchanged: u64,
}

impl ChangeCounts {
    /// Build counts from an engine `resourceChanges` map
    /// (`{"create": 3, "update": 1, "same": 7, ...}`).
    ///
    /// Replacements count as updates.
    pub fn from_resource_changes(changes: &serde_json::Value) -> Self {
        let get = |key: &str| changes.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
        Self {
            created: get("create"),
            updated: get("update") + get("replace"),
            deleted: get("delete"),
            unchanged: get("same"),
        }
    }

    pub fn total_changes(&self) -> u64 {
        self.created + self.updated + self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }
}

/// Diff computed by a preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub changes: ChangeCounts,
}

/// Output of a completed apply.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentResult {
    pub stack: String,
    pub changes: ChangeCounts,
    pub outputs: StackOutputs,
    pub elapsed: Duration,
}
