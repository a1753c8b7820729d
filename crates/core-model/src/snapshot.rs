use crate::constraint::ConstraintValidation;
use crate::optimize::OptimizationResult;
use crate::stats::GcodeStats;
use crate::tool::ToolId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier for a timeline snapshot (`s0`, `s1`, …).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(n: u64) -> Self {
        Self(format!("s{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part of the id; used by the manager to seed its counter
    /// after an import.
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix('s')?.parse().ok()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a merge did, recorded alongside the snapshot it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeInfo {
    pub target: ToolId,
    pub sources: Vec<ToolId>,
    /// Slots freed relative to the pre-merge optimization.
    pub freed_slots: Vec<ToolId>,
    pub description: String,
}

/// Immutable record of stats + optimization at one point in the timeline.
///
/// A snapshot exclusively owns its cloned stats and optimization; nothing
/// outside the timeline mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub id: SnapshotId,
    /// Milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    pub stats: GcodeStats,
    pub optimization: OptimizationResult,
    pub validation: ConstraintValidation,
    #[serde(default)]
    pub merge: Option<MergeInfo>,
    #[serde(default)]
    pub parent: Option<SnapshotId>,
    pub branch: String,
    pub violation_count: u32,
    pub color_count: u32,
}

/// The serializable timeline document: ordered snapshots, a cursor, and a
/// named branch map.
///
/// Invariants: `snapshots` is non-empty once seeded, `snapshots[0]` is the
/// initial state, `current < snapshots.len()`, and every id in every branch
/// list names an element of `snapshots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeTimeline {
    pub snapshots: Vec<StateSnapshot>,
    pub current: usize,
    pub branches: BTreeMap<String, Vec<SnapshotId>>,
    pub current_branch: String,
}

impl MergeTimeline {
    pub const MAIN_BRANCH: &'static str = "main";

    pub fn snapshot(&self, id: &SnapshotId) -> Option<&StateSnapshot> {
        self.snapshots.iter().find(|s| &s.id == id)
    }

    pub fn current_snapshot(&self) -> Option<&StateSnapshot> {
        self.snapshots.get(self.current)
    }

    /// Panics when a timeline invariant is broken; test-path helper.
    pub fn assert_invariants(&self) {
        assert!(
            self.snapshots.is_empty() || self.current < self.snapshots.len(),
            "cursor out of range"
        );
        for (branch, ids) in &self.branches {
            for id in ids {
                assert!(
                    self.snapshot(id).is_some(),
                    "branch {branch} references unknown snapshot {id}"
                );
            }
        }
        assert!(
            self.branches.contains_key(&self.current_branch),
            "current branch missing from branch map"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_id_sequence_round_trips() {
        let id = SnapshotId::new(42);
        assert_eq!(id.as_str(), "s42");
        assert_eq!(id.sequence(), Some(42));
    }
}
