//! Snapshot timeline: undo/redo/branching history over merge states.
//!
//! The manager owns a [`MergeTimeline`] document (ordered snapshots, a
//! cursor, named branches) and admits actions by state: navigation that
//! the cursor position disallows returns `None` instead of erroring.
//! Persistence goes through an injected [`TimelineStore`] behind a
//! debounced writer thread; store failures degrade to a minimal in-memory
//! summary and never escape a manager method.
//!
//! Invariants (checked by `MergeTimeline::assert_invariants` in tests):
//! * `snapshots[0]` is the seed of the retained window;
//! * `current` indexes into `snapshots`;
//! * every id in every branch list names a retained snapshot;
//! * the current branch always exists in the branch map.

use core_model::{
    ConstraintValidation, GcodeStats, MergeInfo, MergeTimeline, OptimizationResult, SnapshotId,
    StateSnapshot,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

mod saver;
mod store;

pub use saver::{DebouncedSaver, SaveStatus, SaveSummary};
pub use store::{FailingStore, JsonFileStore, MemoryStore, StorageError, TimelineStore};

pub const DEFAULT_TIMELINE_KEY: &str = "spoolswap-timeline";
pub const DEFAULT_MAX_HISTORY: usize = 50;
pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum TimelineCodecError {
    #[error("timeline is empty")]
    Empty,
    #[error("timeline serialization failed")]
    Json(#[from] serde_json::Error),
}

/// Pre-branching persisted shape; migrated on import.
#[derive(Deserialize)]
struct LegacyTimeline {
    snapshots: Vec<StateSnapshot>,
    #[serde(alias = "currentIndex")]
    current: usize,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct TimelineManager {
    timeline: Option<MergeTimeline>,
    max_history: usize,
    next_id: u64,
    store: Option<Arc<dyn TimelineStore>>,
    key: String,
    saver: Option<DebouncedSaver>,
}

impl Default for TimelineManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl TimelineManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            timeline: None,
            max_history: max_history.max(1),
            next_id: 0,
            store: None,
            key: DEFAULT_TIMELINE_KEY.to_string(),
            saver: None,
        }
    }

    /// Attach a persistence store; saves are debounced by `debounce`.
    pub fn with_store(
        mut self,
        store: Arc<dyn TimelineStore>,
        key: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        self.key = key.into();
        self.saver = Some(DebouncedSaver::spawn(
            store.clone(),
            self.key.clone(),
            debounce,
        ));
        self.store = Some(store);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_none()
    }

    pub fn timeline(&self) -> Option<&MergeTimeline> {
        self.timeline.as_ref()
    }

    pub fn current(&self) -> Option<&StateSnapshot> {
        let tl = self.timeline.as_ref()?;
        tl.snapshots.get(tl.current)
    }

    pub fn save_status(&self) -> Option<SaveStatus> {
        self.saver.as_ref().map(|s| s.status())
    }

    /// Seed the main branch. Replaces any existing timeline.
    pub fn add_initial(
        &mut self,
        stats: GcodeStats,
        optimization: OptimizationResult,
        validation: ConstraintValidation,
    ) -> SnapshotId {
        let id = self.fresh_id();
        let snapshot = self.build_snapshot(
            id.clone(),
            stats,
            optimization,
            validation,
            None,
            None,
            MergeTimeline::MAIN_BRANCH.to_string(),
        );
        let mut branches = std::collections::BTreeMap::new();
        branches.insert(MergeTimeline::MAIN_BRANCH.to_string(), vec![id.clone()]);
        self.timeline = Some(MergeTimeline {
            snapshots: vec![snapshot],
            current: 0,
            branches,
            current_branch: MergeTimeline::MAIN_BRANCH.to_string(),
        });
        info!(target: "timeline", id = %id, "timeline_seeded");
        self.request_save();
        id
    }

    /// Append a merge snapshot at the cursor. History after the cursor on
    /// the current branch is truncated first (linear history at the
    /// leaf); truncated snapshots survive only while another branch still
    /// references them. Returns `None` when the timeline is unseeded.
    pub fn add_merge(
        &mut self,
        stats: GcodeStats,
        optimization: OptimizationResult,
        validation: ConstraintValidation,
        merge: MergeInfo,
    ) -> Option<SnapshotId> {
        if self.timeline.is_none() {
            return None;
        }
        let id = self.fresh_id();
        let (current_id, branch) = {
            let tl = self.timeline.as_ref().expect("checked above");
            (
                tl.snapshots[tl.current].id.clone(),
                tl.current_branch.clone(),
            )
        };
        self.truncate_after_cursor();

        let snapshot = self.build_snapshot(
            id.clone(),
            stats,
            optimization,
            validation,
            Some(merge),
            Some(current_id),
            branch.clone(),
        );
        let tl = self.timeline.as_mut().expect("checked above");
        tl.snapshots.push(snapshot);
        tl.branches
            .get_mut(&branch)
            .expect("current branch exists")
            .push(id.clone());
        tl.current = tl.snapshots.len() - 1;
        debug!(target: "timeline", id = %id, branch = %branch, "merge_snapshot_added");

        self.evict_overflow();
        self.request_save();
        Some(id)
    }

    /// Step the cursor back along the current branch.
    pub fn undo(&mut self) -> Option<&StateSnapshot> {
        let index = {
            let tl = self.timeline.as_ref()?;
            let ids = tl.branches.get(&tl.current_branch)?;
            let pos = ids
                .iter()
                .position(|id| *id == tl.snapshots[tl.current].id)?;
            if pos == 0 {
                return None;
            }
            tl.index_of(&ids[pos - 1])?
        };
        self.move_cursor(index)
    }

    /// Step the cursor forward along the current branch.
    pub fn redo(&mut self) -> Option<&StateSnapshot> {
        let index = {
            let tl = self.timeline.as_ref()?;
            let ids = tl.branches.get(&tl.current_branch)?;
            let pos = ids
                .iter()
                .position(|id| *id == tl.snapshots[tl.current].id)?;
            if pos + 1 >= ids.len() {
                return None;
            }
            tl.index_of(&ids[pos + 1])?
        };
        self.move_cursor(index)
    }

    /// Jump anywhere in the timeline; the branch follows the target (the
    /// current branch wins when it contains the id).
    pub fn jump_to(&mut self, id: &SnapshotId) -> Option<&StateSnapshot> {
        let (index, branch) = {
            let tl = self.timeline.as_ref()?;
            let index = tl.index_of(id)?;
            let branch = if tl.branches[&tl.current_branch].contains(id) {
                tl.current_branch.clone()
            } else {
                tl.branches
                    .iter()
                    .find(|(_, ids)| ids.contains(id))
                    .map(|(name, _)| name.clone())?
            };
            (index, branch)
        };
        let tl = self.timeline.as_mut()?;
        tl.current_branch = branch;
        tl.current = index;
        self.request_save();
        self.current()
    }

    /// Return the cursor to the start of the current branch.
    pub fn reset(&mut self) -> Option<&StateSnapshot> {
        let index = {
            let tl = self.timeline.as_ref()?;
            let ids = tl.branches.get(&tl.current_branch)?;
            tl.index_of(ids.first()?)?
        };
        self.move_cursor(index)
    }

    /// Fork at the cursor. Fails (None) when the name is taken or the
    /// timeline is unseeded.
    pub fn create_branch(&mut self, name: &str) -> Option<SnapshotId> {
        let tl = self.timeline.as_mut()?;
        if tl.branches.contains_key(name) {
            return None;
        }
        let current_id = tl.snapshots[tl.current].id.clone();
        let source = tl.branches.get(&tl.current_branch)?;
        let pos = source.iter().position(|id| *id == current_id)?;
        let forked: Vec<SnapshotId> = source[..=pos].to_vec();
        tl.branches.insert(name.to_string(), forked);
        tl.current_branch = name.to_string();
        info!(target: "timeline", branch = name, fork_at = %current_id, "branch_created");
        self.request_save();
        Some(current_id)
    }

    /// Move to another branch's tip.
    pub fn switch_branch(&mut self, name: &str) -> Option<&StateSnapshot> {
        let index = {
            let tl = self.timeline.as_ref()?;
            let ids = tl.branches.get(name)?;
            tl.index_of(ids.last()?)?
        };
        let tl = self.timeline.as_mut()?;
        tl.current_branch = name.to_string();
        tl.current = index;
        self.request_save();
        self.current()
    }

    pub fn export(&self) -> Result<String, TimelineCodecError> {
        let tl = self.timeline.as_ref().ok_or(TimelineCodecError::Empty)?;
        Ok(serde_json::to_string(tl)?)
    }

    /// Accepts both the current document shape and the legacy
    /// branch-less layout, which is migrated onto a single main branch.
    pub fn import(&mut self, json: &str) -> Result<(), TimelineCodecError> {
        let timeline = match serde_json::from_str::<MergeTimeline>(json) {
            Ok(tl) => tl,
            Err(primary) => {
                let legacy: LegacyTimeline =
                    serde_json::from_str(json).map_err(|_| TimelineCodecError::Json(primary))?;
                let ids: Vec<SnapshotId> =
                    legacy.snapshots.iter().map(|s| s.id.clone()).collect();
                let mut branches = std::collections::BTreeMap::new();
                branches.insert(MergeTimeline::MAIN_BRANCH.to_string(), ids);
                MergeTimeline {
                    current: legacy.current.min(legacy.snapshots.len().saturating_sub(1)),
                    snapshots: legacy.snapshots,
                    branches,
                    current_branch: MergeTimeline::MAIN_BRANCH.to_string(),
                }
            }
        };
        self.next_id = timeline
            .snapshots
            .iter()
            .filter_map(|s| s.id.sequence())
            .max()
            .map(|n| n + 1)
            .unwrap_or(0);
        self.timeline = Some(timeline);
        Ok(())
    }

    /// Pull a persisted timeline from the store. Returns whether anything
    /// was adopted; store errors are logged, never raised.
    pub fn load_from_storage(&mut self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.load(&self.key) {
            Ok(Some(timeline)) => {
                self.next_id = timeline
                    .snapshots
                    .iter()
                    .filter_map(|s| s.id.sequence())
                    .max()
                    .map(|n| n + 1)
                    .unwrap_or(0);
                info!(target: "timeline.store", key = %self.key, snapshots = timeline.snapshots.len(), "timeline_loaded");
                self.timeline = Some(timeline);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(target: "timeline.store", key = %self.key, error = %e, "timeline_load_failed");
                false
            }
        }
    }

    /// Queue a debounced save of the current state.
    pub fn save_to_storage(&self) {
        self.request_save();
    }

    fn request_save(&self) {
        if let (Some(saver), Some(tl)) = (&self.saver, &self.timeline) {
            saver.request(tl.clone());
        }
    }

    fn move_cursor(&mut self, index: usize) -> Option<&StateSnapshot> {
        let tl = self.timeline.as_mut()?;
        tl.current = index;
        self.request_save();
        self.current()
    }

    fn fresh_id(&mut self) -> SnapshotId {
        let id = SnapshotId::new(self.next_id);
        self.next_id += 1;
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn build_snapshot(
        &self,
        id: SnapshotId,
        stats: GcodeStats,
        optimization: OptimizationResult,
        validation: ConstraintValidation,
        merge: Option<MergeInfo>,
        parent: Option<SnapshotId>,
        branch: String,
    ) -> StateSnapshot {
        let violation_count = validation.violations.len() as u32;
        let color_count = stats.colors.len() as u32;
        StateSnapshot {
            id,
            created_at_ms: now_ms(),
            stats,
            optimization,
            validation,
            merge,
            parent,
            branch,
            violation_count,
            color_count,
        }
    }

    /// Drop current-branch history after the cursor; snapshots another
    /// branch still references are kept in the global list.
    fn truncate_after_cursor(&mut self) {
        let Some(tl) = self.timeline.as_mut() else {
            return;
        };
        let current_id = tl.snapshots[tl.current].id.clone();
        let branch = tl.current_branch.clone();
        let Some(ids) = tl.branches.get_mut(&branch) else {
            return;
        };
        let Some(pos) = ids.iter().position(|id| *id == current_id) else {
            return;
        };
        let removed: Vec<SnapshotId> = ids.split_off(pos + 1);
        if removed.is_empty() {
            return;
        }
        let referenced: BTreeSet<SnapshotId> =
            tl.branches.values().flatten().cloned().collect();
        tl.snapshots
            .retain(|s| referenced.contains(&s.id) || !removed.contains(&s.id));
        // Cursor may have shifted left after retain.
        if let Some(index) = tl.index_of(&current_id) {
            tl.current = index;
        }
        debug!(target: "timeline", truncated = removed.len(), "leaf_truncated");
    }

    /// Evict oldest snapshots past the cap, repairing branch lists,
    /// dangling parents, and the cursor.
    fn evict_overflow(&mut self) {
        let Some(tl) = self.timeline.as_mut() else {
            return;
        };
        while tl.snapshots.len() > self.max_history {
            let evicted = tl.snapshots.remove(0);
            for ids in tl.branches.values_mut() {
                ids.retain(|id| *id != evicted.id);
            }
            for snapshot in &mut tl.snapshots {
                if snapshot.parent.as_ref() == Some(&evicted.id) {
                    snapshot.parent = None;
                }
            }
            tl.current = tl.current.saturating_sub(1);
            debug!(target: "timeline", id = %evicted.id, "snapshot_evicted");
        }
    }
}

trait IndexOf {
    fn index_of(&self, id: &SnapshotId) -> Option<usize>;
}

impl IndexOf for MergeTimeline {
    fn index_of(&self, id: &SnapshotId) -> Option<usize> {
        self.snapshots.iter().position(|s| &s.id == id)
    }
}
