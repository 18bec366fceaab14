//! Per-path serialization of updates.
//!
//! Every update serializes on a scheduling path. Two updates whose paths
//! overlap (one is a prefix of the other) never run at the same time, while
//! updates on unrelated subtrees run side by side.
//!
//! A newly scheduled update is first offered to every waiting update for
//! coalescing. A trigger pass then starts waiting updates in priority order;
//! an update whose path overlaps a running one, or a higher-priority update
//! that is still waiting, stays queued. A started batch holds its path until
//! every member has been cleaned up.

mod queue;

pub use queue::{UpdateQueue, WaitingUpdate};

use std::collections::HashMap;

use tracing::trace;

use crate::model::TreePath;
use crate::update::{UpdateId, UpdateKind, UpdateRequest};

/// What happened to a scheduled update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A waiting update absorbed it.
    Coalesced,
    /// It waits for the next trigger pass.
    Queued,
}

/// Waiting updates plus the scheduling paths held by running ones.
#[derive(Default)]
pub struct UpdateScheduler {
    waiting: UpdateQueue,
    running: HashMap<TreePath, Vec<UpdateId>>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `update` unless a waiting update absorbs it.
    pub fn schedule(&mut self, update: UpdateRequest) -> ScheduleOutcome {
        if self.waiting.coalesce(&update) {
            trace!(id = %update.id(), kind = %update.kind(), path = %update.element_path(), "Update coalesced");
            return ScheduleOutcome::Coalesced;
        }
        self.waiting.push(update);
        ScheduleOutcome::Queued
    }

    /// Takes every waiting update that may start now and marks its path held.
    ///
    /// Returned updates are in start order and must be started by the caller.
    pub fn take_ready(&mut self) -> Vec<UpdateRequest> {
        let ordered = merge_waiting_ranges(self.waiting.drain_ordered());
        let mut reserved: Vec<TreePath> = Vec::new();
        let mut ready = Vec::new();

        for waiting in ordered {
            let path = waiting.update.scheduling_path();
            let blocked = self.is_blocked(&path) || reserved.iter().any(|p| p.overlaps(&path));
            if blocked {
                reserved.push(path);
                self.waiting.requeue(waiting);
                continue;
            }
            self.running.insert(path, waiting.update.group_ids());
            ready.push(waiting.update);
        }
        ready
    }

    /// Releases the part of a held path owned by `update`.
    ///
    /// Returns true if the path is now free.
    pub fn release(&mut self, update: &UpdateRequest) -> bool {
        let path = update.scheduling_path();
        let Some(ids) = self.running.get_mut(&path) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|id| *id != update.id());
        if ids.len() == before {
            return false;
        }
        if ids.is_empty() {
            self.running.remove(&path);
            trace!(path = %path, "Scheduling path released");
            return true;
        }
        false
    }

    /// Cancels waiting updates under `prefix`; fully canceled ones are dropped.
    pub fn cancel_waiting(&mut self, prefix: &TreePath) -> usize {
        self.waiting.cancel_within(prefix)
    }

    /// Returns true if a running update holds a path overlapping `path`.
    pub fn is_blocked(&self, path: &TreePath) -> bool {
        self.running.keys().any(|held| held.overlaps(path))
    }

    /// Returns true if a waiting update of `kind` covers `path`.
    pub fn is_waiting(&self, kind: UpdateKind, path: &TreePath, index: Option<usize>) -> bool {
        self.waiting.targets(kind, path, index)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Number of held scheduling paths.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn waiting_kinds(&self) -> HashMap<UpdateKind, usize> {
        self.waiting.kind_counts()
    }

    /// Drops every waiting update and forgets held paths.
    pub fn clear(&mut self) {
        self.waiting.clear();
        self.running.clear();
    }
}

/// Merges waiting children requests whose ranges came to touch after an
/// earlier merge widened one of them.
fn merge_waiting_ranges(ordered: Vec<WaitingUpdate>) -> Vec<WaitingUpdate> {
    let mut merged: Vec<WaitingUpdate> = Vec::with_capacity(ordered.len());
    for waiting in ordered {
        let absorbed = waiting.update.kind() == UpdateKind::Children
            && merged
                .iter()
                .any(|kept| kept.update.coalesce(&waiting.update));
        if !absorbed {
            merged.push(waiting);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::test_support::{
        child_count_update, children_update, has_children_update, silent_provider,
    };
    use crate::update::ChildRange;

    fn path(names: &[&str]) -> TreePath {
        TreePath::from_names(names.iter().copied())
    }

    #[test]
    fn test_overlapping_paths_serialize() {
        let provider = silent_provider();
        let mut scheduler = UpdateScheduler::new();
        let parent: UpdateRequest = children_update(&provider, &["a"], 0, 2).into();
        let child: UpdateRequest = children_update(&provider, &["a", "x"], 0, 2).into();
        scheduler.schedule(parent.clone());
        scheduler.schedule(child.clone());

        let ready = scheduler.take_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id(), parent.id());
        assert!(scheduler.take_ready().is_empty());

        assert!(scheduler.release(&parent));
        let ready = scheduler.take_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id(), child.id());
    }

    #[test]
    fn test_disjoint_paths_run_together() {
        let provider = silent_provider();
        let mut scheduler = UpdateScheduler::new();
        scheduler.schedule(children_update(&provider, &["a"], 0, 2).into());
        scheduler.schedule(children_update(&provider, &["b"], 0, 2).into());
        assert_eq!(scheduler.take_ready().len(), 2);
        assert_eq!(scheduler.running_count(), 2);
    }

    #[test]
    fn test_batch_holds_path_until_all_members_release() {
        let provider = silent_provider();
        let mut scheduler = UpdateScheduler::new();
        let a = has_children_update(&provider, &["p", "a"]);
        let b = has_children_update(&provider, &["p", "b"]);
        assert_eq!(scheduler.schedule(a.clone().into()), ScheduleOutcome::Queued);
        assert_eq!(scheduler.schedule(b.clone().into()), ScheduleOutcome::Coalesced);

        let ready = scheduler.take_ready();
        assert_eq!(ready.len(), 1);
        assert!(scheduler.is_blocked(&path(&["p"])));

        assert!(!scheduler.release(&a.clone().into()));
        assert!(scheduler.is_blocked(&path(&["p"])));
        assert!(scheduler.release(&b.into()));
        assert!(!scheduler.is_blocked(&path(&["p"])));
    }

    #[test]
    fn test_blocked_higher_priority_keeps_lower_priority_waiting() {
        let provider = silent_provider();
        let mut scheduler = UpdateScheduler::new();
        let running: UpdateRequest = children_update(&provider, &["p", "a"], 0, 1).into();
        scheduler.schedule(running.clone());
        assert_eq!(scheduler.take_ready().len(), 1);

        // Count of /p/a serializes on /p, overlapping the running children fetch.
        let count: UpdateRequest = child_count_update(&provider, &["p", "a"]).into();
        let children: UpdateRequest = children_update(&provider, &["p"], 0, 1).into();
        scheduler.schedule(count.clone());
        scheduler.schedule(children.clone());
        assert!(scheduler.take_ready().is_empty());

        scheduler.release(&running);
        let ready: Vec<_> = scheduler.take_ready().iter().map(UpdateRequest::id).collect();
        assert_eq!(ready, vec![count.id()]);
    }

    #[test]
    fn test_release_of_unknown_update_is_noop() {
        let provider = silent_provider();
        let mut scheduler = UpdateScheduler::new();
        let stray: UpdateRequest = children_update(&provider, &["a"], 0, 1).into();
        assert!(!scheduler.release(&stray));
    }

    #[test]
    fn test_waiting_ranges_merge_after_widening() {
        let provider = silent_provider();
        let mut scheduler = UpdateScheduler::new();
        let first = children_update(&provider, &["p"], 0, 1);
        scheduler.schedule(first.clone().into());
        scheduler.schedule(children_update(&provider, &["p"], 2, 1).into());
        scheduler.schedule(children_update(&provider, &["p"], 1, 1).into());
        assert_eq!(scheduler.waiting_count(), 2);

        let ready = scheduler.take_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(first.range(), ChildRange::new(0, 3));
    }

    #[test]
    fn test_cancel_waiting() {
        let provider = silent_provider();
        let mut scheduler = UpdateScheduler::new();
        scheduler.schedule(children_update(&provider, &["a"], 0, 1).into());
        scheduler.schedule(children_update(&provider, &["b"], 0, 1).into());
        assert_eq!(scheduler.cancel_waiting(&path(&["a"])), 1);
        assert_eq!(scheduler.waiting_count(), 1);
        assert!(scheduler.is_waiting(UpdateKind::Children, &path(&["b"]), Some(0)));
    }
}
