//! Child-count requests.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::base::{UpdateCore, ViewerUpdate};
use super::children::ChildrenUpdate;
use super::{split_canceled, Siblings, UpdateRequest};
use crate::model::TreePath;
use crate::provider::{same_provider, ElementContentProvider};
use crate::viewer::{TreeModelViewer, ViewerShared};

/// Asks for the model child count of an element.
///
/// When filtering may hide some of the children, the count is not reported
/// straight away: a nested children fetch first re-validates which indices
/// are filtered, so the viewer can report a view-space count.
pub struct ChildCountUpdate {
    core: UpdateCore,
    provider: Arc<dyn ElementContentProvider>,
    count: AtomicUsize,
    siblings: Siblings<ChildCountUpdate>,
    nested: Mutex<Option<Arc<ChildrenUpdate>>>,
    filter_validated: AtomicBool,
}

impl ChildCountUpdate {
    pub(crate) fn new(core: UpdateCore, provider: Arc<dyn ElementContentProvider>) -> Arc<Self> {
        Arc::new(Self {
            core,
            provider,
            count: AtomicUsize::new(0),
            siblings: Siblings::new(),
            nested: Mutex::new(None),
            filter_validated: AtomicBool::new(false),
        })
    }

    /// Records the model child count.
    pub fn set_child_count(&self, count: usize) {
        self.count.store(count, Ordering::Release);
    }

    /// Returns the recorded model child count.
    pub fn child_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Completes the request. Calls after the first are ignored.
    pub fn done(self: &Arc<Self>) {
        UpdateRequest::from(Arc::clone(self)).done();
    }

    /// Returns true once a nested fetch has re-validated the filtered children.
    pub fn is_filter_validated(&self) -> bool {
        self.filter_validated.load(Ordering::Acquire)
    }

    pub(crate) fn mark_filter_validated(&self) {
        self.filter_validated.store(true, Ordering::Release);
    }

    /// Returns the nested children fetch, if one was spawned.
    pub fn nested_fetch(&self) -> Option<Arc<ChildrenUpdate>> {
        self.nested.lock().clone()
    }

    pub(crate) fn provider(&self) -> &Arc<dyn ElementContentProvider> {
        &self.provider
    }

    pub(crate) fn scheduling_path(&self) -> TreePath {
        self.element_path().parent_path()
    }

    pub(crate) fn same_request(&self, other: &Self) -> bool {
        self.viewer_input() == other.viewer_input() && self.element_path() == other.element_path()
    }

    pub(crate) fn coalesce(&self, other: &Arc<Self>) -> bool {
        if !same_provider(&self.provider, &other.provider)
            || self.viewer_input() != other.viewer_input()
        {
            return false;
        }
        if self.contains_update(other.element_path()) {
            return true;
        }
        if self.scheduling_path() == other.scheduling_path() {
            self.siblings.push(Arc::clone(other));
            return true;
        }
        false
    }

    pub(crate) fn contains_update(&self, path: &TreePath) -> bool {
        self.element_path() == path || self.siblings.targets(path)
    }

    pub(crate) fn batch_members(self: &Arc<Self>) -> Vec<Arc<Self>> {
        self.siblings.with_primary(self)
    }

    pub(crate) fn start_request(self: &Arc<Self>, shared: &ViewerShared) {
        let (live, canceled) = split_canceled(self.batch_members());
        for update in &canceled {
            update.done();
        }
        if live.is_empty() {
            return;
        }
        shared.metrics().provider_call();
        self.provider.update_child_count(live);
    }

    /// Hands the answered count to the batch, after re-validating filtered
    /// children when filtering may affect this element.
    ///
    /// The count is fixed before the nested fetch is dispatched; the nested
    /// result is applied on the display thread before this request commits.
    pub(crate) fn schedule_viewer_update(self: &Arc<Self>, shared: &ViewerShared) {
        if !self.is_canceled() && self.status().is_ok() {
            if let Some(range) = shared.filter_window(self.element_path(), self.child_count()) {
                let nested = ChildrenUpdate::nested(self, range);
                debug!(
                    path = %self.element_path(),
                    offset = range.offset,
                    length = range.length,
                    "Re-validating filtered children"
                );
                *self.nested.lock() = Some(Arc::clone(&nested));
                shared.metrics().provider_call();
                self.provider.update_children(vec![nested]);
                return;
            }
        }
        shared.batch_done(UpdateRequest::ChildCount(Arc::clone(self)));
    }

    pub(crate) fn perform_update(&self, viewer: &mut TreeModelViewer) {
        viewer.apply_child_count(self.element_path(), self.child_count());
    }
}

impl ViewerUpdate for ChildCountUpdate {
    fn core(&self) -> &UpdateCore {
        &self.core
    }
}

impl fmt::Debug for ChildCountUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildCountUpdate")
            .field("id", &self.core.id())
            .field("path", self.element_path())
            .field("count", &self.child_count())
            .field("siblings", &self.siblings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::test_support::{child_count_update, silent_provider};

    #[test]
    fn test_sibling_counts_batch() {
        let provider = silent_provider();
        let a = child_count_update(&provider, &["a"]);
        let b = child_count_update(&provider, &["b"]);
        assert!(a.coalesce(&b));
        let members = a.batch_members();
        assert_eq!(members.len(), 2);
        assert!(Arc::ptr_eq(&members[0], &a));
        assert!(Arc::ptr_eq(&members[1], &b));
    }

    #[test]
    fn test_count_round_trip() {
        let update = child_count_update(&silent_provider(), &["a"]);
        assert_eq!(update.child_count(), 0);
        update.set_child_count(5);
        assert_eq!(update.child_count(), 5);
        assert!(!update.is_filter_validated());
        assert!(update.nested_fetch().is_none());
    }
}
