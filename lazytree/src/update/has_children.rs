//! Has-children requests.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::base::{UpdateCore, ViewerUpdate};
use super::{split_canceled, Siblings, UpdateRequest};
use crate::model::TreePath;
use crate::provider::{same_provider, ElementContentProvider};
use crate::viewer::{TreeModelViewer, ViewerShared};

/// Asks whether an element has children.
///
/// Sibling requests for the same content provider are batched: the provider
/// receives them in one call, and each still completes on its own.
pub struct HasChildrenUpdate {
    core: UpdateCore,
    provider: Arc<dyn ElementContentProvider>,
    has_children: AtomicBool,
    siblings: Siblings<HasChildrenUpdate>,
}

impl HasChildrenUpdate {
    pub(crate) fn new(core: UpdateCore, provider: Arc<dyn ElementContentProvider>) -> Arc<Self> {
        Arc::new(Self {
            core,
            provider,
            has_children: AtomicBool::new(false),
            siblings: Siblings::new(),
        })
    }

    /// Records the answer.
    pub fn set_has_children(&self, has_children: bool) {
        self.has_children.store(has_children, Ordering::Release);
    }

    /// Returns the recorded answer.
    pub fn has_children(&self) -> bool {
        self.has_children.load(Ordering::Acquire)
    }

    /// Completes the request. Calls after the first are ignored.
    pub fn done(self: &Arc<Self>) {
        UpdateRequest::from(Arc::clone(self)).done();
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
        trace!(path = %self.scheduling_path(), count = live.len(), "Dispatching has-children");
        shared.metrics().provider_call();
        self.provider.update_has_children(live);
    }

    pub(crate) fn perform_update(&self, viewer: &mut TreeModelViewer) {
        viewer.apply_has_children(self.element_path(), self.has_children());
    }
}

impl ViewerUpdate for HasChildrenUpdate {
    fn core(&self) -> &UpdateCore {
        &self.core
    }
}

impl fmt::Debug for HasChildrenUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasChildrenUpdate")
            .field("id", &self.core.id())
            .field("path", self.element_path())
            .field("siblings", &self.siblings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::test_support::{has_children_update, silent_provider};

    #[test]
    fn test_siblings_batch_and_duplicates_absorb() {
        let provider = silent_provider();
        let a = has_children_update(&provider, &["t1", "a"]);
        let b = has_children_update(&provider, &["t1", "b"]);
        let a_again = has_children_update(&provider, &["t1", "a"]);

        assert!(a.coalesce(&b));
        assert!(a.coalesce(&a_again));
        assert_eq!(a.batch_members().len(), 2);
        assert!(a.contains_update(&TreePath::from_names(["t1", "b"])));
    }

    #[test]
    fn test_non_siblings_do_not_batch() {
        let provider = silent_provider();
        let a = has_children_update(&provider, &["t1", "a"]);
        let deep = has_children_update(&provider, &["t1", "a", "x"]);
        assert!(!a.coalesce(&deep));
    }

    #[test]
    fn test_different_providers_do_not_batch() {
        let a = has_children_update(&silent_provider(), &["t1", "a"]);
        let b = has_children_update(&silent_provider(), &["t1", "b"]);
        assert!(!a.coalesce(&b));
    }

    #[test]
    fn test_scheduling_path_is_parent() {
        let a = has_children_update(&silent_provider(), &["t1", "a"]);
        assert_eq!(a.scheduling_path(), TreePath::from_names(["t1"]));
    }
}
