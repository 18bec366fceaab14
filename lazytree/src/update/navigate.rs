//! Navigation requests.

use std::fmt;
use std::sync::Arc;

use super::base::{UpdateCore, ViewerUpdate};
use super::UpdateRequest;
use crate::model::TreePath;
use crate::viewer::TreeModelViewer;

/// Reveals and selects the element at a path.
///
/// No provider is involved: the request completes as soon as it starts, and
/// applying it expands the ancestors of the target as they materialize.
pub struct NavigateUpdate {
    core: UpdateCore,
}

impl NavigateUpdate {
    pub(crate) fn new(core: UpdateCore) -> Arc<Self> {
        Arc::new(Self { core })
    }

    /// Completes the request. Calls after the first are ignored.
    pub fn done(self: &Arc<Self>) {
        UpdateRequest::from(Arc::clone(self)).done();
    }

    pub(crate) fn scheduling_path(&self) -> TreePath {
        self.element_path().clone()
    }

    pub(crate) fn same_request(&self, other: &Self) -> bool {
        self.viewer_input() == other.viewer_input() && self.element_path() == other.element_path()
    }

    pub(crate) fn coalesce(&self, other: &Arc<Self>) -> bool {
        self.same_request(other)
    }

    pub(crate) fn contains_update(&self, path: &TreePath) -> bool {
        self.element_path() == path
    }

    pub(crate) fn start_request(self: &Arc<Self>) {
        self.done();
    }

    pub(crate) fn perform_update(&self, viewer: &mut TreeModelViewer) {
        viewer.reveal_path(self.element_path());
    }
}

impl ViewerUpdate for NavigateUpdate {
    fn core(&self) -> &UpdateCore {
        &self.core
    }
}

impl fmt::Debug for NavigateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigateUpdate")
            .field("id", &self.core.id())
            .field("path", self.element_path())
            .finish()
    }
}
