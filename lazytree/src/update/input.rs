//! Viewer input resolution.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::base::{UpdateCore, ViewerUpdate};
use super::UpdateRequest;
use crate::model::{Element, TreePath};
use crate::provider::ViewerInputProvider;
use crate::viewer::{TreeModelViewer, ViewerShared};

/// Resolves the viewer input for a source element.
///
/// A debug view follows the active context (a thread, a frame); the input
/// provider maps that context to the element the tree should show.
pub struct ViewerInputUpdate {
    core: UpdateCore,
    provider: Arc<dyn ViewerInputProvider>,
    source: Element,
    input: Mutex<Option<Element>>,
}

impl ViewerInputUpdate {
    pub(crate) fn new(
        core: UpdateCore,
        provider: Arc<dyn ViewerInputProvider>,
        source: Element,
    ) -> Arc<Self> {
        Arc::new(Self {
            core,
            provider,
            source,
            input: Mutex::new(None),
        })
    }

    /// Returns the element the input is resolved for.
    pub fn source(&self) -> &Element {
        &self.source
    }

    /// Records the resolved input.
    pub fn set_input_element(&self, element: Element) {
        *self.input.lock() = Some(element);
    }

    /// Returns the resolved input, if any.
    pub fn input_element(&self) -> Option<Element> {
        self.input.lock().clone()
    }

    /// Completes the request. Calls after the first are ignored.
    pub fn done(self: &Arc<Self>) {
        UpdateRequest::from(Arc::clone(self)).done();
    }

    pub(crate) fn scheduling_path(&self) -> TreePath {
        TreePath::root()
    }

    pub(crate) fn same_request(&self, other: &Self) -> bool {
        self.source == other.source && self.viewer_input() == other.viewer_input()
    }

    pub(crate) fn coalesce(&self, other: &Arc<Self>) -> bool {
        self.same_request(other)
    }

    pub(crate) fn contains_update(&self, path: &TreePath) -> bool {
        path.is_root()
    }

    pub(crate) fn start_request(self: &Arc<Self>, shared: &ViewerShared) {
        if self.is_canceled() {
            self.done();
            return;
        }
        shared.metrics().provider_call();
        self.provider.update_input(Arc::clone(self));
    }

    pub(crate) fn perform_update(&self, viewer: &mut TreeModelViewer) {
        if let Some(input) = self.input_element() {
            viewer.apply_resolved_input(input);
        }
    }
}

impl ViewerUpdate for ViewerInputUpdate {
    fn core(&self) -> &UpdateCore {
        &self.core
    }
}

impl fmt::Debug for ViewerInputUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerInputUpdate")
            .field("id", &self.core.id())
            .field("source", &self.source)
            .finish()
    }
}
