//! Memento encode and compare requests.
//!
//! These are the hook points of state restore: the viewer asks the memento
//! provider to encode an element into an opaque blob, and later to compare an
//! element against a stored blob. A matching compare records the expand,
//! select and reveal state to restore as the element materializes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::base::{UpdateCore, ViewerUpdate};
use super::UpdateRequest;
use crate::model::TreePath;
use crate::provider::{same_provider, ElementMementoProvider};
use crate::viewer::{TreeModelViewer, ViewerShared};

/// Expand, select and reveal state awaiting an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingState {
    pub expand: bool,
    pub select: bool,
    pub reveal: bool,
}

impl PendingState {
    pub fn expand() -> Self {
        Self {
            expand: true,
            ..Self::default()
        }
    }

    pub fn select() -> Self {
        Self {
            select: true,
            reveal: true,
            ..Self::default()
        }
    }

    /// Combines two deltas.
    pub fn union(self, other: PendingState) -> PendingState {
        PendingState {
            expand: self.expand || other.expand,
            select: self.select || other.select,
            reveal: self.reveal || other.reveal,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.expand || self.select || self.reveal)
    }
}

/// Encode or compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MementoMode {
    Encode,
    Compare,
}

/// Encodes an element into a memento, or compares it against one.
pub struct MementoUpdate {
    core: UpdateCore,
    provider: Arc<dyn ElementMementoProvider>,
    mode: MementoMode,
    memento: Mutex<Vec<u8>>,
    delta: PendingState,
    equal: AtomicBool,
    knows_has_children: AtomicBool,
    knows_child_count: AtomicBool,
    check_children_realized: AtomicBool,
}

impl MementoUpdate {
    pub(crate) fn new(
        core: UpdateCore,
        provider: Arc<dyn ElementMementoProvider>,
        mode: MementoMode,
        memento: Vec<u8>,
        delta: PendingState,
    ) -> Arc<Self> {
        Arc::new(Self {
            core,
            provider,
            mode,
            memento: Mutex::new(memento),
            delta,
            equal: AtomicBool::new(false),
            knows_has_children: AtomicBool::new(false),
            knows_child_count: AtomicBool::new(false),
            check_children_realized: AtomicBool::new(false),
        })
    }

    pub fn mode(&self) -> MementoMode {
        self.mode
    }

    /// Returns the memento: the stored one for a compare, the produced one
    /// after an encode.
    pub fn memento(&self) -> Vec<u8> {
        self.memento.lock().clone()
    }

    /// Stores the encoded memento.
    pub fn set_memento(&self, memento: Vec<u8>) {
        *self.memento.lock() = memento;
    }

    /// Returns the state to restore when a compare matches.
    pub fn delta(&self) -> PendingState {
        self.delta
    }

    /// Records the compare result.
    pub fn set_equal(&self, equal: bool) {
        self.equal.store(equal, Ordering::Release);
    }

    pub fn is_equal(&self) -> bool {
        self.equal.load(Ordering::Acquire)
    }

    pub fn set_knows_has_children(&self, knows: bool) {
        self.knows_has_children.store(knows, Ordering::Release);
    }

    pub fn knows_has_children(&self) -> bool {
        self.knows_has_children.load(Ordering::Acquire)
    }

    pub fn set_knows_child_count(&self, knows: bool) {
        self.knows_child_count.store(knows, Ordering::Release);
    }

    pub fn knows_child_count(&self) -> bool {
        self.knows_child_count.load(Ordering::Acquire)
    }

    /// Asks the viewer to fetch the children of a matching element even if
    /// its child count is already known.
    pub fn set_check_children_realized(&self, check: bool) {
        self.check_children_realized.store(check, Ordering::Release);
    }

    pub fn check_children_realized(&self) -> bool {
        self.check_children_realized.load(Ordering::Acquire)
    }

    /// Completes the request. Calls after the first are ignored.
    pub fn done(self: &Arc<Self>) {
        UpdateRequest::from(Arc::clone(self)).done();
    }

    pub(crate) fn scheduling_path(&self) -> TreePath {
        self.element_path().clone()
    }

    pub(crate) fn same_request(&self, other: &Self) -> bool {
        self.mode == other.mode
            && self.viewer_input() == other.viewer_input()
            && self.element_path() == other.element_path()
    }

    pub(crate) fn coalesce(&self, other: &Arc<Self>) -> bool {
        same_provider(&self.provider, &other.provider) && self.same_request(other)
    }

    pub(crate) fn contains_update(&self, path: &TreePath) -> bool {
        self.element_path() == path
    }

    pub(crate) fn start_request(self: &Arc<Self>, shared: &ViewerShared) {
        if self.is_canceled() {
            self.done();
            return;
        }
        shared.metrics().provider_call();
        match self.mode {
            MementoMode::Encode => self.provider.encode_elements(vec![Arc::clone(self)]),
            MementoMode::Compare => self.provider.compare_elements(vec![Arc::clone(self)]),
        }
    }

    pub(crate) fn perform_update(&self, viewer: &mut TreeModelViewer) {
        match self.mode {
            MementoMode::Encode => viewer.apply_encoded_state(self.element_path(), &self.memento()),
            MementoMode::Compare if self.is_equal() => viewer.apply_matched_state(
                self.element_path(),
                self.delta,
                self.check_children_realized(),
            ),
            MementoMode::Compare => {}
        }
    }
}

impl ViewerUpdate for MementoUpdate {
    fn core(&self) -> &UpdateCore {
        &self.core
    }
}

impl fmt::Debug for MementoUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MementoUpdate")
            .field("id", &self.core.id())
            .field("path", self.element_path())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_state_union() {
        let state = PendingState::expand().union(PendingState::select());
        assert!(state.expand && state.select && state.reveal);
        assert!(PendingState::default().is_empty());
        assert!(!state.is_empty());
    }
}
