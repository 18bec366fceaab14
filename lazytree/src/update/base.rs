//! State shared by every update variant.
//!
//! [`UpdateCore`] carries the identity of a request (target path, viewer input,
//! presentation context), its lifecycle flags and its completion status. The
//! [`ViewerUpdate`] trait is the provider-facing view of that state; providers
//! import it to read the target and report failures.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::UpdateError;
use crate::model::{Element, PresentationContext, TreePath};
use crate::viewer::ViewerShared;

// =============================================================================
// Update Identity
// =============================================================================

/// Global sequence counter for update identity and FIFO ordering.
static UPDATE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_update_id() -> UpdateId {
    UpdateId(UPDATE_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// Unique identity of an update request.
///
/// Ids grow monotonically, so comparing two ids tells which request was
/// created first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpdateId(u64);

impl UpdateId {
    /// Returns the raw sequence number.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Update Core
// =============================================================================

/// Identity and lifecycle state of one update request.
pub struct UpdateCore {
    id: UpdateId,
    element_path: TreePath,
    element: Element,
    viewer_input: Element,
    context: Arc<PresentationContext>,
    shared: Weak<ViewerShared>,
    cancel: CancellationToken,
    started: AtomicBool,
    done: AtomicBool,
    delegated: AtomicBool,
    status: Mutex<Option<UpdateError>>,
    created_at: Instant,
}

impl UpdateCore {
    /// Creates the core for a request targeting `element_path`.
    ///
    /// The target element is the last path segment, or the viewer input for
    /// the root path.
    pub(crate) fn new(
        element_path: TreePath,
        viewer_input: Element,
        context: Arc<PresentationContext>,
        shared: Weak<ViewerShared>,
    ) -> Self {
        Self::with_cancel(
            element_path,
            viewer_input,
            context,
            shared,
            CancellationToken::new(),
        )
    }

    fn with_cancel(
        element_path: TreePath,
        viewer_input: Element,
        context: Arc<PresentationContext>,
        shared: Weak<ViewerShared>,
        cancel: CancellationToken,
    ) -> Self {
        let element = element_path
            .last_segment()
            .cloned()
            .unwrap_or_else(|| viewer_input.clone());
        Self {
            id: next_update_id(),
            element_path,
            element,
            viewer_input,
            context,
            shared,
            cancel,
            started: AtomicBool::new(false),
            done: AtomicBool::new(false),
            delegated: AtomicBool::new(false),
            status: Mutex::new(None),
            created_at: Instant::now(),
        }
    }

    /// Creates the core of a request spawned on behalf of this one.
    ///
    /// The derived request shares the target and input, and is canceled
    /// together with this request.
    pub(crate) fn derive(&self) -> Self {
        let core = Self::with_cancel(
            self.element_path.clone(),
            self.viewer_input.clone(),
            Arc::clone(&self.context),
            self.shared.clone(),
            self.cancel.child_token(),
        );
        core.delegated.store(true, Ordering::Release);
        core
    }

    /// Returns the request identity.
    pub fn id(&self) -> UpdateId {
        self.id
    }

    /// Returns the target element.
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Returns the path of the target element.
    pub fn element_path(&self) -> &TreePath {
        &self.element_path
    }

    /// Returns the viewer input captured when the request was created.
    pub fn viewer_input(&self) -> &Element {
        &self.viewer_input
    }

    /// Returns the presentation context snapshot.
    pub fn presentation_context(&self) -> &PresentationContext {
        &self.context
    }

    /// Returns the owning viewer state, if the viewer is still alive.
    pub(crate) fn shared(&self) -> Option<Arc<ViewerShared>> {
        self.shared.upgrade()
    }

    /// Marks the request canceled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the request (or the request it was spawned for) is canceled.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns a token that fires when this request is canceled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Transitions not-started → started; returns false if already started.
    pub(crate) fn mark_started(&self) -> bool {
        !self.started.swap(true, Ordering::AcqRel)
    }

    /// Returns true once the request has been started.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Transitions not-done → done; returns false if already done.
    pub(crate) fn mark_done(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }

    /// Returns true once the provider has completed the request.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Returns true if this request was spawned by another request.
    pub fn is_delegated(&self) -> bool {
        self.delegated.load(Ordering::Acquire)
    }

    /// Records a failure; the first recorded failure wins.
    pub fn set_error(&self, error: UpdateError) {
        let mut status = self.status.lock();
        if status.is_none() {
            *status = Some(error);
        }
    }

    /// Returns the completion status.
    pub fn status(&self) -> Result<(), UpdateError> {
        match &*self.status.lock() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Returns how long ago the request was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl fmt::Debug for UpdateCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateCore")
            .field("id", &self.id)
            .field("element_path", &self.element_path)
            .field("started", &self.is_started())
            .field("done", &self.is_done())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

// =============================================================================
// Provider-facing contract
// =============================================================================

/// Read access to the request state shared by all update variants.
///
/// Providers use this to learn what a request targets, to check for
/// cancellation in long computations and to report failures before calling
/// the variant's `done()`.
pub trait ViewerUpdate {
    /// Returns the shared request state.
    fn core(&self) -> &UpdateCore;

    /// Returns the request identity.
    fn id(&self) -> UpdateId {
        self.core().id()
    }

    /// Returns the target element.
    fn element(&self) -> &Element {
        self.core().element()
    }

    /// Returns the path of the target element.
    fn element_path(&self) -> &TreePath {
        self.core().element_path()
    }

    /// Returns the viewer input captured at creation.
    fn viewer_input(&self) -> &Element {
        self.core().viewer_input()
    }

    /// Returns the presentation context.
    fn presentation_context(&self) -> &PresentationContext {
        self.core().presentation_context()
    }

    /// Returns true once the request is canceled.
    fn is_canceled(&self) -> bool {
        self.core().is_canceled()
    }

    /// Cancels the request.
    fn cancel(&self) {
        self.core().cancel()
    }

    /// Records a failure.
    fn set_error(&self, error: UpdateError) {
        self.core().set_error(error)
    }

    /// Returns the completion status.
    fn status(&self) -> Result<(), UpdateError> {
        self.core().status()
    }

    /// Returns true once `done()` has been called.
    fn is_done(&self) -> bool {
        self.core().is_done()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::detached_core;
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let a = detached_core(TreePath::root());
        let b = detached_core(TreePath::root());
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_element_defaults_to_input_for_root() {
        let core = detached_core(TreePath::root());
        assert_eq!(core.element(), &Element::new("input"));

        let core = detached_core(TreePath::from_names(["t1", "f0"]));
        assert_eq!(core.element(), &Element::new("f0"));
    }

    #[test]
    fn test_started_and_done_transition_once() {
        let core = detached_core(TreePath::root());
        assert!(core.mark_started());
        assert!(!core.mark_started());
        assert!(core.mark_done());
        assert!(!core.mark_done());
        assert!(core.is_done());
    }

    #[test]
    fn test_first_error_wins() {
        let core = detached_core(TreePath::root());
        assert!(core.status().is_ok());
        core.set_error(UpdateError::provider("first"));
        core.set_error(UpdateError::provider("second"));
        assert_eq!(core.status(), Err(UpdateError::provider("first")));
    }

    #[test]
    fn test_derived_core_cancels_with_owner() {
        let owner = detached_core(TreePath::from_names(["a"]));
        let derived = owner.derive();
        assert!(derived.is_delegated());
        assert_eq!(derived.element_path(), owner.element_path());
        assert_ne!(derived.id(), owner.id());

        owner.cancel();
        assert!(derived.is_canceled());
    }

    #[test]
    fn test_detached_core_has_no_viewer() {
        assert!(detached_core(TreePath::root()).shared().is_none());
    }
}
