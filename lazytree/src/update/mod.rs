//! Update requests.
//!
//! An update request is one unit of asynchronous work against a tree node, or
//! against a batch of sibling nodes answered by one provider call.
//!
//! # Lifecycle
//!
//! ```text
//! created ──► waiting ──► started ──► done ──► committed ──► cleaned up
//!   (viewer)   (coalesce)  (provider    (any      (display     (path lock
//!                           call)        thread)   thread)      released)
//! ```
//!
//! Every variant shares the same base contract ([`ViewerUpdate`]): identity,
//! cancellation and status. [`UpdateRequest`] is the closed set of variants
//! the scheduler and the batch work with; it carries the coalescing rule,
//! priority and scheduling path of each kind.

mod base;
mod child_count;
mod children;
mod has_children;
mod input;
mod label;
mod memento;
mod navigate;
mod policy;

pub use base::{UpdateCore, UpdateId, ViewerUpdate};
pub use child_count::ChildCountUpdate;
pub use children::{ChildRange, ChildrenUpdate, FilterOutcome};
pub use has_children::HasChildrenUpdate;
pub use input::ViewerInputUpdate;
pub use label::{ColumnLabel, LabelData, LabelUpdate};
pub use memento::{MementoMode, MementoUpdate, PendingState};
pub use navigate::NavigateUpdate;
pub use policy::Priority;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::UpdateError;
use crate::model::TreePath;
use crate::viewer::TreeModelViewer;

// =============================================================================
// Update Kind
// =============================================================================

/// Discriminant of an [`UpdateRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateKind {
    HasChildren,
    ChildCount,
    Children,
    Label,
    Memento,
    ViewerInput,
    Navigate,
}

impl UpdateKind {
    /// Fixed start priority of this kind.
    pub fn priority(self) -> Priority {
        match self {
            Self::Navigate | Self::ViewerInput => Priority::NAVIGATE,
            Self::HasChildren => Priority::HAS_CHILDREN,
            Self::ChildCount => Priority::CHILD_COUNT,
            Self::Children => Priority::CHILDREN,
            Self::Label => Priority::LABEL,
            Self::Memento => Priority::MEMENTO,
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HasChildren => "has_children",
            Self::ChildCount => "child_count",
            Self::Children => "children",
            Self::Label => "label",
            Self::Memento => "memento",
            Self::ViewerInput => "viewer_input",
            Self::Navigate => "navigate",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Update Request
// =============================================================================

/// Any update request.
///
/// Cloning is cheap: every variant is reference counted, and clones denote
/// the same request.
#[derive(Clone)]
pub enum UpdateRequest {
    HasChildren(Arc<HasChildrenUpdate>),
    ChildCount(Arc<ChildCountUpdate>),
    Children(Arc<ChildrenUpdate>),
    Label(Arc<LabelUpdate>),
    Memento(Arc<MementoUpdate>),
    ViewerInput(Arc<ViewerInputUpdate>),
    Navigate(Arc<NavigateUpdate>),
}

macro_rules! dispatch {
    ($request:expr, $update:ident => $body:expr) => {
        match $request {
            UpdateRequest::HasChildren($update) => $body,
            UpdateRequest::ChildCount($update) => $body,
            UpdateRequest::Children($update) => $body,
            UpdateRequest::Label($update) => $body,
            UpdateRequest::Memento($update) => $body,
            UpdateRequest::ViewerInput($update) => $body,
            UpdateRequest::Navigate($update) => $body,
        }
    };
}

macro_rules! impl_from_variant {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<Arc<$ty>> for UpdateRequest {
                fn from(update: Arc<$ty>) -> Self {
                    UpdateRequest::$variant(update)
                }
            }
        )*
    };
}

impl_from_variant! {
    HasChildren => HasChildrenUpdate,
    ChildCount => ChildCountUpdate,
    Children => ChildrenUpdate,
    Label => LabelUpdate,
    Memento => MementoUpdate,
    ViewerInput => ViewerInputUpdate,
    Navigate => NavigateUpdate,
}

impl UpdateRequest {
    /// Returns the shared request state.
    pub fn core(&self) -> &UpdateCore {
        dispatch!(self, update => update.core())
    }

    pub fn kind(&self) -> UpdateKind {
        match self {
            Self::HasChildren(_) => UpdateKind::HasChildren,
            Self::ChildCount(_) => UpdateKind::ChildCount,
            Self::Children(_) => UpdateKind::Children,
            Self::Label(_) => UpdateKind::Label,
            Self::Memento(_) => UpdateKind::Memento,
            Self::ViewerInput(_) => UpdateKind::ViewerInput,
            Self::Navigate(_) => UpdateKind::Navigate,
        }
    }

    pub fn id(&self) -> UpdateId {
        self.core().id()
    }

    pub fn element_path(&self) -> &TreePath {
        self.core().element_path()
    }

    pub fn is_canceled(&self) -> bool {
        self.core().is_canceled()
    }

    pub fn status(&self) -> Result<(), UpdateError> {
        self.core().status()
    }

    /// Start priority; lower runs first.
    pub fn priority(&self) -> Priority {
        self.kind().priority()
    }

    /// Path this request serializes on.
    ///
    /// Has-children, child-count and label requests use the parent path, so
    /// they do not wait on a children fetch of their own element.
    pub fn scheduling_path(&self) -> TreePath {
        match self {
            Self::HasChildren(update) => update.scheduling_path(),
            Self::ChildCount(update) => update.scheduling_path(),
            Self::Children(update) => update.scheduling_path(),
            Self::Label(update) => update.scheduling_path(),
            Self::Memento(update) => update.scheduling_path(),
            Self::ViewerInput(update) => update.scheduling_path(),
            Self::Navigate(update) => update.scheduling_path(),
        }
    }

    /// Returns true if this request, or a request it absorbed, targets `path`.
    pub fn contains_update(&self, path: &TreePath) -> bool {
        dispatch!(self, update => update.contains_update(path))
    }

    /// Returns true if a request of `kind` covering `path` is part of this
    /// request. For children requests, `index` must fall in the range.
    pub(crate) fn targets(&self, kind: UpdateKind, path: &TreePath, index: Option<usize>) -> bool {
        if self.kind() != kind || !self.contains_update(path) {
            return false;
        }
        match (self, index) {
            (Self::Children(update), Some(index)) => update.range().contains(index),
            _ => true,
        }
    }

    /// Returns true if both denote the same request: same kind, same viewer
    /// input, same path, and for children the same range.
    pub fn same_request(&self, other: &UpdateRequest) -> bool {
        match (self, other) {
            (Self::HasChildren(a), Self::HasChildren(b)) => a.same_request(b),
            (Self::ChildCount(a), Self::ChildCount(b)) => a.same_request(b),
            (Self::Children(a), Self::Children(b)) => a.same_request(b),
            (Self::Label(a), Self::Label(b)) => a.same_request(b),
            (Self::Memento(a), Self::Memento(b)) => a.same_request(b),
            (Self::ViewerInput(a), Self::ViewerInput(b)) => a.same_request(b),
            (Self::Navigate(a), Self::Navigate(b)) => a.same_request(b),
            _ => false,
        }
    }

    /// Offers `other` to this waiting request.
    ///
    /// Returns true if `other` was absorbed: either it duplicates a request
    /// already covered, or it was added to this batch, or its range was
    /// merged into this one. Started requests never absorb.
    pub(crate) fn coalesce(&self, other: &UpdateRequest) -> bool {
        if self.core().is_started() || other.core().is_started() {
            return false;
        }
        match (self, other) {
            (Self::HasChildren(a), Self::HasChildren(b)) => a.coalesce(b),
            (Self::ChildCount(a), Self::ChildCount(b)) => a.coalesce(b),
            (Self::Children(a), Self::Children(b)) => a.coalesce(b),
            (Self::Label(a), Self::Label(b)) => a.coalesce(b),
            (Self::Memento(a), Self::Memento(b)) => a.coalesce(b),
            (Self::ViewerInput(a), Self::ViewerInput(b)) => a.coalesce(b),
            (Self::Navigate(a), Self::Navigate(b)) => a.coalesce(b),
            _ => false,
        }
    }

    /// Returns this request followed by the siblings batched into it.
    pub(crate) fn members(&self) -> Vec<UpdateRequest> {
        match self {
            Self::HasChildren(update) => update.batch_members().into_iter().map(Into::into).collect(),
            Self::ChildCount(update) => update.batch_members().into_iter().map(Into::into).collect(),
            Self::Label(update) => update.batch_members().into_iter().map(Into::into).collect(),
            other => vec![other.clone()],
        }
    }

    /// Ids of every member; the scheduling path stays held until all of them
    /// are cleaned up.
    pub(crate) fn group_ids(&self) -> Vec<UpdateId> {
        self.members().iter().map(UpdateRequest::id).collect()
    }

    /// Cancels every member targeting `prefix` or a descendant of it.
    ///
    /// Returns true if the whole request is now canceled.
    pub(crate) fn cancel_within(&self, prefix: &TreePath) -> bool {
        let mut all_canceled = true;
        for member in self.members() {
            if member.element_path().starts_with(prefix) {
                member.core().cancel();
            } else if !member.is_canceled() {
                all_canceled = false;
            }
        }
        all_canceled
    }

    /// Starts the request: registers it and its batched siblings with the
    /// viewer in index order, then makes the single provider call.
    pub(crate) fn start(&self) {
        if !self.core().mark_started() {
            return;
        }
        let Some(shared) = self.core().shared() else {
            return;
        };
        let members = self.members();
        for member in &members {
            if member.id() != self.id() {
                member.core().mark_started();
            }
            shared.update_started(member);
        }
        trace!(id = %self.id(), kind = %self.kind(), members = members.len(), "Starting update");
        match self {
            Self::HasChildren(update) => update.start_request(&shared),
            Self::ChildCount(update) => update.start_request(&shared),
            Self::Children(update) => update.start_request(&shared),
            Self::Label(update) => update.start_request(&shared),
            Self::Memento(update) => update.start_request(&shared),
            Self::ViewerInput(update) => update.start_request(&shared),
            Self::Navigate(update) => update.start_request(),
        }
    }

    /// Completes the request. Only the first call has an effect.
    pub fn done(&self) {
        if !self.core().mark_done() {
            return;
        }
        let Some(shared) = self.core().shared() else {
            return;
        };
        match self {
            Self::ChildCount(update) => update.schedule_viewer_update(&shared),
            Self::Children(update) => update.schedule_viewer_update(&shared),
            other => shared.batch_done(other.clone()),
        }
    }

    /// Applies the result on the display thread.
    pub(crate) fn perform_update(&self, viewer: &mut TreeModelViewer) {
        dispatch!(self, update => update.perform_update(viewer))
    }
}

impl PartialEq for UpdateRequest {
    fn eq(&self, other: &Self) -> bool {
        self.same_request(other)
    }
}

impl fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, update => fmt::Debug::fmt(update, f))
    }
}

// =============================================================================
// Sibling Batches
// =============================================================================

/// Siblings absorbed into a primary request, in the order they were absorbed.
pub(crate) struct Siblings<T> {
    absorbed: Mutex<Vec<Arc<T>>>,
}

impl<T: ViewerUpdate> Siblings<T> {
    pub(crate) fn new() -> Self {
        Self {
            absorbed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, update: Arc<T>) {
        self.absorbed.lock().push(update);
    }

    pub(crate) fn targets(&self, path: &TreePath) -> bool {
        self.absorbed
            .lock()
            .iter()
            .any(|update| update.element_path() == path)
    }

    pub(crate) fn len(&self) -> usize {
        self.absorbed.lock().len()
    }

    /// Returns `primary` followed by a snapshot of the absorbed siblings.
    pub(crate) fn with_primary(&self, primary: &Arc<T>) -> Vec<Arc<T>> {
        let absorbed = self.absorbed.lock().clone();
        let mut members = Vec::with_capacity(absorbed.len() + 1);
        members.push(Arc::clone(primary));
        members.extend(absorbed);
        members
    }
}

/// Splits batch members into live and canceled ones, keeping order.
pub(crate) fn split_canceled<T: ViewerUpdate>(members: Vec<Arc<T>>) -> (Vec<Arc<T>>, Vec<Arc<T>>) {
    members.into_iter().partition(|update| !update.is_canceled())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_priorities_by_kind() {
        let provider = silent_provider();
        let has: UpdateRequest = has_children_update(&provider, &["a"]).into();
        let count: UpdateRequest = child_count_update(&provider, &["a"]).into();
        let children: UpdateRequest = children_update(&provider, &["a"], 0, 1).into();
        let nav: UpdateRequest = navigate_update(&["a"]).into();

        assert_eq!(nav.priority(), Priority::NAVIGATE);
        assert!(has.priority().runs_before(count.priority()));
        assert!(count.priority().runs_before(children.priority()));
    }

    #[test]
    fn test_scheduling_paths() {
        let provider = silent_provider();
        let a = TreePath::from_names(["t1", "a"]);
        let has: UpdateRequest = has_children_update(&provider, &["t1", "a"]).into();
        let count: UpdateRequest = child_count_update(&provider, &["t1", "a"]).into();
        let children: UpdateRequest = children_update(&provider, &["t1", "a"], 0, 1).into();

        assert_eq!(has.scheduling_path(), a.parent_path());
        assert_eq!(count.scheduling_path(), a.parent_path());
        assert_eq!(children.scheduling_path(), a);
    }

    #[test]
    fn test_equality_compares_kind_path_and_range() {
        let provider = silent_provider();
        let a: UpdateRequest = children_update(&provider, &["p"], 0, 2).into();
        let b: UpdateRequest = children_update(&provider, &["p"], 0, 2).into();
        let c: UpdateRequest = children_update(&provider, &["p"], 0, 3).into();
        let d: UpdateRequest = child_count_update(&provider, &["p"]).into();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_started_requests_do_not_coalesce() {
        let provider = silent_provider();
        let a: UpdateRequest = has_children_update(&provider, &["p", "a"]).into();
        let b: UpdateRequest = has_children_update(&provider, &["p", "b"]).into();
        a.core().mark_started();
        assert!(!a.coalesce(&b));
    }

    #[test]
    fn test_mixed_kinds_do_not_coalesce() {
        let provider = silent_provider();
        let a: UpdateRequest = has_children_update(&provider, &["p", "a"]).into();
        let b: UpdateRequest = child_count_update(&provider, &["p", "a"]).into();
        assert!(!a.coalesce(&b));
    }

    #[test]
    fn test_members_and_group_ids() {
        let provider = silent_provider();
        let a = has_children_update(&provider, &["p", "a"]);
        let b = has_children_update(&provider, &["p", "b"]);
        let request: UpdateRequest = Arc::clone(&a).into();
        assert!(request.coalesce(&b.clone().into()));

        assert_eq!(request.group_ids(), vec![a.id(), b.id()]);
        assert!(request.contains_update(&TreePath::from_names(["p", "b"])));
        assert!(request.targets(UpdateKind::HasChildren, &TreePath::from_names(["p", "b"]), None));
        assert!(!request.targets(UpdateKind::ChildCount, &TreePath::from_names(["p", "b"]), None));
    }

    #[test]
    fn test_cancel_within_reports_partial_cancel() {
        let provider = silent_provider();
        let a = has_children_update(&provider, &["p", "a"]);
        let b = has_children_update(&provider, &["p", "b"]);
        let request: UpdateRequest = Arc::clone(&a).into();
        assert!(request.coalesce(&b.clone().into()));

        assert!(!request.cancel_within(&TreePath::from_names(["p", "a"])));
        assert!(a.is_canceled());
        assert!(!b.is_canceled());
        assert!(request.cancel_within(&TreePath::from_names(["p"])));
        assert!(b.is_canceled());
    }

    #[test]
    fn test_children_targets_check_range() {
        let provider = silent_provider();
        let request: UpdateRequest = children_update(&provider, &["p"], 2, 3).into();
        let p = TreePath::from_names(["p"]);
        assert!(request.targets(UpdateKind::Children, &p, Some(4)));
        assert!(!request.targets(UpdateKind::Children, &p, Some(5)));
        assert!(request.targets(UpdateKind::Children, &p, None));
    }

    #[test]
    fn test_done_without_viewer_only_marks_done() {
        let update = has_children_update(&silent_provider(), &["a"]);
        update.done();
        update.done();
        assert!(update.is_done());
    }
}
