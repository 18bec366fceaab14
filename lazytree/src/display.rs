//! Display-thread jobs and widget hooks.
//!
//! Worker threads never touch the shadow tree. They post [`DisplayJob`]s to
//! the viewer's queue, and the display loop applies them one at a time.
//! [`TreeDisplay`] is the widget side: the viewer mirrors every change it
//! makes to the shadow tree through these hooks.

use std::fmt;
use std::sync::Arc;

use crate::model::{Element, ModelDelta, TreePath};
use crate::update::{
    ChildCountUpdate, ChildrenUpdate, LabelData, PendingState, UpdateRequest, ViewerUpdate,
};

/// Work for the display loop.
pub(crate) enum DisplayJob {
    /// Apply a drained batch, then clean each update up.
    Commit(Vec<UpdateRequest>),
    /// Clean up a canceled update without applying it.
    Release(UpdateRequest),
    /// Re-validate filtered children, then hand `owner` to the batch.
    FilterPass {
        children: Arc<ChildrenUpdate>,
        owner: Arc<ChildCountUpdate>,
    },
    /// Apply a change pushed by the backing model.
    ModelChanged(ModelDelta),
    /// Start waiting updates whose paths are free.
    Trigger,
    /// Walk the shadow tree for visible items that need data.
    Validate,
}

impl fmt::Debug for DisplayJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit(updates) => write!(f, "Commit({})", updates.len()),
            Self::Release(update) => write!(f, "Release({})", update.id()),
            Self::FilterPass { owner, .. } => write!(f, "FilterPass({})", owner.element_path()),
            Self::ModelChanged(delta) => write!(f, "ModelChanged({})", delta.element()),
            Self::Trigger => f.write_str("Trigger"),
            Self::Validate => f.write_str("Validate"),
        }
    }
}

/// Widget hooks called on the display thread.
///
/// Indices are view indices: filtered-out children do not occupy a slot.
/// Every hook defaults to a no-op, so hosts implement only what they render.
pub trait TreeDisplay: Send {
    /// A child appeared at `index`; later siblings shift down.
    fn insert(&mut self, _parent: &TreePath, _element: &Element, _index: usize) {}

    /// The child at `index` went away; later siblings shift up.
    fn remove(&mut self, _parent: &TreePath, _index: usize) {}

    /// The child at `index` is now `element`.
    fn replace(&mut self, _parent: &TreePath, _element: &Element, _index: usize) {}

    fn set_child_count(&mut self, _path: &TreePath, _count: usize) {}

    fn set_has_children(&mut self, _path: &TreePath, _has_children: bool) {}

    fn set_label(&mut self, _path: &TreePath, _label: &LabelData) {}

    /// The viewer expanded `path` on its own (auto-expand level or restored state).
    fn auto_expand(&mut self, _path: &TreePath) {}

    /// Restored expand/select/reveal state was applied at `path`.
    fn restore_pending_state(&mut self, _path: &TreePath, _state: &PendingState) {}

    /// `path` is about to be refreshed; capture whatever view state should survive.
    fn preserve_state(&mut self, _path: &TreePath) {}

    /// A memento was encoded for `path`.
    fn state_encoded(&mut self, _path: &TreePath, _memento: &[u8]) {}
}

/// A display that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl TreeDisplay for NullDisplay {}
