//! Model changes pushed by the backing model.
//!
//! A [`ModelProxy`] hands [`ModelDelta`]s to the display loop from any thread.
//! The loop walks each delta tree and routes every flag to the same hooks
//! provider answers use, so a pushed change looks to the widget exactly like
//! a fetched one.

use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use super::{TreeModelViewer, ViewerShared};
use crate::display::DisplayJob;
use crate::model::{DeltaFlags, Element, ModelDelta, TreePath};

/// Handle the backing model uses to report changes to a viewer.
///
/// The proxy does not keep the viewer alive; deltas fired after the viewer
/// is dropped or disposed are ignored.
#[derive(Clone)]
pub struct ModelProxy {
    shared: Weak<ViewerShared>,
}

impl ModelProxy {
    pub(crate) fn new(shared: &Arc<ViewerShared>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
        }
    }

    /// Queues `delta` for the display loop. Returns false if it was dropped.
    pub fn fire_model_changed(&self, delta: ModelDelta) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            trace!("Model change after viewer dropped");
            return false;
        };
        if shared.is_disposed() {
            trace!("Model change after viewer disposed");
            return false;
        }
        shared.post(DisplayJob::ModelChanged(delta));
        true
    }

    /// Returns true once the viewer is dropped or disposed.
    pub fn is_disposed(&self) -> bool {
        self.shared
            .upgrade()
            .map_or(true, |shared| shared.is_disposed())
    }
}

impl std::fmt::Debug for ModelProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProxy")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl TreeModelViewer {
    /// Returns a proxy the backing model can fire deltas through.
    pub fn model_proxy(&self) -> ModelProxy {
        ModelProxy::new(&self.shared)
    }

    /// Queues a model change; it is applied by the display loop.
    pub fn model_changed(&self, delta: ModelDelta) {
        if self.shared.is_disposed() {
            return;
        }
        self.shared.post(DisplayJob::ModelChanged(delta));
    }

    pub(crate) fn apply_model_delta(&mut self, delta: ModelDelta) {
        if self.shared.is_disposed() {
            return;
        }
        if self.input.as_ref() != Some(delta.element()) {
            debug!(element = %delta.element(), "Delta for another input ignored");
            return;
        }
        debug!(nodes = delta.node_count(), flags = ?delta.flags(), "Applying model delta");
        self.apply_delta_node(&delta, None, &TreePath::root());
    }

    fn apply_delta_node(&mut self, delta: &ModelDelta, parent: Option<&ModelDelta>, path: &TreePath) {
        let flags = delta.flags();
        trace!(path = %path, ?flags, "Delta node");
        let parent_path = (!path.is_root()).then(|| path.parent_path());

        if let Some(parent_path) = &parent_path {
            if flags.contains(DeltaFlags::ADDED) {
                self.delta_added(parent_path, parent.and_then(ModelDelta::child_count));
            }
            if flags.contains(DeltaFlags::REMOVED) {
                self.delta_removed(parent_path, path, delta.index());
                return;
            }
        }
        if flags.contains(DeltaFlags::CONTENT) {
            self.cancel_subtree_updates(path);
            self.refresh_path(path);
        }
        if flags.contains(DeltaFlags::EXPAND) {
            self.expand_with_ancestors(path);
        }
        if flags.contains(DeltaFlags::SELECT) {
            if let Some(parent_path) = &parent_path {
                self.expand_with_ancestors(parent_path);
            }
            self.set_selection(std::slice::from_ref(path));
        }
        if flags.contains(DeltaFlags::STATE) {
            self.delta_state(path);
        }
        if let Some(parent_path) = &parent_path {
            if flags.contains(DeltaFlags::INSERTED) {
                self.delta_inserted(parent_path, delta.element(), delta.index());
            }
            if flags.contains(DeltaFlags::REPLACED) {
                self.delta_replaced(parent_path, path, delta.replacement(), delta.index());
            }
        }

        for child in delta.children() {
            self.apply_delta_node(child, Some(delta), &path.child(child.element().clone()));
        }
    }

    fn delta_added(&mut self, parent: &TreePath, parent_count: Option<usize>) {
        match parent_count {
            Some(count) => self.apply_child_count(parent, count),
            None => self.refresh_child_count(parent),
        }
    }

    fn delta_removed(&mut self, parent: &TreePath, path: &TreePath, index: Option<usize>) {
        self.cancel_subtree_updates(path);
        self.forget_subtree(path);

        let transform = self.shared.transform();
        let model_index = index.or_else(|| {
            let id = self.tree.find_item(path)?;
            let view = self.tree.item(id)?.index();
            Some(transform.view_to_model_index(parent, view))
        });
        let Some(model_index) = model_index else {
            // Neither shown nor located; only the count is known to be stale.
            self.refresh_child_count(parent);
            return;
        };

        let view_index = transform.model_to_view_index(parent, model_index);
        transform.remove_model_index(parent, model_index);
        match view_index {
            Some(view) => {
                if !self.remove_child(parent, view) {
                    self.refresh_child_count(parent);
                }
            }
            None => trace!(parent = %parent, model_index, "Removed filtered child"),
        }
    }

    fn delta_inserted(&mut self, parent: &TreePath, element: &Element, index: Option<usize>) {
        let count_known = self
            .tree
            .find_item(parent)
            .and_then(|id| self.tree.item(id))
            .is_some_and(|item| item.item_count().is_some());
        let Some(model_index) = index.filter(|_| count_known) else {
            self.refresh_child_count(parent);
            return;
        };

        let transform = self.shared.transform();
        transform.insert_model_index(parent, model_index);
        if self.should_filter(parent, element) {
            transform.add_filtered_index(parent, model_index);
            trace!(parent = %parent, model_index, "Inserted child filtered");
            return;
        }
        let Some(view) = transform.model_to_view_index(parent, model_index) else {
            return;
        };
        if self.insert_child(parent, element, view) {
            self.update_has_children(&parent.child(element.clone()));
        }
    }

    fn delta_replaced(
        &mut self,
        parent: &TreePath,
        path: &TreePath,
        replacement: Option<&Element>,
        index: Option<usize>,
    ) {
        let (Some(replacement), Some(model_index)) = (replacement, index) else {
            self.refresh_path(parent);
            return;
        };
        self.cancel_subtree_updates(path);
        self.forget_subtree(path);

        let transform = self.shared.transform();
        let old_view = transform.model_to_view_index(parent, model_index);
        if self.should_filter(parent, replacement) {
            transform.add_filtered_index(parent, model_index);
            if let Some(view) = old_view {
                self.remove_child(parent, view);
            }
            return;
        }

        let shown = match old_view {
            Some(view) => self.replace_child(parent, replacement, view),
            None => {
                transform.clear_index(parent, model_index);
                match transform.model_to_view_index(parent, model_index) {
                    Some(view) => self.insert_child(parent, replacement, view),
                    None => false,
                }
            }
        };
        if shown {
            self.update_has_children(&parent.child(replacement.clone()));
        }
    }

    fn delta_state(&mut self, path: &TreePath) {
        if path.is_root() {
            self.refresh_child_count(path);
            return;
        }
        if let Err(e) = self.request_label(path) {
            debug!(path = %path, error = %e, "Label not requested");
        }
        self.update_has_children(path);
    }

    fn expand_with_ancestors(&mut self, path: &TreePath) {
        let segments = path.segments();
        for depth in 1..=segments.len() {
            self.expand(&TreePath::new(segments[..depth].to_vec()));
        }
    }

    /// Drops filter and pending state kept for `path` and below.
    fn forget_subtree(&mut self, path: &TreePath) {
        self.shared.transform().clear_subtree(path);
        self.pending_state.retain(|pending, _| !pending.starts_with(path));
    }

    fn refresh_child_count(&mut self, path: &TreePath) {
        if self.tree.find_item(path).is_none() {
            return;
        }
        if let Err(e) = self.request_child_count(path) {
            debug!(path = %path, error = %e, "Child count not requested");
        }
    }
}
