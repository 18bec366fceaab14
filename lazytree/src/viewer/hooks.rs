//! Hooks updates call while they are applied on the display thread.
//!
//! Each hook changes the shadow tree first and then mirrors the change to the
//! [`TreeDisplay`](crate::display::TreeDisplay). Hooks that add or re-associate
//! items queue a validation pass so newly visible items get their data.

use tracing::{debug, trace};

use super::{TreeModelViewer, MEMENTO_KEY};
use crate::filter::FilterTransform;
use crate::model::{Element, TreePath};
use crate::update::{LabelData, PendingState, UpdateKind, ViewerUpdate};

impl TreeModelViewer {
    pub(crate) fn filter_transform(&self) -> &FilterTransform {
        self.shared.transform()
    }

    pub(crate) fn should_filter(&self, parent: &TreePath, element: &Element) -> bool {
        self.shared.should_filter(parent, element)
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    pub(crate) fn apply_has_children(&mut self, path: &TreePath, has_children: bool) {
        let Some(id) = self.tree.find_item(path) else {
            return;
        };
        if !has_children {
            self.shared.transform().clear(path);
        }
        self.tree.set_has_items(id, has_children);
        self.display.set_has_children(path, has_children);
        if !has_children {
            return;
        }

        let expanded = self.tree.item(id).is_some_and(|item| item.is_expanded());
        if !expanded && self.config.auto_expands(path.len()) {
            trace!(path = %path, "Auto-expanding");
            self.tree.set_expanded(id, true);
            self.display.auto_expand(path);
        }
        self.restore_pending_state(path);
        self.request_validate();
    }

    /// Records a model child count and shows its view-space equivalent.
    pub(crate) fn apply_child_count(&mut self, path: &TreePath, model_count: usize) {
        let Some(id) = self.tree.find_item(path) else {
            return;
        };
        let transform = self.shared.transform();
        transform.set_model_child_count(path, model_count);
        let view_count = transform.model_to_view_count(path, model_count);
        trace!(path = %path, model_count, view_count, "Applying child count");

        self.tree.set_item_count(id, view_count);
        self.display.set_child_count(path, view_count);
        self.restore_pending_state(path);
        self.request_validate();
    }

    /// Shows `element` at view index `index` of `parent`.
    ///
    /// Returns false if the parent is gone or the index is past its count.
    pub(crate) fn replace_child(&mut self, parent: &TreePath, element: &Element, index: usize) -> bool {
        let Some(parent_id) = self.tree.find_item(parent) else {
            return false;
        };
        let count = self.tree.item(parent_id).and_then(|item| item.item_count());
        if count.is_some_and(|count| index >= count) {
            trace!(parent = %parent, index, "Child past item count ignored");
            return false;
        }

        // The same element may still be associated with another index after
        // the model reordered; that item must fetch its data again.
        if let Some(existing) = self.tree.find_child_with_data(parent_id, element) {
            if self.tree.item(existing).is_some_and(|item| item.index() != index) {
                self.tree.clear_data(existing);
            }
        }

        let Some(child) = self.tree.child_or_create(parent_id, index) else {
            return false;
        };
        self.tree.set_data(child, element.clone());
        self.display.replace(parent, element, index);
        self.request_validate();
        true
    }

    /// Inserts `element` at view index `index` of `parent`.
    pub(crate) fn insert_child(&mut self, parent: &TreePath, element: &Element, index: usize) -> bool {
        let Some(parent_id) = self.tree.find_item(parent) else {
            return false;
        };
        let Some(child) = self.tree.insert_item(parent_id, index) else {
            return false;
        };
        self.tree.set_data(child, element.clone());
        self.display.insert(parent, element, index);
        self.request_validate();
        true
    }

    /// Removes the child at view index `index` of `parent`.
    pub(crate) fn remove_child(&mut self, parent: &TreePath, index: usize) -> bool {
        let Some(parent_id) = self.tree.find_item(parent) else {
            return false;
        };
        let count = self.tree.item(parent_id).and_then(|item| item.item_count());
        if count.is_some_and(|count| index >= count) {
            return false;
        }
        if !self.tree.remove_item(parent_id, index) {
            return false;
        }
        self.display.remove(parent, index);
        true
    }

    /// Requests the has-children flag of a materialized item.
    pub(crate) fn update_has_children(&mut self, path: &TreePath) {
        if self.tree.find_item(path).is_none() {
            return;
        }
        if self.scheduler.is_waiting(UpdateKind::HasChildren, path, None) {
            return;
        }
        if let Err(e) = self.request_has_children(path) {
            debug!(path = %path, error = %e, "Has-children not requested");
        }
    }

    // -------------------------------------------------------------------------
    // Labels and state
    // -------------------------------------------------------------------------

    pub(crate) fn apply_label(&mut self, path: &TreePath, label: LabelData) {
        let Some(id) = self.tree.find_item(path) else {
            return;
        };
        self.display.set_label(path, &label);
        self.tree.set_label(id, label);
    }

    pub(crate) fn apply_encoded_state(&mut self, path: &TreePath, memento: &[u8]) {
        if let Some(item) = self
            .tree
            .find_item(path)
            .and_then(|id| self.tree.item_mut(id))
        {
            item.item_data_mut().set(MEMENTO_KEY, memento.to_vec());
        }
        self.display.state_encoded(path, memento);
    }

    /// Records the state a matching memento asks for and applies what it can.
    pub(crate) fn apply_matched_state(
        &mut self,
        path: &TreePath,
        delta: PendingState,
        check_children_realized: bool,
    ) {
        if !delta.is_empty() {
            self.add_pending_state(path, delta);
            self.restore_pending_state(path);
        }
        if !check_children_realized {
            return;
        }
        let Some(id) = self.tree.find_item(path) else {
            return;
        };
        let unknown_count = self
            .tree
            .item(id)
            .is_some_and(|item| item.is_expanded() && item.item_count().is_none());
        if unknown_count {
            if let Err(e) = self.request_child_count(path) {
                debug!(path = %path, error = %e, "Child count not requested");
            }
        }
    }

    pub(crate) fn apply_resolved_input(&mut self, input: Element) {
        if self.input.as_ref() == Some(&input) {
            return;
        }
        let keep = self.input_update.as_ref().map(|update| update.id());
        self.install_input(input, keep);
    }

    /// Expands the ancestors of `path` and selects it, now or as they load.
    pub(crate) fn reveal_path(&mut self, path: &TreePath) {
        if path.is_root() {
            return;
        }
        let segments = path.segments();
        for depth in 1..segments.len() {
            let ancestor = TreePath::new(segments[..depth].to_vec());
            self.add_pending_state(&ancestor, PendingState::expand());
        }
        self.add_pending_state(path, PendingState::select());

        for depth in 1..=segments.len() {
            let prefix = TreePath::new(segments[..depth].to_vec());
            self.restore_pending_state(&prefix);
        }
        self.request_validate();
    }

    /// Applies the pending state of `path` if its item exists.
    pub(crate) fn restore_pending_state(&mut self, path: &TreePath) {
        let Some(state) = self.pending_state.get(path).copied() else {
            return;
        };
        let Some(id) = self.tree.find_item(path) else {
            return;
        };
        if state.expand {
            let expanded = self.tree.item(id).is_some_and(|item| item.is_expanded());
            if !expanded {
                self.tree.set_expanded(id, true);
                self.display.auto_expand(path);
            }
            self.request_validate();
        }
        if state.select {
            self.tree.add_selection(id);
        }
        self.display.restore_pending_state(path, &state);
        self.pending_state.remove(path);
        trace!(path = %path, ?state, "Restored pending state");
    }
}
