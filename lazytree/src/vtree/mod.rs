//! Shadow tree of what the display has materialized.
//!
//! The virtual tree mirrors the display widget: which items exist, which are
//! expanded, and which still need data, a label or a child count. Only the
//! display thread touches it. Validation walks it top-down and reports the
//! visible items that need information, so work stays on the visible
//! frontier instead of the whole model.
//!
//! Items live in an arena keyed by [`ItemId`]; parents are referenced by id.

mod item;

pub use item::{ItemData, ItemId, VirtualItem};

use std::collections::{BTreeSet, HashMap};

use crate::model::{Element, TreePath};
use crate::update::LabelData;

/// Arena of shadow tree items.
#[derive(Debug)]
pub struct VirtualTree {
    items: HashMap<ItemId, VirtualItem>,
    root: ItemId,
    next_id: u64,
    selection: BTreeSet<ItemId>,
}

impl VirtualTree {
    /// Creates a tree with an empty root and no input.
    pub fn new() -> Self {
        let mut tree = Self {
            items: HashMap::new(),
            root: ItemId(0),
            next_id: 0,
            selection: BTreeSet::new(),
        };
        let root = tree.allocate(None, 0);
        if let Some(item) = tree.items.get_mut(&root) {
            item.needs_data = false;
            item.needs_label = false;
        }
        tree.root = root;
        tree
    }

    /// Drops every item and starts over with `input` at the root.
    ///
    /// The root is expanded and needs its child count.
    pub fn reset(&mut self, input: Element) {
        self.items.clear();
        self.selection.clear();
        let root = self.allocate(None, 0);
        if let Some(item) = self.items.get_mut(&root) {
            item.data = Some(input);
            item.needs_data = false;
            item.needs_label = false;
            item.needs_count = true;
            item.expanded = true;
            item.has_items = true;
        }
        self.root = root;
    }

    fn allocate(&mut self, parent: Option<ItemId>, index: usize) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.items.insert(id, VirtualItem::new(parent, index));
        id
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn item(&self, id: ItemId) -> Option<&VirtualItem> {
        self.items.get(&id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut VirtualItem> {
        self.items.get_mut(&id)
    }

    /// Number of items, including the root.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // -------------------------------------------------------------------------
    // Paths
    // -------------------------------------------------------------------------

    /// Finds the realized item at `path`.
    pub fn find_item(&self, path: &TreePath) -> Option<ItemId> {
        let mut current = self.root;
        for segment in path.segments() {
            current = self.find_child_with_data(current, segment)?;
        }
        Some(current)
    }

    /// Returns the child of `parent` showing `element`.
    pub fn find_child_with_data(&self, parent: ItemId, element: &Element) -> Option<ItemId> {
        self.items.get(&parent)?.children.values().copied().find(|id| {
            self.items
                .get(id)
                .and_then(|child| child.data.as_ref())
                .is_some_and(|data| data == element)
        })
    }

    /// Returns the path of `id`, or `None` if an item on the way is not realized.
    pub fn path_of(&self, id: ItemId) -> Option<TreePath> {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let item = self.items.get(&current)?;
            match item.parent {
                Some(parent) => {
                    segments.push(item.data.clone()?);
                    current = parent;
                }
                None => break,
            }
        }
        segments.reverse();
        Some(TreePath::new(segments))
    }

    /// Depth of `id` below the root.
    pub fn depth(&self, id: ItemId) -> usize {
        let mut depth = 0;
        let mut current = self.items.get(&id).and_then(|item| item.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.items.get(&parent).and_then(|item| item.parent);
        }
        depth
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Returns the child at view `index`, creating it if it is not materialized.
    pub fn child_or_create(&mut self, parent: ItemId, index: usize) -> Option<ItemId> {
        if let Some(child) = self.items.get(&parent)?.child(index) {
            return Some(child);
        }
        let child = self.allocate(Some(parent), index);
        if let Some(item) = self.items.get_mut(&parent) {
            item.children.insert(index, child);
        }
        Some(child)
    }

    /// Records the visible child count of `id`.
    ///
    /// Children past the new count are dropped; an expanded item gets an item
    /// for every index below it.
    pub fn set_item_count(&mut self, id: ItemId, count: usize) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        item.item_count = Some(count);
        item.needs_count = false;
        item.has_items = count > 0;
        let stale: Vec<ItemId> = item.children.split_off(&count).into_values().collect();
        let expanded = item.expanded;
        for child in stale {
            self.dispose(child);
        }
        if expanded {
            self.materialize(id);
        }
    }

    /// Creates items for every index below the known count.
    fn materialize(&mut self, id: ItemId) {
        let Some(count) = self.items.get(&id).and_then(|item| item.item_count) else {
            return;
        };
        for index in 0..count {
            self.child_or_create(id, index);
        }
    }

    /// Inserts a new child at view `index`, shifting later siblings.
    pub fn insert_item(&mut self, parent: ItemId, index: usize) -> Option<ItemId> {
        let item = self.items.get_mut(&parent)?;
        let shifted = item.children.split_off(&index);
        item.item_count = Some(item.item_count.map_or(index + 1, |count| count.max(index) + 1));
        item.has_items = true;
        let mut moved = Vec::with_capacity(shifted.len());
        for (old_index, child) in shifted {
            item.children.insert(old_index + 1, child);
            moved.push((child, old_index + 1));
        }
        for (child, new_index) in moved {
            if let Some(child) = self.items.get_mut(&child) {
                child.index = new_index;
            }
        }
        let child = self.allocate(Some(parent), index);
        if let Some(item) = self.items.get_mut(&parent) {
            item.children.insert(index, child);
        }
        Some(child)
    }

    /// Removes the child at view `index`, shifting later siblings.
    pub fn remove_item(&mut self, parent: ItemId, index: usize) -> bool {
        let Some(item) = self.items.get_mut(&parent) else {
            return false;
        };
        let removed = item.children.remove(&index);
        let shifted = item.children.split_off(&index);
        let mut moved = Vec::with_capacity(shifted.len());
        for (old_index, child) in shifted {
            item.children.insert(old_index - 1, child);
            moved.push((child, old_index - 1));
        }
        let count = item.item_count.map(|count| count.saturating_sub(1));
        item.item_count = count;
        item.has_items = count.map_or(item.has_items, |count| count > 0);
        for (child, new_index) in moved {
            if let Some(child) = self.items.get_mut(&child) {
                child.index = new_index;
            }
        }
        if let Some(removed) = removed {
            self.dispose(removed);
        }
        true
    }

    /// Drops `id` and its descendants from the arena.
    ///
    /// The caller unlinks `id` from its parent.
    fn dispose(&mut self, id: ItemId) {
        let Some(item) = self.items.remove(&id) else {
            return;
        };
        self.selection.remove(&id);
        for child in item.children.into_values() {
            self.dispose(child);
        }
    }

    /// Drops the children of `id` and forgets its count.
    fn clear_children(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        let children: Vec<ItemId> = std::mem::take(&mut item.children).into_values().collect();
        item.item_count = None;
        for child in children {
            self.dispose(child);
        }
    }

    // -------------------------------------------------------------------------
    // Item state
    // -------------------------------------------------------------------------

    /// Associates `element` with `id`. Returns true if the element changed.
    ///
    /// When an item starts showing a different element, its subtree belonged
    /// to the old element and is dropped.
    pub fn set_data(&mut self, id: ItemId, element: Element) -> bool {
        let Some(item) = self.items.get_mut(&id) else {
            return false;
        };
        let changed = item.data.as_ref() != Some(&element);
        let had_data = item.data.is_some();
        item.data = Some(element);
        item.needs_data = false;
        if changed {
            item.needs_label = true;
            if had_data {
                item.expanded = false;
                item.has_items = false;
                item.label = None;
                self.clear_children(id);
            }
        }
        changed
    }

    /// Dissociates the element of `id`; the item needs data again.
    pub fn clear_data(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.data = None;
            item.needs_data = true;
            item.needs_label = true;
            item.expanded = false;
            item.has_items = false;
            item.label = None;
        }
        self.clear_children(id);
    }

    /// Expands or collapses `id`.
    ///
    /// Expanding an item with an unknown count marks it as needing one.
    pub fn set_expanded(&mut self, id: ItemId, expanded: bool) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        item.expanded = expanded;
        if !expanded {
            return;
        }
        if item.item_count.is_none() {
            item.needs_count = true;
        } else {
            self.materialize(id);
        }
    }

    /// Records whether `id` has children. An item without children collapses.
    pub fn set_has_items(&mut self, id: ItemId, has_items: bool) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        item.has_items = has_items;
        if has_items {
            return;
        }
        item.expanded = false;
        item.needs_count = false;
        self.clear_children(id);
        if let Some(item) = self.items.get_mut(&id) {
            item.item_count = Some(0);
        }
    }

    pub fn set_label(&mut self, id: ItemId, label: LabelData) {
        if let Some(item) = self.items.get_mut(&id) {
            item.label = Some(label);
            item.needs_label = false;
        }
    }

    /// Marks `id` and its descendants stale.
    ///
    /// Items re-fetch their label and count; children re-fetch their data.
    /// Realized elements stay associated until the new data arrives.
    pub fn invalidate(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        if item.parent.is_some() && item.data.is_some() {
            item.needs_label = true;
        }
        if item.expanded || item.item_count.is_some() {
            item.needs_count = true;
        }
        let children: Vec<ItemId> = item.children.values().copied().collect();
        for child in children {
            if let Some(child_item) = self.items.get_mut(&child) {
                child_item.needs_data = true;
            }
            self.invalidate(child);
        }
    }

    // -------------------------------------------------------------------------
    // Selection and visibility
    // -------------------------------------------------------------------------

    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.selection = ids
            .into_iter()
            .filter(|id| self.items.contains_key(id))
            .collect();
    }

    pub fn add_selection(&mut self, id: ItemId) {
        if self.items.contains_key(&id) {
            self.selection.insert(id);
        }
    }

    pub fn is_selected(&self, id: ItemId) -> bool {
        self.selection.contains(&id)
    }

    pub fn selection(&self) -> Vec<ItemId> {
        self.selection.iter().copied().collect()
    }

    /// Returns true if every ancestor of `id` is expanded, or `id` is selected.
    pub fn is_visible(&self, id: ItemId) -> bool {
        if self.selection.contains(&id) {
            return true;
        }
        let mut current = self.items.get(&id).and_then(|item| item.parent);
        while let Some(parent) = current {
            match self.items.get(&parent) {
                Some(item) if item.expanded => current = item.parent,
                _ => return false,
            }
        }
        self.items.contains_key(&id)
    }

    /// Visible items in display order with their depth, root excluded.
    pub fn visible_items(&self) -> Vec<(usize, ItemId)> {
        let mut visible = Vec::new();
        self.collect_visible(self.root, 0, &mut visible);
        visible
    }

    fn collect_visible(&self, id: ItemId, depth: usize, out: &mut Vec<(usize, ItemId)>) {
        let Some(item) = self.items.get(&id) else {
            return;
        };
        if !item.expanded {
            return;
        }
        for child in item.children.values() {
            out.push((depth, *child));
            self.collect_visible(*child, depth + 1, out);
        }
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Returns the visible items that need information, top-down.
    ///
    /// An item is reported when it needs data and is visible, or when it is
    /// realized and needs its label, or its count while expanded with
    /// children. Only expanded items with materialized children are
    /// descended into. Selected items are reported even when hidden.
    pub fn validate(&self) -> Vec<ItemId> {
        let mut revealed = Vec::new();
        self.validate_item(self.root, &mut revealed);
        for id in &self.selection {
            if !revealed.contains(id) && self.needs_update(*id) {
                revealed.push(*id);
            }
        }
        revealed
    }

    fn needs_update(&self, id: ItemId) -> bool {
        let Some(item) = self.items.get(&id) else {
            return false;
        };
        if item.needs_data {
            return self.is_visible(id);
        }
        item.is_realized()
            && (item.needs_label || (item.needs_count && item.expanded && item.has_items))
    }

    fn validate_item(&self, id: ItemId, revealed: &mut Vec<ItemId>) {
        let Some(item) = self.items.get(&id) else {
            return;
        };
        if self.needs_update(id) {
            revealed.push(id);
        }
        if item.expanded && !item.children.is_empty() {
            for child in item.children.values() {
                self.validate_item(*child, revealed);
            }
        }
    }
}

impl Default for VirtualTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_root() -> VirtualTree {
        let mut tree = VirtualTree::new();
        tree.reset(Element::new("input"));
        tree
    }

    fn realize(tree: &mut VirtualTree, parent: ItemId, names: &[&str]) -> Vec<ItemId> {
        tree.set_item_count(parent, names.len());
        names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let id = tree.child_or_create(parent, index).unwrap();
                tree.set_data(id, Element::new(name));
                id
            })
            .collect()
    }

    #[test]
    fn test_reset_root_needs_count() {
        let tree = tree_with_root();
        let root = tree.item(tree.root()).unwrap();
        assert!(root.is_expanded());
        assert!(root.needs_count());
        assert_eq!(tree.validate(), vec![tree.root()]);
    }

    #[test]
    fn test_empty_tree_reports_nothing() {
        assert!(VirtualTree::new().validate().is_empty());
    }

    #[test]
    fn test_count_materializes_children_of_expanded_item() {
        let mut tree = tree_with_root();
        let root = tree.root();
        tree.set_item_count(root, 3);
        assert_eq!(tree.len(), 4);
        let revealed = tree.validate();
        assert_eq!(revealed.len(), 3);
        assert!(revealed.iter().all(|id| tree.item(*id).unwrap().needs_data()));
    }

    #[test]
    fn test_find_item_and_path_of() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a", "b"]);
        let b_children = {
            tree.set_expanded(ids[1], true);
            realize(&mut tree, ids[1], &["x"])
        };

        let path = TreePath::from_names(["b", "x"]);
        assert_eq!(tree.find_item(&path), Some(b_children[0]));
        assert_eq!(tree.path_of(b_children[0]), Some(path));
        assert_eq!(tree.path_of(root), Some(TreePath::root()));
        assert_eq!(tree.depth(b_children[0]), 2);
    }

    #[test]
    fn test_collapsed_children_are_not_visited() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a"]);
        tree.set_label(ids[0], LabelData::text("a"));
        tree.set_has_items(ids[0], true);
        tree.set_expanded(ids[0], true);
        tree.set_item_count(ids[0], 2);
        tree.set_expanded(ids[0], false);

        assert!(tree.validate().is_empty());
        let hidden = tree.item(ids[0]).unwrap().child(0).unwrap();
        assert!(!tree.is_visible(hidden));

        tree.add_selection(hidden);
        assert!(tree.is_visible(hidden));
        assert_eq!(tree.validate(), vec![hidden]);
    }

    #[test]
    fn test_realized_item_needing_label_is_revealed() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a"]);
        assert_eq!(tree.validate(), vec![ids[0]]);
        tree.set_label(ids[0], LabelData::text("a"));
        assert!(tree.validate().is_empty());
    }

    #[test]
    fn test_count_needed_only_when_expanded_with_children() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a"]);
        tree.set_label(ids[0], LabelData::text("a"));

        tree.set_expanded(ids[0], true);
        assert!(tree.item(ids[0]).unwrap().needs_count());
        assert!(tree.validate().is_empty());

        tree.set_has_items(ids[0], true);
        assert_eq!(tree.validate(), vec![ids[0]]);
    }

    #[test]
    fn test_insert_and_remove_shift_siblings() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a", "b", "c"]);

        let inserted = tree.insert_item(root, 1).unwrap();
        let root_item = tree.item(root).unwrap();
        assert_eq!(root_item.item_count(), Some(4));
        assert_eq!(root_item.child(1), Some(inserted));
        assert_eq!(root_item.child(2), Some(ids[1]));
        assert_eq!(tree.item(ids[2]).unwrap().index(), 3);

        assert!(tree.remove_item(root, 1));
        let root_item = tree.item(root).unwrap();
        assert_eq!(root_item.item_count(), Some(3));
        assert_eq!(root_item.child(1), Some(ids[1]));
        assert_eq!(tree.item(ids[2]).unwrap().index(), 2);
        assert!(tree.item(inserted).is_none());
    }

    #[test]
    fn test_shrinking_count_disposes_children() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a", "b", "c"]);
        tree.add_selection(ids[2]);
        tree.set_item_count(root, 1);
        assert!(tree.item(ids[1]).is_none());
        assert!(tree.item(ids[2]).is_none());
        assert!(tree.selection().is_empty());
    }

    #[test]
    fn test_changed_data_drops_subtree() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a"]);
        tree.set_has_items(ids[0], true);
        tree.set_expanded(ids[0], true);
        let nested = realize(&mut tree, ids[0], &["x"]);

        assert!(!tree.set_data(ids[0], Element::new("a")));
        assert!(tree.item(nested[0]).is_some());

        assert!(tree.set_data(ids[0], Element::new("z")));
        assert!(tree.item(nested[0]).is_none());
        assert!(!tree.item(ids[0]).unwrap().is_expanded());
    }

    #[test]
    fn test_no_children_collapses() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a"]);
        tree.set_expanded(ids[0], true);
        tree.set_has_items(ids[0], false);
        let item = tree.item(ids[0]).unwrap();
        assert!(!item.is_expanded());
        assert_eq!(item.item_count(), Some(0));
    }

    #[test]
    fn test_invalidate_marks_subtree() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a", "b"]);
        for id in &ids {
            tree.set_label(*id, LabelData::text("x"));
        }
        assert!(tree.validate().is_empty());

        tree.invalidate(root);
        let revealed = tree.validate();
        assert_eq!(revealed[0], root);
        assert!(tree.item(ids[0]).unwrap().needs_data());
        assert!(tree.item(ids[0]).unwrap().is_realized());
        assert_eq!(revealed.len(), 3);
    }

    #[test]
    fn test_visible_items_in_display_order() {
        let mut tree = tree_with_root();
        let root = tree.root();
        let ids = realize(&mut tree, root, &["a", "b"]);
        tree.set_expanded(ids[0], true);
        let nested = realize(&mut tree, ids[0], &["x"]);

        let visible = tree.visible_items();
        assert_eq!(visible, vec![(0, ids[0]), (1, nested[0]), (0, ids[1])]);
    }
}
