//! View-space and model-space child indices.
//!
//! Filters hide some children of a parent. The backing model still counts
//! them, so the viewer keeps, per parent, the set of filtered model indices
//! and translates between the two index spaces:
//!
//! ```text
//! model:  0  1  2  3  4        filtered = {1, 3}
//!         a  b  c  d  e
//! view:   0     1     2
//! ```
//!
//! The transform is read by worker threads (to size nested filter fetches)
//! while the display thread updates it, so it lives in a concurrent map.

use std::collections::BTreeSet;

use dashmap::DashMap;

use crate::model::TreePath;
use crate::update::ChildRange;

#[derive(Clone, Debug, Default)]
struct FilteredChildren {
    model_count: Option<usize>,
    indices: BTreeSet<usize>,
}

/// Filtered child indices per parent path.
#[derive(Debug, Default)]
pub struct FilterTransform {
    parents: DashMap<TreePath, FilteredChildren>,
}

impl FilterTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a model index filtered. Returns true if it was not filtered before.
    pub fn add_filtered_index(&self, parent: &TreePath, model_index: usize) -> bool {
        self.parents
            .entry(parent.clone())
            .or_default()
            .indices
            .insert(model_index)
    }

    pub fn is_filtered(&self, parent: &TreePath, model_index: usize) -> bool {
        self.parents
            .get(parent)
            .is_some_and(|entry| entry.indices.contains(&model_index))
    }

    /// Unmarks a model index. Returns true if it was filtered.
    pub fn clear_index(&self, parent: &TreePath, model_index: usize) -> bool {
        self.parents
            .get_mut(parent)
            .is_some_and(|mut entry| entry.indices.remove(&model_index))
    }

    /// Forgets everything known about the children of `parent`.
    pub fn clear(&self, parent: &TreePath) {
        self.parents.remove(parent);
    }

    /// Forgets every parent at or below `prefix`.
    pub fn clear_subtree(&self, prefix: &TreePath) {
        self.parents.retain(|path, _| !path.starts_with(prefix));
    }

    pub fn clear_all(&self) {
        self.parents.clear();
    }

    /// Returns the filtered model indices of `parent` in ascending order.
    pub fn filtered_children(&self, parent: &TreePath) -> Vec<usize> {
        self.parents
            .get(parent)
            .map(|entry| entry.indices.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the range spanning the filtered indices of `parent` below
    /// `model_count`, if any.
    pub fn filtered_window(&self, parent: &TreePath, model_count: usize) -> Option<ChildRange> {
        let entry = self.parents.get(parent)?;
        let first = *entry.indices.range(..model_count).next()?;
        let last = *entry.indices.range(..model_count).next_back()?;
        Some(ChildRange::new(first, last - first + 1))
    }

    /// Records the model child count; filtered indices past it are dropped.
    pub fn set_model_child_count(&self, parent: &TreePath, count: usize) {
        let mut entry = self.parents.entry(parent.clone()).or_default();
        entry.model_count = Some(count);
        let stale = entry.indices.split_off(&count);
        if !stale.is_empty() {
            tracing::trace!(parent = %parent, dropped = stale.len(), "Dropped filtered indices past count");
        }
    }

    /// Makes room for a child inserted at `model_index`: filtered indices at
    /// or after it move up by one.
    pub fn insert_model_index(&self, parent: &TreePath, model_index: usize) {
        let Some(mut entry) = self.parents.get_mut(parent) else {
            return;
        };
        let moved = entry.indices.split_off(&model_index);
        entry.indices.extend(moved.into_iter().map(|i| i + 1));
        if let Some(count) = entry.model_count.as_mut() {
            *count += 1;
        }
    }

    /// Closes the gap left by a child removed at `model_index`. Returns true
    /// if the removed child was filtered.
    pub fn remove_model_index(&self, parent: &TreePath, model_index: usize) -> bool {
        let Some(mut entry) = self.parents.get_mut(parent) else {
            return false;
        };
        let was_filtered = entry.indices.remove(&model_index);
        let moved = entry.indices.split_off(&model_index);
        entry.indices.extend(moved.into_iter().map(|i| i - 1));
        if let Some(count) = entry.model_count.as_mut() {
            *count = count.saturating_sub(1);
        }
        was_filtered
    }

    pub fn model_child_count(&self, parent: &TreePath) -> Option<usize> {
        self.parents.get(parent).and_then(|entry| entry.model_count)
    }

    /// Translates a model index to its view index; `None` if it is filtered.
    pub fn model_to_view_index(&self, parent: &TreePath, model_index: usize) -> Option<usize> {
        match self.parents.get(parent) {
            Some(entry) => {
                if entry.indices.contains(&model_index) {
                    return None;
                }
                Some(model_index - entry.indices.range(..model_index).count())
            }
            None => Some(model_index),
        }
    }

    /// Number of visible children out of `model_count`.
    pub fn model_to_view_count(&self, parent: &TreePath, model_count: usize) -> usize {
        match self.parents.get(parent) {
            Some(entry) => model_count - entry.indices.range(..model_count).count(),
            None => model_count,
        }
    }

    /// Translates a view index to the model index of the child shown there.
    pub fn view_to_model_index(&self, parent: &TreePath, view_index: usize) -> usize {
        let Some(entry) = self.parents.get(parent) else {
            return view_index;
        };
        let mut model = view_index;
        for &filtered in &entry.indices {
            if filtered <= model {
                model += 1;
            } else {
                break;
            }
        }
        model
    }

    /// Model child count corresponding to `view_count` visible children.
    pub fn view_to_model_count(&self, parent: &TreePath, view_count: usize) -> usize {
        view_count
            + self
                .parents
                .get(parent)
                .map_or(0, |entry| entry.indices.len())
    }
}
