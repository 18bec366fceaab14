//! Children range requests.
//!
//! A children request fetches the elements at model indices
//! `[offset, offset + length)` of one parent. Waiting requests on the same
//! parent merge when their ranges touch or overlap, so a burst of single-index
//! requests from validation collapses into one provider call.
//!
//! Applying the result reconciles filtering: an element that is newly
//! filtered out is removed at the view index it used to occupy, an element
//! that is filtered back in is inserted at its recomputed view index, and
//! every other element replaces what the view shows at its view index.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::base::{UpdateCore, ViewerUpdate};
use super::child_count::ChildCountUpdate;
use super::UpdateRequest;
use crate::display::DisplayJob;
use crate::error::UpdateError;
use crate::model::{Element, TreePath};
use crate::provider::{same_provider, ElementContentProvider};
use crate::viewer::{TreeModelViewer, ViewerShared};

// =============================================================================
// Child Range
// =============================================================================

/// A half-open range of model indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChildRange {
    pub offset: usize,
    pub length: usize,
}

impl ChildRange {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// One past the last index.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.offset && index < self.end()
    }

    /// Returns true if the ranges overlap or are adjacent.
    pub fn touches(&self, other: &ChildRange) -> bool {
        self.offset <= other.end() && other.offset <= self.end()
    }

    /// Returns the smallest range covering both.
    pub fn merge(&self, other: &ChildRange) -> ChildRange {
        let offset = self.offset.min(other.offset);
        let end = self.end().max(other.end());
        ChildRange {
            offset,
            length: end - offset,
        }
    }
}

impl fmt::Display for ChildRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

/// Model indices whose filter state changed while applying a result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub newly_filtered: Vec<usize>,
    pub newly_unfiltered: Vec<usize>,
}

impl FilterOutcome {
    /// Returns true if no index changed filter state.
    pub fn is_unchanged(&self) -> bool {
        self.newly_filtered.is_empty() && self.newly_unfiltered.is_empty()
    }
}

// =============================================================================
// Children Update
// =============================================================================

/// Fetches a range of children of the element at its path.
pub struct ChildrenUpdate {
    core: UpdateCore,
    provider: Arc<dyn ElementContentProvider>,
    range: Mutex<ChildRange>,
    elements: Mutex<Vec<Option<Element>>>,
    /// Set for fetches spawned by a child count to re-validate filtering.
    owner: Option<Weak<ChildCountUpdate>>,
}

impl ChildrenUpdate {
    pub(crate) fn new(
        core: UpdateCore,
        provider: Arc<dyn ElementContentProvider>,
        range: ChildRange,
    ) -> Arc<Self> {
        Arc::new(Self {
            core,
            provider,
            range: Mutex::new(range),
            elements: Mutex::new(vec![None; range.length]),
            owner: None,
        })
    }

    /// Creates the filter re-validation fetch for `owner`.
    ///
    /// The fetch is canceled together with its owner.
    pub(crate) fn nested(owner: &Arc<ChildCountUpdate>, range: ChildRange) -> Arc<Self> {
        Arc::new(Self {
            core: owner.core().derive(),
            provider: Arc::clone(owner.provider()),
            range: Mutex::new(range),
            elements: Mutex::new(vec![None; range.length]),
            owner: Some(Arc::downgrade(owner)),
        })
    }

    /// Returns the requested range.
    pub fn range(&self) -> ChildRange {
        *self.range.lock()
    }

    /// Returns the first requested model index.
    pub fn offset(&self) -> usize {
        self.range().offset
    }

    /// Returns the number of requested children.
    pub fn length(&self) -> usize {
        self.range().length
    }

    /// Records the child at model index `index`.
    pub fn set_child(&self, element: Element, index: usize) -> Result<(), UpdateError> {
        let range = self.range();
        if !range.contains(index) {
            return Err(UpdateError::InvalidRange {
                index,
                offset: range.offset,
                end: range.end(),
            });
        }
        let mut elements = self.elements.lock();
        let slot = index - range.offset;
        if slot >= elements.len() {
            elements.resize(slot + 1, None);
        }
        elements[slot] = Some(element);
        Ok(())
    }

    /// Returns the child recorded at model index `index`.
    pub fn child(&self, index: usize) -> Option<Element> {
        let offset = self.offset();
        index
            .checked_sub(offset)
            .and_then(|slot| self.elements.lock().get(slot).cloned().flatten())
    }

    /// Returns the recorded children with their model indices.
    pub fn children(&self) -> Vec<(usize, Element)> {
        let offset = self.offset();
        self.elements
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(slot, element)| element.clone().map(|e| (offset + slot, e)))
            .collect()
    }

    /// Returns true for a fetch spawned to re-validate filtering.
    pub fn is_nested(&self) -> bool {
        self.owner.is_some()
    }

    /// Completes the request. Calls after the first are ignored.
    pub fn done(self: &Arc<Self>) {
        UpdateRequest::from(Arc::clone(self)).done();
    }

    pub(crate) fn scheduling_path(&self) -> TreePath {
        self.element_path().clone()
    }

    pub(crate) fn same_request(&self, other: &Self) -> bool {
        self.viewer_input() == other.viewer_input()
            && self.element_path() == other.element_path()
            && self.range() == other.range()
    }

    pub(crate) fn coalesce(&self, other: &Arc<Self>) -> bool {
        if !same_provider(&self.provider, &other.provider)
            || self.viewer_input() != other.viewer_input()
            || self.element_path() != other.element_path()
        {
            return false;
        }
        let mut range = self.range.lock();
        let incoming = other.range();
        if !range.touches(&incoming) {
            return false;
        }
        let merged = range.merge(&incoming);
        if merged != *range {
            trace!(path = %self.element_path(), from = %*range, to = %merged, "Widening children range");
            *range = merged;
            *self.elements.lock() = vec![None; merged.length];
        }
        true
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
        self.provider.update_children(vec![Arc::clone(self)]);
    }

    /// Routes a finished nested fetch to the display thread; other fetches
    /// go to the batch.
    pub(crate) fn schedule_viewer_update(self: &Arc<Self>, shared: &ViewerShared) {
        match &self.owner {
            Some(owner) => {
                if let Some(owner) = owner.upgrade() {
                    shared.post(DisplayJob::FilterPass {
                        children: Arc::clone(self),
                        owner,
                    });
                }
            }
            None => shared.batch_done(UpdateRequest::Children(Arc::clone(self))),
        }
    }

    pub(crate) fn perform_update(&self, viewer: &mut TreeModelViewer) {
        let outcome = self.apply(viewer, false);
        if !outcome.is_unchanged() {
            trace!(
                path = %self.element_path(),
                filtered = outcome.newly_filtered.len(),
                unfiltered = outcome.newly_unfiltered.len(),
                "Filter state changed"
            );
        }
    }

    /// Reconciles the fetched children with the filter state.
    ///
    /// A filter-only pass records filter membership without touching the
    /// tree or the display.
    pub(crate) fn apply(&self, viewer: &mut TreeModelViewer, filter_only: bool) -> FilterOutcome {
        let parent = self.element_path().clone();
        let mut outcome = FilterOutcome::default();

        for (model, element) in self.children() {
            let transform = viewer.filter_transform();
            if viewer.should_filter(&parent, &element) {
                let view = transform.model_to_view_index(&parent, model);
                if transform.add_filtered_index(&parent, model) {
                    outcome.newly_filtered.push(model);
                    if let (false, Some(view)) = (filter_only, view) {
                        viewer.remove_child(&parent, view);
                    }
                }
                continue;
            }

            let unfiltered = transform.clear_index(&parent, model);
            if unfiltered {
                outcome.newly_unfiltered.push(model);
            }
            if filter_only {
                continue;
            }
            let Some(view) = transform.model_to_view_index(&parent, model) else {
                continue;
            };
            let applied = if unfiltered {
                viewer.insert_child(&parent, &element, view)
            } else {
                viewer.replace_child(&parent, &element, view)
            };
            if applied {
                let child = parent.child(element);
                viewer.update_has_children(&child);
                viewer.restore_pending_state(&child);
            }
        }

        if !filter_only {
            viewer.restore_pending_state(&parent);
        }
        outcome
    }
}

impl ViewerUpdate for ChildrenUpdate {
    fn core(&self) -> &UpdateCore {
        &self.core
    }
}

impl fmt::Debug for ChildrenUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildrenUpdate")
            .field("id", &self.core.id())
            .field("path", self.element_path())
            .field("range", &self.range())
            .field("nested", &self.is_nested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::test_support::{children_update, silent_provider};
    use proptest::prelude::*;

    #[test]
    fn test_adjacent_ranges_merge() {
        let provider = silent_provider();
        let a = children_update(&provider, &["t1"], 0, 2);
        let b = children_update(&provider, &["t1"], 2, 3);
        assert!(a.coalesce(&b));
        assert_eq!(a.range(), ChildRange::new(0, 5));
    }

    #[test]
    fn test_gap_prevents_merge() {
        let provider = silent_provider();
        let a = children_update(&provider, &["t1"], 0, 2);
        let b = children_update(&provider, &["t1"], 3, 1);
        assert!(!a.coalesce(&b));
        assert_eq!(a.range(), ChildRange::new(0, 2));
    }

    #[test]
    fn test_different_parents_do_not_merge() {
        let provider = silent_provider();
        let a = children_update(&provider, &["t1"], 0, 2);
        let b = children_update(&provider, &["t2"], 0, 2);
        assert!(!a.coalesce(&b));
    }

    #[test]
    fn test_set_child_rejects_out_of_range() {
        let update = children_update(&silent_provider(), &["t1"], 2, 2);
        assert!(update.set_child(Element::new("x"), 2).is_ok());
        assert!(update.set_child(Element::new("y"), 3).is_ok());
        let err = update.set_child(Element::new("z"), 4).unwrap_err();
        assert_eq!(
            err,
            UpdateError::InvalidRange {
                index: 4,
                offset: 2,
                end: 4
            }
        );
        assert_eq!(update.child(2), Some(Element::new("x")));
        assert_eq!(update.child(1), None);
        assert_eq!(update.children().len(), 2);
    }

    #[test]
    fn test_widening_discards_partial_results() {
        let provider = silent_provider();
        let a = children_update(&provider, &["t1"], 0, 1);
        let b = children_update(&provider, &["t1"], 1, 1);
        assert!(a.coalesce(&b));
        assert_eq!(a.length(), 2);
        assert!(a.children().is_empty());
    }

    proptest! {
        #[test]
        fn prop_touching_ranges_merge_to_cover_both(
            a in 0usize..200,
            n in 0usize..50,
            b in 0usize..200,
            m in 0usize..50,
        ) {
            let first = ChildRange::new(a, n);
            let second = ChildRange::new(b, m);
            prop_assume!(first.touches(&second));

            let merged = first.merge(&second);
            prop_assert_eq!(merged.offset, a.min(b));
            prop_assert_eq!(merged.end(), (a + n).max(b + m));
            prop_assert_eq!(merged, second.merge(&first));
        }

        #[test]
        fn prop_coalesced_request_covers_both_ranges(
            a in 0usize..100,
            n in 1usize..20,
            overlap in 0usize..20,
            m in 1usize..20,
        ) {
            let provider = silent_provider();
            let b = a + n - overlap.min(n);
            let first = children_update(&provider, &["p"], a, n);
            let second = children_update(&provider, &["p"], b, m);

            prop_assert!(first.coalesce(&second));
            prop_assert_eq!(first.range(), ChildRange::new(a.min(b), (a + n).max(b + m) - a.min(b)));
        }
    }
}
