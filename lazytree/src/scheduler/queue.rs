//! Priority queue of waiting updates.
//!
//! Updates are ordered by priority (lower values first), then by creation
//! order (FIFO within the same priority). Update ids come from a global
//! sequence, so they double as the FIFO key.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::model::TreePath;
use crate::update::{Priority, UpdateKind, UpdateRequest};

// =============================================================================
// Waiting Update
// =============================================================================

/// An update that has been scheduled but not started.
pub struct WaitingUpdate {
    pub update: UpdateRequest,
    pub priority: Priority,
}

impl WaitingUpdate {
    pub fn new(update: UpdateRequest) -> Self {
        Self {
            priority: update.priority(),
            update,
        }
    }
}

impl std::fmt::Debug for WaitingUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitingUpdate")
            .field("update", &self.update)
            .field("priority", &self.priority)
            .finish()
    }
}

impl PartialEq for WaitingUpdate {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.update.id() == other.update.id()
    }
}

impl Eq for WaitingUpdate {}

impl PartialOrd for WaitingUpdate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WaitingUpdate {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: the lowest priority value and the oldest
        // id must compare greatest.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.update.id().cmp(&self.update.id()))
    }
}

// =============================================================================
// Update Queue
// =============================================================================

/// Waiting updates in start order.
#[derive(Default)]
pub struct UpdateQueue {
    heap: BinaryHeap<WaitingUpdate>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, update: UpdateRequest) {
        self.heap.push(WaitingUpdate::new(update));
    }

    /// Puts back an update taken out by [`drain_ordered`](Self::drain_ordered).
    pub fn requeue(&mut self, waiting: WaitingUpdate) {
        self.heap.push(waiting);
    }

    /// Removes and returns the next update to start.
    pub fn pop(&mut self) -> Option<WaitingUpdate> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&WaitingUpdate> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Offers `update` to each waiting update; returns true once one absorbs it.
    pub fn coalesce(&self, update: &UpdateRequest) -> bool {
        self.heap
            .iter()
            .any(|waiting| waiting.update.coalesce(update))
    }

    /// Drains the queue in start order.
    pub fn drain_ordered(&mut self) -> Vec<WaitingUpdate> {
        let mut ordered = std::mem::take(&mut self.heap).into_sorted_vec();
        ordered.reverse();
        ordered
    }

    /// Cancels waiting updates under `prefix` and drops those now fully canceled.
    ///
    /// Returns the number of updates dropped.
    pub fn cancel_within(&mut self, prefix: &TreePath) -> usize {
        let before = self.heap.len();
        let remaining: Vec<_> = self
            .heap
            .drain()
            .filter(|waiting| !waiting.update.cancel_within(prefix))
            .collect();
        self.heap = BinaryHeap::from(remaining);
        before - self.heap.len()
    }

    /// Returns true if a waiting update of `kind` covers `path` (and `index`).
    pub fn targets(&self, kind: UpdateKind, path: &TreePath, index: Option<usize>) -> bool {
        self.heap
            .iter()
            .any(|waiting| waiting.update.targets(kind, path, index))
    }

    /// Returns an iterator over waiting updates in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &WaitingUpdate> {
        self.heap.iter()
    }

    /// Returns the number of waiting updates of each kind.
    pub fn kind_counts(&self) -> HashMap<UpdateKind, usize> {
        let mut counts = HashMap::new();
        for waiting in self.heap.iter() {
            *counts.entry(waiting.update.kind()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::test_support::{
        child_count_update, children_update, has_children_update, silent_provider,
    };

    #[test]
    fn test_pops_by_priority_then_fifo() {
        let provider = silent_provider();
        let mut queue = UpdateQueue::new();
        let children: UpdateRequest = children_update(&provider, &["a"], 0, 1).into();
        let count: UpdateRequest = child_count_update(&provider, &["a"]).into();
        let has_b: UpdateRequest = has_children_update(&provider, &["b"]).into();
        let has_c: UpdateRequest = has_children_update(&provider, &["x", "c"]).into();

        queue.push(children.clone());
        queue.push(count.clone());
        queue.push(has_b.clone());
        queue.push(has_c.clone());

        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|w| w.update.id())
            .collect();
        assert_eq!(order, vec![has_b.id(), has_c.id(), count.id(), children.id()]);
    }

    #[test]
    fn test_drain_ordered_matches_pop_order() {
        let provider = silent_provider();
        let mut queue = UpdateQueue::new();
        let children: UpdateRequest = children_update(&provider, &["a"], 0, 1).into();
        let has: UpdateRequest = has_children_update(&provider, &["b"]).into();
        queue.push(children.clone());
        queue.push(has.clone());

        let drained: Vec<_> = queue.drain_ordered().into_iter().map(|w| w.update.id()).collect();
        assert_eq!(drained, vec![has.id(), children.id()]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_coalesce_and_kind_counts() {
        let provider = silent_provider();
        let mut queue = UpdateQueue::new();
        queue.push(has_children_update(&provider, &["p", "a"]).into());

        let sibling: UpdateRequest = has_children_update(&provider, &["p", "b"]).into();
        assert!(queue.coalesce(&sibling));
        let unrelated: UpdateRequest = child_count_update(&provider, &["p", "b"]).into();
        assert!(!queue.coalesce(&unrelated));
        queue.push(unrelated);

        let counts = queue.kind_counts();
        assert_eq!(counts.get(&UpdateKind::HasChildren), Some(&1));
        assert_eq!(counts.get(&UpdateKind::ChildCount), Some(&1));
        assert!(queue.targets(UpdateKind::HasChildren, &TreePath::from_names(["p", "b"]), None));
    }

    #[test]
    fn test_cancel_within_drops_fully_canceled() {
        let provider = silent_provider();
        let mut queue = UpdateQueue::new();
        queue.push(child_count_update(&provider, &["a", "x"]).into());
        queue.push(child_count_update(&provider, &["b", "y"]).into());

        assert_eq!(queue.cancel_within(&TreePath::from_names(["a"])), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.peek().map(|w| w.update.element_path().clone()),
            Some(TreePath::from_names(["b", "y"]))
        );
    }
}
