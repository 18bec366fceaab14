//! Model change descriptions.
//!
//! A backing model that changes on its own (a debug target suspending,
//! threads coming and going) describes the change as a tree of
//! [`ModelDelta`]s. The root delta names the viewer input; each child delta
//! names one child of its parent delta's element and carries the flags saying
//! what happened to it.
//!
//! # Example
//!
//! ```ignore
//! use lazytree::model::{DeltaFlags, Element, ModelDelta};
//!
//! // thread-2 terminated, thread-0 suspended in a new frame
//! let delta = ModelDelta::new(Element::new("session"), DeltaFlags::NO_CHANGE)
//!     .with_child(ModelDelta::new(Element::new("thread-2"), DeltaFlags::REMOVED).with_index(2))
//!     .with_child(
//!         ModelDelta::new(Element::new("thread-0"), DeltaFlags::CONTENT | DeltaFlags::EXPAND)
//!             .with_child(ModelDelta::new(Element::new("frame-0"), DeltaFlags::SELECT)),
//!     );
//! ```

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::path::{Element, TreePath};

/// What changed about the element of a [`ModelDelta`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeltaFlags(u32);

impl DeltaFlags {
    /// Nothing changed at this element; only child deltas matter.
    pub const NO_CHANGE: DeltaFlags = DeltaFlags(0);

    /// The element was added to its parent; the parent's count is stale.
    pub const ADDED: DeltaFlags = DeltaFlags(1);

    /// The element was removed from its parent.
    pub const REMOVED: DeltaFlags = DeltaFlags(1 << 1);

    /// The element's children changed; its subtree is re-fetched.
    pub const CONTENT: DeltaFlags = DeltaFlags(1 << 2);

    /// Expand the element and its ancestors.
    pub const EXPAND: DeltaFlags = DeltaFlags(1 << 3);

    /// Select the element, expanding its ancestors.
    pub const SELECT: DeltaFlags = DeltaFlags(1 << 4);

    /// The element's label or has-children state changed.
    pub const STATE: DeltaFlags = DeltaFlags(1 << 5);

    /// The element was inserted at the delta's index.
    pub const INSERTED: DeltaFlags = DeltaFlags(1 << 6);

    /// The element at the delta's index was replaced by the replacement element.
    pub const REPLACED: DeltaFlags = DeltaFlags(1 << 7);

    const NAMES: [(DeltaFlags, &'static str); 8] = [
        (Self::ADDED, "ADDED"),
        (Self::REMOVED, "REMOVED"),
        (Self::CONTENT, "CONTENT"),
        (Self::EXPAND, "EXPAND"),
        (Self::SELECT, "SELECT"),
        (Self::STATE, "STATE"),
        (Self::INSERTED, "INSERTED"),
        (Self::REPLACED, "REPLACED"),
    ];

    /// Returns true if every flag in `other` is set.
    pub fn contains(self, other: DeltaFlags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for DeltaFlags {
    type Output = DeltaFlags;

    fn bitor(self, rhs: DeltaFlags) -> DeltaFlags {
        DeltaFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeltaFlags {
    fn bitor_assign(&mut self, rhs: DeltaFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for DeltaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NO_CHANGE");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(" | "))
    }
}

/// One node of a model change description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelDelta {
    element: Element,
    flags: DeltaFlags,
    index: Option<usize>,
    child_count: Option<usize>,
    replacement: Option<Element>,
    children: Vec<ModelDelta>,
}

impl ModelDelta {
    pub fn new(element: Element, flags: DeltaFlags) -> Self {
        Self {
            element,
            flags,
            index: None,
            child_count: None,
            replacement: None,
            children: Vec::new(),
        }
    }

    /// Sets the element's model index within its parent.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the element's new model child count.
    pub fn with_child_count(mut self, count: usize) -> Self {
        self.child_count = Some(count);
        self
    }

    /// Sets the element that replaces this one (with [`DeltaFlags::REPLACED`]).
    pub fn with_replacement(mut self, element: Element) -> Self {
        self.replacement = Some(element);
        self
    }

    pub fn with_child(mut self, child: ModelDelta) -> Self {
        self.children.push(child);
        self
    }

    /// Appends a child delta and returns it for further nesting.
    pub fn add_child(&mut self, element: Element, flags: DeltaFlags) -> &mut ModelDelta {
        self.children.push(ModelDelta::new(element, flags));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn flags(&self) -> DeltaFlags {
        self.flags
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn child_count(&self) -> Option<usize> {
        self.child_count
    }

    pub fn replacement(&self) -> Option<&Element> {
        self.replacement.as_ref()
    }

    pub fn children(&self) -> &[ModelDelta] {
        &self.children
    }

    /// Finds the delta for `path` below this (root) delta.
    pub fn find(&self, path: &TreePath) -> Option<&ModelDelta> {
        let mut current = self;
        for segment in path.segments() {
            current = current.children.iter().find(|child| &child.element == segment)?;
        }
        Some(current)
    }

    /// Number of deltas in this tree, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ModelDelta::node_count).sum::<usize>()
    }
}
