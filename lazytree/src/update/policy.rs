//! Update scheduling priority.
//!
//! Priorities only order requests competing for related tree regions: the
//! scheduler starts waiting requests in priority order, so a has-children
//! answer resolves before the child count is requested, and the count before
//! the children themselves.
//!
//! # Example
//!
//! ```ignore
//! use lazytree::update::Priority;
//!
//! assert!(Priority::HAS_CHILDREN.runs_before(Priority::CHILD_COUNT));
//! assert!(Priority::CHILD_COUNT.runs_before(Priority::CHILDREN));
//! ```

use std::fmt;

// =============================================================================
// Priority Constants
// =============================================================================

/// Priority value for navigation and input resolution.
pub const PRIORITY_NAVIGATE: u8 = 0;

/// Priority value for has-children requests.
pub const PRIORITY_HAS_CHILDREN: u8 = 1;

/// Priority value for child-count requests.
pub const PRIORITY_CHILD_COUNT: u8 = 2;

/// Priority value for children requests.
pub const PRIORITY_CHILDREN: u8 = 3;

/// Priority value for label requests.
pub const PRIORITY_LABEL: u8 = 4;

/// Priority value for memento encode/compare requests.
pub const PRIORITY_MEMENTO: u8 = 5;

/// Update scheduling priority.
///
/// Lower values run first. Requests with equal priority run in the order they
/// were created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    /// Navigation and viewer-input resolution; runs ahead of everything else.
    pub const NAVIGATE: Priority = Priority(PRIORITY_NAVIGATE);

    /// Has-children requests.
    pub const HAS_CHILDREN: Priority = Priority(PRIORITY_HAS_CHILDREN);

    /// Child-count requests.
    pub const CHILD_COUNT: Priority = Priority(PRIORITY_CHILD_COUNT);

    /// Children requests.
    pub const CHILDREN: Priority = Priority(PRIORITY_CHILDREN);

    /// Label requests.
    pub const LABEL: Priority = Priority(PRIORITY_LABEL);

    /// Memento requests used by state restore.
    pub const MEMENTO: Priority = Priority(PRIORITY_MEMENTO);

    /// Returns the numeric priority value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Returns true if a request with this priority starts before `other`.
    pub fn runs_before(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NAVIGATE => write!(f, "Navigate(0)"),
            Self::HAS_CHILDREN => write!(f, "HasChildren(1)"),
            Self::CHILD_COUNT => write!(f, "ChildCount(2)"),
            Self::CHILDREN => write!(f, "Children(3)"),
            Self::LABEL => write!(f, "Label(4)"),
            Self::MEMENTO => write!(f, "Memento(5)"),
            Self(v) => write!(f, "Priority({})", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_constants() {
        assert_eq!(Priority::NAVIGATE.value(), PRIORITY_NAVIGATE);
        assert_eq!(Priority::HAS_CHILDREN.value(), PRIORITY_HAS_CHILDREN);
        assert_eq!(Priority::CHILD_COUNT.value(), PRIORITY_CHILD_COUNT);
        assert_eq!(Priority::CHILDREN.value(), PRIORITY_CHILDREN);
    }

    #[test]
    fn test_structural_requests_resolve_top_down() {
        assert!(Priority::NAVIGATE.runs_before(Priority::HAS_CHILDREN));
        assert!(Priority::HAS_CHILDREN.runs_before(Priority::CHILD_COUNT));
        assert!(Priority::CHILD_COUNT.runs_before(Priority::CHILDREN));
        assert!(!Priority::CHILDREN.runs_before(Priority::CHILDREN));
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(format!("{}", Priority::CHILD_COUNT), "ChildCount(2)");
        assert_eq!(format!("{}", Priority(9)), "Priority(9)");
    }
}
