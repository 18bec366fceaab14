//! Elements and tree paths.

use std::fmt;
use std::sync::Arc;

/// An opaque model object.
///
/// Elements are compared by name, so two handles created from the same name
/// denote the same model object. Cloning is a reference count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(Arc<str>);

impl Element {
    /// Creates an element with the given identity.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the identity of this element.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({})", self.0)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Element {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Ordered sequence of elements from the viewer input down to a node.
///
/// The viewer input itself is not part of the path: the empty path denotes
/// the root of the tree.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    segments: Vec<Element>,
}

impl TreePath {
    /// The path of the root node.
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a path from its segments.
    pub fn new(segments: Vec<Element>) -> Self {
        Self { segments }
    }

    /// Builds a path from segment names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: names.into_iter().map(Element::new).collect(),
        }
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the segments of this path.
    pub fn segments(&self) -> &[Element] {
        &self.segments
    }

    /// Returns the last segment, or `None` for the root path.
    pub fn last_segment(&self) -> Option<&Element> {
        self.segments.last()
    }

    /// Returns the path of the parent node.
    ///
    /// The parent of the root path is the root path.
    pub fn parent_path(&self) -> TreePath {
        let end = self.segments.len().saturating_sub(1);
        Self {
            segments: self.segments[..end].to_vec(),
        }
    }

    /// Returns the path of a child of this node.
    pub fn child(&self, element: Element) -> TreePath {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(element);
        Self { segments }
    }

    /// Returns true if `prefix` is an ancestor of this path or equal to it.
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Returns true if one path is a prefix of the other.
    ///
    /// Overlapping paths denote the same subtree region for scheduling.
    pub fn overlaps(&self, other: &TreePath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Debug for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreePath({})", self)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromIterator<Element> for TreePath {
    fn from_iter<T: IntoIterator<Item = Element>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(names: &[&str]) -> TreePath {
        TreePath::from_names(names.iter().copied())
    }

    #[test]
    fn test_element_identity_by_name() {
        assert_eq!(Element::new("x"), Element::from("x"));
        assert_ne!(Element::new("x"), Element::new("y"));
        assert_eq!(Element::new("frame").name(), "frame");
    }

    #[test]
    fn test_parent_and_child() {
        let p = path(&["a", "b"]);
        assert_eq!(p.parent_path(), path(&["a"]));
        assert_eq!(p.parent_path().child(Element::new("b")), p);
        assert_eq!(p.last_segment(), Some(&Element::new("b")));
    }

    #[test]
    fn test_root_parent_is_root() {
        assert!(TreePath::root().parent_path().is_root());
        assert_eq!(TreePath::root().last_segment(), None);
    }

    #[test]
    fn test_starts_with() {
        let p = path(&["a", "b", "c"]);
        assert!(p.starts_with(&TreePath::root()));
        assert!(p.starts_with(&path(&["a", "b"])));
        assert!(p.starts_with(&p));
        assert!(!p.starts_with(&path(&["a", "c"])));
        assert!(!path(&["a"]).starts_with(&p));
    }

    #[test]
    fn test_overlaps_is_symmetric_prefix_relation() {
        let a = path(&["a"]);
        let ab = path(&["a", "b"]);
        let ac = path(&["a", "c"]);
        assert!(a.overlaps(&ab));
        assert!(ab.overlaps(&a));
        assert!(!ab.overlaps(&ac));
        assert!(TreePath::root().overlaps(&ac));
    }

    #[test]
    fn test_display() {
        assert_eq!(TreePath::root().to_string(), "/");
        assert_eq!(path(&["t1", "f0"]).to_string(), "/t1/f0");
    }
}
