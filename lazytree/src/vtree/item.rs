//! Shadow tree items.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::model::Element;
use crate::update::LabelData;

/// Identity of an item in the shadow tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) u64);

/// Arbitrary values a host attaches to an item.
///
/// # Example
///
/// ```ignore
/// let mut data = ItemData::new();
/// data.set("memento", vec![1u8, 2, 3]);
/// let memento: &Vec<u8> = data.get("memento").unwrap();
/// ```
#[derive(Default)]
pub struct ItemData {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl ItemData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing any value under the same key.
    pub fn set<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_string(), Box::new(value));
    }

    /// Returns the value under `key` if it has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ItemData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// A node of the shadow tree.
///
/// Children are sparse: only view indices the viewer has materialized have an
/// item. `item_count` is the number of visible children once known.
#[derive(Debug)]
pub struct VirtualItem {
    pub(crate) parent: Option<ItemId>,
    pub(crate) index: usize,
    pub(crate) children: BTreeMap<usize, ItemId>,
    pub(crate) item_count: Option<usize>,
    pub(crate) data: Option<Element>,
    pub(crate) expanded: bool,
    pub(crate) has_items: bool,
    pub(crate) needs_data: bool,
    pub(crate) needs_label: bool,
    pub(crate) needs_count: bool,
    pub(crate) label: Option<LabelData>,
    pub(crate) item_data: ItemData,
}

impl VirtualItem {
    pub(crate) fn new(parent: Option<ItemId>, index: usize) -> Self {
        Self {
            parent,
            index,
            children: BTreeMap::new(),
            item_count: None,
            data: None,
            expanded: false,
            has_items: false,
            needs_data: true,
            needs_label: true,
            needs_count: false,
            label: None,
            item_data: ItemData::new(),
        }
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    /// View index under the parent.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of visible children, once known.
    pub fn item_count(&self) -> Option<usize> {
        self.item_count
    }

    /// The element shown by this item, once realized.
    pub fn data(&self) -> Option<&Element> {
        self.data.as_ref()
    }

    /// Returns true once the item's element has been fetched.
    pub fn is_realized(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn has_items(&self) -> bool {
        self.has_items
    }

    pub fn needs_data(&self) -> bool {
        self.needs_data
    }

    pub fn needs_label(&self) -> bool {
        self.needs_label
    }

    pub fn needs_count(&self) -> bool {
        self.needs_count
    }

    pub fn label(&self) -> Option<&LabelData> {
        self.label.as_ref()
    }

    /// Materialized children by view index.
    pub fn children(&self) -> impl Iterator<Item = (usize, ItemId)> + '_ {
        self.children.iter().map(|(index, id)| (*index, *id))
    }

    pub fn child(&self, index: usize) -> Option<ItemId> {
        self.children.get(&index).copied()
    }

    pub fn item_data(&self) -> &ItemData {
        &self.item_data
    }

    pub fn item_data_mut(&mut self) -> &mut ItemData {
        &mut self.item_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_data_typed_access() {
        let mut data = ItemData::new();
        data.set("count", 5usize);
        data.set("name", String::from("frame"));

        assert_eq!(data.get::<usize>("count"), Some(&5));
        assert_eq!(data.get::<String>("name").map(String::as_str), Some("frame"));
        assert_eq!(data.get::<u32>("count"), None);
        assert!(data.remove("count"));
        assert!(!data.contains("count"));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_new_item_needs_data_and_label() {
        let item = VirtualItem::new(None, 0);
        assert!(item.needs_data());
        assert!(item.needs_label());
        assert!(!item.needs_count());
        assert!(!item.is_realized());
    }
}
