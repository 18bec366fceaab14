//! Provider-side contracts.
//!
//! Providers answer batches of same-kind update requests. They may answer on
//! any thread, in any order, and must call `done()` on every request they
//! receive, including the ones they fail or find canceled.
//!
//! # Example
//!
//! ```ignore
//! use lazytree::provider::{ElementContentProvider, UniformAdapters};
//! use lazytree::update::{ChildCountUpdate, ChildrenUpdate, HasChildrenUpdate};
//!
//! struct Fixed;
//!
//! impl ElementContentProvider for Fixed {
//!     fn update_has_children(&self, updates: Vec<Arc<HasChildrenUpdate>>) {
//!         for update in updates {
//!             update.set_has_children(false);
//!             update.done();
//!         }
//!     }
//!     // ...
//! }
//!
//! let adapters = UniformAdapters::new(Arc::new(Fixed));
//! ```

mod spawning;

pub use spawning::{ElementModel, SpawningContentProvider};

use std::sync::Arc;

use crate::model::{Element, TreePath};
use crate::update::{
    ChildCountUpdate, ChildrenUpdate, HasChildrenUpdate, LabelUpdate, MementoUpdate,
    ViewerInputUpdate,
};

// =============================================================================
// Provider Traits
// =============================================================================

/// Answers structural questions about elements.
pub trait ElementContentProvider: Send + Sync + 'static {
    /// Answers whether each element has children.
    fn update_has_children(&self, updates: Vec<Arc<HasChildrenUpdate>>);

    /// Answers the model child count of each element.
    fn update_child_count(&self, updates: Vec<Arc<ChildCountUpdate>>);

    /// Answers a range of children of each parent element.
    fn update_children(&self, updates: Vec<Arc<ChildrenUpdate>>);
}

/// Answers label requests.
pub trait ElementLabelProvider: Send + Sync + 'static {
    fn update_labels(&self, updates: Vec<Arc<LabelUpdate>>);
}

/// Encodes and compares opaque element mementos for state restore.
pub trait ElementMementoProvider: Send + Sync + 'static {
    /// Produces a memento for each element.
    fn encode_elements(&self, updates: Vec<Arc<MementoUpdate>>);

    /// Reports whether each element matches the memento it carries.
    fn compare_elements(&self, updates: Vec<Arc<MementoUpdate>>);
}

/// Resolves the viewer input for a source element.
pub trait ViewerInputProvider: Send + Sync + 'static {
    fn update_input(&self, update: Arc<ViewerInputUpdate>);
}

/// Decides which children are shown.
///
/// Filtering runs on the display thread while results are applied.
pub trait ElementFilter: Send + Sync + 'static {
    /// Returns true to show `element` under `parent`.
    fn select(&self, parent: &TreePath, element: &Element) -> bool;

    /// Returns true if this filter may reject children of `parent`.
    ///
    /// When no installed filter applies to a parent, its child count is
    /// reported without fetching the children first.
    fn is_applicable(&self, _parent: &TreePath) -> bool {
        true
    }
}

// =============================================================================
// Adapter Resolution
// =============================================================================

/// Resolves the providers responsible for an element.
pub trait ModelAdapters: Send + Sync + 'static {
    /// Returns the content provider for `element`.
    fn content_provider(&self, element: &Element) -> Option<Arc<dyn ElementContentProvider>>;

    /// Returns the label provider for `element`.
    ///
    /// Without one, an element is labeled with its name.
    fn label_provider(&self, _element: &Element) -> Option<Arc<dyn ElementLabelProvider>> {
        None
    }

    /// Returns the memento provider for `element`.
    fn memento_provider(&self, _element: &Element) -> Option<Arc<dyn ElementMementoProvider>> {
        None
    }

    /// Returns the viewer input provider for `element`.
    fn input_provider(&self, _element: &Element) -> Option<Arc<dyn ViewerInputProvider>> {
        None
    }
}

/// Adapters that answer every element with the same providers.
#[derive(Clone, Default)]
pub struct UniformAdapters {
    content: Option<Arc<dyn ElementContentProvider>>,
    label: Option<Arc<dyn ElementLabelProvider>>,
    memento: Option<Arc<dyn ElementMementoProvider>>,
    input: Option<Arc<dyn ViewerInputProvider>>,
}

impl UniformAdapters {
    /// Creates adapters backed by a single content provider.
    pub fn new(content: Arc<dyn ElementContentProvider>) -> Self {
        Self {
            content: Some(content),
            ..Self::default()
        }
    }

    /// Adds a label provider.
    pub fn with_label_provider(mut self, provider: Arc<dyn ElementLabelProvider>) -> Self {
        self.label = Some(provider);
        self
    }

    /// Adds a memento provider.
    pub fn with_memento_provider(mut self, provider: Arc<dyn ElementMementoProvider>) -> Self {
        self.memento = Some(provider);
        self
    }

    /// Adds a viewer input provider.
    pub fn with_input_provider(mut self, provider: Arc<dyn ViewerInputProvider>) -> Self {
        self.input = Some(provider);
        self
    }
}

impl ModelAdapters for UniformAdapters {
    fn content_provider(&self, _element: &Element) -> Option<Arc<dyn ElementContentProvider>> {
        self.content.clone()
    }

    fn label_provider(&self, _element: &Element) -> Option<Arc<dyn ElementLabelProvider>> {
        self.label.clone()
    }

    fn memento_provider(&self, _element: &Element) -> Option<Arc<dyn ElementMementoProvider>> {
        self.memento.clone()
    }

    fn input_provider(&self, _element: &Element) -> Option<Arc<dyn ViewerInputProvider>> {
        self.input.clone()
    }
}

/// Returns true if two provider handles denote the same provider instance.
pub(crate) fn same_provider<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
