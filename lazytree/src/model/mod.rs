//! Model-side identity types.
//!
//! The engine never interprets the backing model. Everything it knows about a
//! node is an opaque [`Element`] and the [`TreePath`] leading to it from the
//! viewer input.
//!
//! # Example
//!
//! ```ignore
//! use lazytree::model::{Element, TreePath};
//!
//! let thread = Element::new("thread-1");
//! let frame = Element::new("frame-0");
//! let path = TreePath::root().child(thread).child(frame);
//!
//! assert_eq!(path.len(), 2);
//! assert!(path.starts_with(&path.parent_path()));
//! ```

mod context;
mod delta;
mod path;

pub use context::PresentationContext;
pub use delta::{DeltaFlags, ModelDelta};
pub use path::{Element, TreePath};
