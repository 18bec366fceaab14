//! lazytree - Asynchronous update engine for lazily populated tree viewers
//!
//! A [`TreeModelViewer`] shows a tree whose content lives behind slow,
//! asynchronous providers (a debugger asking a target for threads, frames and
//! variables is the typical host). The viewer only asks for what is visible:
//! revealing an item schedules update requests, the [`scheduler`] coalesces
//! sibling requests into batches and serializes work per tree path, providers
//! answer on any thread, and finished requests are applied to the shadow tree
//! on the thread driving the viewer.
//!
//! # Modules
//!
//! - [`model`]: elements, tree paths, model deltas and the presentation context
//! - [`update`]: update request variants and their lifecycle
//! - [`provider`]: the provider contracts hosts implement
//! - [`scheduler`]: coalescing queue and per-path serialization
//! - [`filter`]: model/view index translation for filtered children
//! - [`vtree`]: the shadow tree of realized items
//! - [`viewer`]: the viewer tying it together
//! - [`config`] and [`logging`]: settings file and tracing setup

pub(crate) mod batch;
pub mod config;
pub mod display;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod telemetry;
pub mod update;
pub mod viewer;
pub mod vtree;

pub use config::{ConfigError, Settings, ViewerConfig};
pub use display::{NullDisplay, TreeDisplay};
pub use error::UpdateError;
pub use logging::{init_logging, LoggingConfig, LoggingError};
pub use model::{DeltaFlags, Element, ModelDelta, PresentationContext, TreePath};
pub use provider::{
    ElementContentProvider, ElementFilter, ElementLabelProvider, ElementMementoProvider,
    ElementModel, ModelAdapters, SpawningContentProvider, UniformAdapters, ViewerInputProvider,
};
pub use telemetry::MetricsSnapshot;
pub use update::{LabelData, PendingState, UpdateKind, UpdateRequest, ViewerUpdate};
pub use viewer::{ModelProxy, TreeModelViewer, ViewerUpdateListener};
