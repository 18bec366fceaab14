//! Content provider backed by an async model.
//!
//! [`SpawningContentProvider`] adapts an [`ElementModel`] (plain async
//! queries) to the provider contract: every request of a batch is answered
//! on its own tokio task, so answers arrive on worker threads in any order.
//! A request canceled while its query runs completes without a result.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{ElementContentProvider, ElementLabelProvider};
use crate::error::UpdateError;
use crate::model::{Element, TreePath};
use crate::update::{
    ChildCountUpdate, ChildrenUpdate, HasChildrenUpdate, LabelData, LabelUpdate, ViewerUpdate,
};

/// Async queries against a backing model.
///
/// Paths are relative to the viewer input; the root path denotes the input.
pub trait ElementModel: Send + Sync + 'static {
    /// Returns the number of children of the element at `path`.
    fn child_count<'a>(&'a self, path: &'a TreePath) -> BoxFuture<'a, Result<usize, UpdateError>>;

    /// Returns up to `length` children of `path` starting at model index `offset`.
    fn children<'a>(
        &'a self,
        path: &'a TreePath,
        offset: usize,
        length: usize,
    ) -> BoxFuture<'a, Result<Vec<Element>, UpdateError>>;

    /// Returns true if the element at `path` has children.
    fn has_children<'a>(&'a self, path: &'a TreePath) -> BoxFuture<'a, Result<bool, UpdateError>> {
        Box::pin(async move { self.child_count(path).await.map(|count| count > 0) })
    }

    /// Returns the label of the element at `path`; its name by default.
    fn label<'a>(&'a self, path: &'a TreePath) -> BoxFuture<'a, Result<LabelData, UpdateError>> {
        let name = path
            .last_segment()
            .map(|element| element.name().to_string())
            .unwrap_or_default();
        Box::pin(async move { Ok(LabelData::text(name)) })
    }
}

/// Answers content and label requests from an [`ElementModel`] on tokio tasks.
pub struct SpawningContentProvider<M> {
    model: Arc<M>,
    runtime: Handle,
}

impl<M: ElementModel> SpawningContentProvider<M> {
    /// Creates a provider spawning its tasks on `runtime`.
    pub fn new(model: Arc<M>, runtime: Handle) -> Self {
        Self { model, runtime }
    }

    /// Creates a provider on the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn on_current_runtime(model: Arc<M>) -> Self {
        Self::new(model, Handle::current())
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }
}

/// Runs `query` unless `cancel` fires first.
async fn unless_canceled<T>(
    cancel: CancellationToken,
    query: BoxFuture<'_, Result<T, UpdateError>>,
) -> Option<Result<T, UpdateError>> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => None,
        result = query => Some(result),
    }
}

impl<M: ElementModel> ElementContentProvider for SpawningContentProvider<M> {
    fn update_has_children(&self, updates: Vec<Arc<HasChildrenUpdate>>) {
        for update in updates {
            let model = Arc::clone(&self.model);
            self.runtime.spawn(async move {
                let cancel = update.core().cancellation();
                match unless_canceled(cancel, model.has_children(update.element_path())).await {
                    Some(Ok(has_children)) => update.set_has_children(has_children),
                    Some(Err(e)) => update.set_error(e),
                    None => trace!(path = %update.element_path(), "Has-children canceled"),
                }
                update.done();
            });
        }
    }

    fn update_child_count(&self, updates: Vec<Arc<ChildCountUpdate>>) {
        for update in updates {
            let model = Arc::clone(&self.model);
            self.runtime.spawn(async move {
                let cancel = update.core().cancellation();
                match unless_canceled(cancel, model.child_count(update.element_path())).await {
                    Some(Ok(count)) => update.set_child_count(count),
                    Some(Err(e)) => update.set_error(e),
                    None => trace!(path = %update.element_path(), "Child count canceled"),
                }
                update.done();
            });
        }
    }

    fn update_children(&self, updates: Vec<Arc<ChildrenUpdate>>) {
        for update in updates {
            let model = Arc::clone(&self.model);
            self.runtime.spawn(async move {
                let cancel = update.core().cancellation();
                let range = update.range();
                let query = model.children(update.element_path(), range.offset, range.length);
                match unless_canceled(cancel, query).await {
                    Some(Ok(children)) => {
                        for (index, element) in (range.offset..).zip(children) {
                            if let Err(e) = update.set_child(element, index) {
                                update.set_error(e);
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => update.set_error(e),
                    None => trace!(path = %update.element_path(), "Children canceled"),
                }
                update.done();
            });
        }
    }
}

impl<M: ElementModel> ElementLabelProvider for SpawningContentProvider<M> {
    fn update_labels(&self, updates: Vec<Arc<LabelUpdate>>) {
        for update in updates {
            let model = Arc::clone(&self.model);
            self.runtime.spawn(async move {
                let cancel = update.core().cancellation();
                match unless_canceled(cancel, model.label(update.element_path())).await {
                    Some(Ok(label)) => apply_label(&update, label),
                    Some(Err(e)) => update.set_error(e),
                    None => trace!(path = %update.element_path(), "Label canceled"),
                }
                update.done();
            });
        }
    }
}

fn apply_label(update: &LabelUpdate, label: LabelData) {
    for (column, data) in label.columns.into_iter().enumerate() {
        if let Some(text) = data.text {
            update.set_label(text, column);
        }
        if let Some(image) = data.image {
            update.set_image(image, column);
        }
        if let Some(font) = data.font {
            update.set_font(font, column);
        }
        if let Some(color) = data.foreground {
            update.set_foreground(color, column);
        }
        if let Some(color) = data.background {
            update.set_background(color, column);
        }
    }
    update.set_checked(label.checked, label.grayed);
}
