//! Viewer state reachable from provider threads.
//!
//! Updates hold a weak reference to this state. Everything here is safe to
//! touch from any thread; the shadow tree and the scheduler stay with the
//! display loop in [`TreeModelViewer`](super::TreeModelViewer).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::listener::ViewerUpdateListener;
use crate::batch::Batch;
use crate::display::DisplayJob;
use crate::filter::FilterTransform;
use crate::model::{Element, TreePath};
use crate::provider::ElementFilter;
use crate::telemetry::UpdateMetrics;
use crate::update::{ChildRange, UpdateId, UpdateRequest};

pub(crate) struct ViewerShared {
    batch: Batch,
    display_tx: mpsc::UnboundedSender<DisplayJob>,
    filters: RwLock<Vec<Arc<dyn ElementFilter>>>,
    transform: FilterTransform,
    in_progress: Mutex<Vec<UpdateRequest>>,
    listeners: RwLock<Vec<Arc<dyn ViewerUpdateListener>>>,
    disposed: AtomicBool,
    metrics: Arc<UpdateMetrics>,
}

impl ViewerShared {
    pub(crate) fn new(
        display_tx: mpsc::UnboundedSender<DisplayJob>,
        metrics: Arc<UpdateMetrics>,
    ) -> Self {
        Self {
            batch: Batch::new(display_tx.clone()),
            display_tx,
            filters: RwLock::new(Vec::new()),
            transform: FilterTransform::new(),
            in_progress: Mutex::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            disposed: AtomicBool::new(false),
            metrics,
        }
    }

    pub(crate) fn metrics(&self) -> &UpdateMetrics {
        &self.metrics
    }

    pub(crate) fn transform(&self) -> &FilterTransform {
        &self.transform
    }

    /// Posts a job to the display loop.
    pub(crate) fn post(&self, job: DisplayJob) {
        if self.display_tx.send(job).is_err() {
            debug!("Display queue closed; dropping job");
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Registers a starting update with the batch and the listeners.
    pub(crate) fn update_started(&self, update: &UpdateRequest) {
        self.batch.batch(update);
        let first = {
            let mut in_progress = self.in_progress.lock();
            in_progress.push(update.clone());
            in_progress.len() == 1
        };
        let listeners = self.listeners.read().clone();
        if first {
            for listener in &listeners {
                listener.updates_begin();
            }
        }
        for listener in &listeners {
            listener.update_started(update);
        }
        self.metrics.update_started();
    }

    /// Hands a finished update to the batch.
    pub(crate) fn batch_done(&self, update: UpdateRequest) {
        self.batch.done(update);
    }

    /// Forgets a cleaned-up update and notifies the listeners.
    pub(crate) fn update_complete(&self, update: &UpdateRequest) {
        let (removed, idle) = {
            let mut in_progress = self.in_progress.lock();
            let before = in_progress.len();
            in_progress.retain(|u| u.id() != update.id());
            (in_progress.len() != before, in_progress.is_empty())
        };
        if !removed {
            warn!(id = %update.id(), "Completed update was not in progress");
            return;
        }

        if update.is_canceled() {
            self.metrics.update_canceled();
        } else if update.status().is_err() {
            self.metrics.update_failed();
        } else {
            self.metrics.update_completed();
        }

        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.update_complete(update);
        }
        if idle {
            for listener in &listeners {
                listener.updates_complete();
            }
        }
    }

    /// Cancels in-flight updates targeting `prefix` or below, except `keep`.
    pub(crate) fn cancel_in_progress_except(&self, prefix: &TreePath, keep: Option<UpdateId>) -> usize {
        let in_progress = self.in_progress.lock().clone();
        let mut canceled = 0;
        for update in in_progress {
            if Some(update.id()) == keep {
                continue;
            }
            if update.element_path().starts_with(prefix) && !update.is_canceled() {
                update.core().cancel();
                canceled += 1;
            }
        }
        canceled
    }

    pub(crate) fn in_progress(&self) -> Vec<UpdateRequest> {
        self.in_progress.lock().clone()
    }

    pub(crate) fn in_progress_count(&self) -> usize {
        self.in_progress.lock().len()
    }

    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    pub(crate) fn add_listener(&self, listener: Arc<dyn ViewerUpdateListener>) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn remove_listener(&self, listener: &Arc<dyn ViewerUpdateListener>) {
        self.listeners
            .write()
            .retain(|l| !crate::provider::same_provider(l, listener));
    }

    // -------------------------------------------------------------------------
    // Filtering
    // -------------------------------------------------------------------------

    pub(crate) fn set_filters(&self, filters: Vec<Arc<dyn ElementFilter>>) {
        *self.filters.write() = filters;
    }

    /// Returns true if some installed filter may hide children of `parent`.
    pub(crate) fn filters_applicable(&self, parent: &TreePath) -> bool {
        self.filters
            .read()
            .iter()
            .any(|filter| filter.is_applicable(parent))
    }

    /// Returns true if an applicable filter rejects `element` under `parent`.
    pub(crate) fn should_filter(&self, parent: &TreePath, element: &Element) -> bool {
        self.filters
            .read()
            .iter()
            .any(|filter| filter.is_applicable(parent) && !filter.select(parent, element))
    }

    /// Range a child count must re-validate before it is reported.
    ///
    /// With applicable filters every child is re-checked; otherwise only the
    /// window that held filtered children before, so they can come back.
    pub(crate) fn filter_window(&self, path: &TreePath, model_count: usize) -> Option<ChildRange> {
        if model_count > 0 && self.filters_applicable(path) {
            return Some(ChildRange::new(0, model_count));
        }
        self.transform.filtered_window(path, model_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HideNamed(&'static str);

    impl ElementFilter for HideNamed {
        fn select(&self, _parent: &TreePath, element: &Element) -> bool {
            element.name() != self.0
        }

        fn is_applicable(&self, parent: &TreePath) -> bool {
            parent.is_root()
        }
    }

    fn shared() -> ViewerShared {
        let (tx, _rx) = mpsc::unbounded_channel();
        ViewerShared::new(tx, Arc::new(UpdateMetrics::new()))
    }

    #[test]
    fn test_should_filter_respects_applicability() {
        let shared = shared();
        shared.set_filters(vec![Arc::new(HideNamed("b"))]);
        let root = TreePath::root();
        let nested = TreePath::from_names(["a"]);

        assert!(shared.should_filter(&root, &Element::new("b")));
        assert!(!shared.should_filter(&root, &Element::new("a")));
        assert!(!shared.should_filter(&nested, &Element::new("b")));
    }

    #[test]
    fn test_filter_window() {
        let shared = shared();
        let nested = TreePath::from_names(["a"]);
        assert_eq!(shared.filter_window(&nested, 4), None);

        shared.transform().add_filtered_index(&nested, 2);
        assert_eq!(shared.filter_window(&nested, 4), Some(ChildRange::new(2, 1)));

        shared.set_filters(vec![Arc::new(HideNamed("b"))]);
        assert_eq!(
            shared.filter_window(&TreePath::root(), 4),
            Some(ChildRange::new(0, 4))
        );
        assert_eq!(shared.filter_window(&TreePath::root(), 0), None);
    }
}
