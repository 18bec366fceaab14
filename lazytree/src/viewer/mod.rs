//! The tree model viewer.
//!
//! [`TreeModelViewer`] owns the shadow tree, the scheduler and the display
//! side of the engine. Providers answer on any thread; their results reach
//! the viewer as jobs on its display queue, and only the thread driving the
//! viewer ([`process_display_queue`](TreeModelViewer::process_display_queue),
//! [`run`](TreeModelViewer::run) or
//! [`run_until_idle`](TreeModelViewer::run_until_idle)) touches the tree.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        TreeModelViewer                           │
//! │                                                                  │
//! │  validate ──► item revealed ──► UpdateScheduler ──► start()      │
//! │     ▲                            (coalesce, path     │           │
//! │     │                             serialization)     ▼           │
//! │     │                                            provider call   │
//! │     │                                                │ any thread│
//! │     │                                                ▼           │
//! │     │          display queue ◄── Batch ◄────────── done()        │
//! │     │               │                                            │
//! │     │               ▼                                            │
//! │  hooks ◄──── perform_update ──► cleanup (release path, trigger)  │
//! │     │                                                            │
//! │     └──────► TreeDisplay                                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lazytree::{TreeModelViewer, ViewerConfig, NullDisplay, UniformAdapters};
//!
//! let adapters = UniformAdapters::new(Arc::new(my_provider));
//! let mut viewer = TreeModelViewer::new(Arc::new(adapters), Box::new(NullDisplay), ViewerConfig::default());
//! viewer.set_input(Element::new("debug-target"));
//! viewer.run_until_idle(Duration::from_millis(50)).await;
//! ```

mod content;
mod delta;
mod hooks;
mod listener;
mod shared;

pub use delta::ModelProxy;
pub use listener::ViewerUpdateListener;
pub(crate) use shared::ViewerShared;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ViewerConfig;
use crate::display::{DisplayJob, TreeDisplay};
use crate::model::{Element, PresentationContext, TreePath};
use crate::provider::{ElementFilter, ModelAdapters};
use crate::scheduler::UpdateScheduler;
use crate::telemetry::{MetricsSnapshot, UpdateMetrics};
use crate::update::{PendingState, UpdateId, UpdateKind, ViewerInputUpdate, ViewerUpdate};
use crate::vtree::VirtualTree;

/// Key under which an encoded memento is kept in an item's data.
pub const MEMENTO_KEY: &str = "memento";

/// Lazily populated tree viewer.
pub struct TreeModelViewer {
    shared: Arc<ViewerShared>,
    receiver: mpsc::UnboundedReceiver<DisplayJob>,
    tree: VirtualTree,
    scheduler: UpdateScheduler,
    adapters: Arc<dyn ModelAdapters>,
    display: Box<dyn TreeDisplay>,
    config: ViewerConfig,
    context: Arc<PresentationContext>,
    input: Option<Element>,
    pending_state: HashMap<TreePath, PendingState>,
    input_update: Option<Arc<ViewerInputUpdate>>,
    validate_requested: bool,
    trigger_requested: bool,
}

impl TreeModelViewer {
    /// Creates a viewer with no input.
    pub fn new(
        adapters: Arc<dyn ModelAdapters>,
        display: Box<dyn TreeDisplay>,
        config: ViewerConfig,
    ) -> Self {
        let (display_tx, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(ViewerShared::new(display_tx, Arc::new(UpdateMetrics::new())));
        let context = Arc::new(
            PresentationContext::new(config.presentation_id.clone())
                .with_columns(config.columns.iter().cloned()),
        );
        Self {
            shared,
            receiver,
            tree: VirtualTree::new(),
            scheduler: UpdateScheduler::new(),
            adapters,
            display,
            config,
            context,
            input: None,
            pending_state: HashMap::new(),
            input_update: None,
            validate_requested: false,
            trigger_requested: false,
        }
    }

    // -------------------------------------------------------------------------
    // Input
    // -------------------------------------------------------------------------

    /// Replaces the viewer input.
    ///
    /// Every waiting and in-flight update is canceled, the shadow tree and
    /// filter state start over, and the root's child count is requested.
    pub fn set_input(&mut self, input: Element) {
        self.install_input(input, None);
    }

    pub(crate) fn install_input(&mut self, input: Element, keep: Option<UpdateId>) {
        let root = TreePath::root();
        let dropped = self.scheduler.cancel_waiting(&root);
        let canceled = self.shared.cancel_in_progress_except(&root, keep);
        if let Some(update) = self.input_update.take() {
            if Some(update.id()) != keep {
                update.cancel();
            }
        }
        self.shared.transform().clear_all();
        self.pending_state.clear();
        self.tree.reset(input.clone());
        info!(input = %input, dropped, canceled, "Viewer input set");
        self.input = Some(input);
        self.request_validate();
    }

    pub fn input(&self) -> Option<&Element> {
        self.input.as_ref()
    }

    // -------------------------------------------------------------------------
    // Refresh and filters
    // -------------------------------------------------------------------------

    /// Refreshes the whole tree.
    pub fn refresh(&mut self) {
        self.refresh_path(&TreePath::root());
    }

    /// Re-fetches everything known about `path` and its materialized subtree.
    ///
    /// Items keep showing their current elements until new data replaces them.
    pub fn refresh_path(&mut self, path: &TreePath) {
        let Some(id) = self.tree.find_item(path) else {
            debug!(path = %path, "Refresh of unknown path ignored");
            return;
        };
        self.display.preserve_state(path);
        self.tree.invalidate(id);
        if !path.is_root() {
            self.update_has_children(path);
        }
        self.request_validate();
    }

    /// Installs the view filters and refreshes the tree.
    pub fn set_filters(&mut self, filters: Vec<Arc<dyn ElementFilter>>) {
        debug!(count = filters.len(), "Installing filters");
        self.shared.set_filters(filters);
        self.refresh();
    }

    /// Sets how many levels expand on their own; [`ALL_LEVELS`](crate::config::ALL_LEVELS) expands everything.
    pub fn set_auto_expand_level(&mut self, level: i32) {
        self.config.auto_expand_level = level;
    }

    pub fn auto_expand_level(&self) -> i32 {
        self.config.auto_expand_level
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Expansion and selection
    // -------------------------------------------------------------------------

    /// Expands the item at `path`, or remembers to once it materializes.
    pub fn expand(&mut self, path: &TreePath) {
        match self.tree.find_item(path) {
            Some(id) => {
                self.tree.set_expanded(id, true);
                self.request_validate();
            }
            None => self.add_pending_state(path, PendingState::expand()),
        }
    }

    pub fn collapse(&mut self, path: &TreePath) {
        if let Some(id) = self.tree.find_item(path) {
            self.tree.set_expanded(id, false);
        }
        if let Some(state) = self.pending_state.get_mut(path) {
            state.expand = false;
        }
    }

    /// Replaces the selection. Paths not materialized yet are selected as
    /// they appear.
    pub fn set_selection(&mut self, paths: &[TreePath]) {
        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            match self.tree.find_item(path) {
                Some(id) => ids.push(id),
                None => self.add_pending_state(path, PendingState::select()),
            }
        }
        self.tree.set_selection(ids);
        self.request_validate();
    }

    /// Paths of the selected items.
    pub fn selection(&self) -> Vec<TreePath> {
        self.tree
            .selection()
            .into_iter()
            .filter_map(|id| self.tree.path_of(id))
            .collect()
    }

    /// Returns the state still waiting for `path` to materialize.
    pub fn pending_state(&self, path: &TreePath) -> Option<PendingState> {
        self.pending_state.get(path).copied()
    }

    fn add_pending_state(&mut self, path: &TreePath, state: PendingState) {
        let entry = self.pending_state.entry(path.clone()).or_default();
        *entry = entry.union(state);
    }

    // -------------------------------------------------------------------------
    // Cancellation and disposal
    // -------------------------------------------------------------------------

    /// Cancels waiting and in-flight updates targeting `path` or below.
    ///
    /// Returns the number of updates affected.
    pub fn cancel_subtree_updates(&mut self, path: &TreePath) -> usize {
        let dropped = self.scheduler.cancel_waiting(path);
        let canceled = self.shared.cancel_in_progress_except(path, None);
        debug!(path = %path, dropped, canceled, "Canceled subtree updates");
        self.request_trigger();
        dropped + canceled
    }

    /// Stops applying results. In-flight updates still clean up.
    pub fn dispose(&mut self) {
        if self.shared.is_disposed() {
            return;
        }
        self.shared.dispose();
        self.cancel_subtree_updates(&TreePath::root());
        info!("Viewer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    // -------------------------------------------------------------------------
    // Listeners and introspection
    // -------------------------------------------------------------------------

    pub fn add_update_listener(&self, listener: Arc<dyn ViewerUpdateListener>) {
        self.shared.add_listener(listener);
    }

    pub fn remove_update_listener(&self, listener: &Arc<dyn ViewerUpdateListener>) {
        self.shared.remove_listener(listener);
    }

    /// The shadow tree.
    pub fn tree(&self) -> &VirtualTree {
        &self.tree
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics().snapshot()
    }

    /// Number of updates scheduled but not started.
    pub fn waiting_count(&self) -> usize {
        self.scheduler.waiting_count()
    }

    /// Number of started updates not cleaned up yet.
    pub fn in_progress_count(&self) -> usize {
        self.shared.in_progress_count()
    }

    /// Waiting updates by kind.
    pub fn waiting_kinds(&self) -> HashMap<UpdateKind, usize> {
        self.scheduler.waiting_kinds()
    }

    /// Returns true if the scheduling path of `path` is held by a running update.
    pub fn is_path_blocked(&self, path: &TreePath) -> bool {
        self.scheduler.is_blocked(path)
    }

    /// Returns true while updates are waiting or in flight.
    pub fn is_busy(&self) -> bool {
        self.scheduler.waiting_count() > 0 || self.shared.in_progress_count() > 0
    }

    // -------------------------------------------------------------------------
    // Display loop
    // -------------------------------------------------------------------------

    /// Runs every queued display job without waiting.
    ///
    /// Returns the number of jobs run, including jobs queued while running.
    pub fn process_display_queue(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(job) = self.receiver.try_recv() {
            self.handle_job(job);
            processed += 1;
        }
        processed
    }

    /// Runs the display loop until `shutdown` fires.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!("Display loop started");
        loop {
            let job = tokio::select! {
                biased;

                _ = shutdown.cancelled() => None,
                job = self.receiver.recv() => job,
            };
            let Some(job) = job else {
                break;
            };
            self.handle_job(job);
            self.process_display_queue();
        }
        info!("Display loop stopped");
    }

    /// Runs the display loop until no job arrives for `quiet` while nothing
    /// is in flight.
    ///
    /// A provider that never completes an update keeps this from returning.
    pub async fn run_until_idle(&mut self, quiet: Duration) {
        loop {
            self.process_display_queue();
            match tokio::time::timeout(quiet, self.receiver.recv()).await {
                Ok(Some(job)) => self.handle_job(job),
                Ok(None) => break,
                Err(_) if !self.is_busy() => break,
                Err(_) => {}
            }
        }
    }

    fn handle_job(&mut self, job: DisplayJob) {
        match job {
            DisplayJob::Commit(updates) => self.commit(updates),
            DisplayJob::Release(update) => self.update_complete(&update),
            DisplayJob::FilterPass { children, owner } => self.filter_pass(children, owner),
            DisplayJob::ModelChanged(delta) => self.apply_model_delta(delta),
            DisplayJob::Trigger => {
                self.trigger_requested = false;
                self.trigger_updates();
            }
            DisplayJob::Validate => {
                self.validate_requested = false;
                self.validate();
            }
        }
    }
}

impl std::fmt::Debug for TreeModelViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeModelViewer")
            .field("input", &self.input)
            .field("items", &self.tree.len())
            .field("waiting", &self.scheduler.waiting_count())
            .field("in_progress", &self.shared.in_progress_count())
            .finish()
    }
}
