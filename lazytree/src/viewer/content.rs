//! Creating, starting and committing updates.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use super::TreeModelViewer;
use crate::display::DisplayJob;
use crate::error::UpdateError;
use crate::model::{Element, TreePath};
use crate::provider::ElementContentProvider;
use crate::scheduler::ScheduleOutcome;
use crate::update::{
    ChildCountUpdate, ChildRange, ChildrenUpdate, HasChildrenUpdate, LabelData, LabelUpdate,
    MementoMode, MementoUpdate, NavigateUpdate, PendingState, UpdateCore, UpdateKind,
    UpdateRequest, ViewerInputUpdate, ViewerUpdate,
};
use crate::vtree::ItemId;

impl TreeModelViewer {
    // -------------------------------------------------------------------------
    // Request creation
    // -------------------------------------------------------------------------

    fn new_core(&self, path: &TreePath) -> Result<UpdateCore, UpdateError> {
        if self.shared.is_disposed() {
            return Err(UpdateError::Disposed);
        }
        let input = self.input.clone().ok_or(UpdateError::NoInput)?;
        Ok(UpdateCore::new(
            path.clone(),
            input,
            Arc::clone(&self.context),
            Arc::downgrade(&self.shared),
        ))
    }

    /// The element at `path`: its last segment, or the input at the root.
    fn element_at(&self, path: &TreePath) -> Result<Element, UpdateError> {
        match path.last_segment() {
            Some(element) => Ok(element.clone()),
            None => self.input.clone().ok_or(UpdateError::NoInput),
        }
    }

    fn content_core(
        &self,
        path: &TreePath,
    ) -> Result<(UpdateCore, Arc<dyn ElementContentProvider>), UpdateError> {
        let element = self.element_at(path)?;
        let provider = self
            .adapters
            .content_provider(&element)
            .ok_or_else(|| UpdateError::NoAdapter(element.name().to_string()))?;
        Ok((self.new_core(path)?, provider))
    }

    /// Asks whether the element at `path` has children.
    pub fn request_has_children(&mut self, path: &TreePath) -> Result<(), UpdateError> {
        let (core, provider) = self.content_core(path)?;
        self.schedule(HasChildrenUpdate::new(core, provider).into());
        Ok(())
    }

    /// Asks for the child count of the element at `path`.
    pub fn request_child_count(&mut self, path: &TreePath) -> Result<(), UpdateError> {
        let (core, provider) = self.content_core(path)?;
        self.schedule(ChildCountUpdate::new(core, provider).into());
        Ok(())
    }

    /// Asks for the children of `parent` at model indices `[offset, offset + length)`.
    pub fn request_children(
        &mut self,
        parent: &TreePath,
        offset: usize,
        length: usize,
    ) -> Result<(), UpdateError> {
        let (core, provider) = self.content_core(parent)?;
        let range = ChildRange::new(offset, length);
        self.schedule(ChildrenUpdate::new(core, provider, range).into());
        Ok(())
    }

    /// Asks for the label of the element at `path`.
    ///
    /// Without a label provider the element is labeled with its name at once.
    pub fn request_label(&mut self, path: &TreePath) -> Result<(), UpdateError> {
        let element = self.element_at(path)?;
        match self.adapters.label_provider(&element) {
            Some(provider) => {
                let core = self.new_core(path)?;
                self.schedule(LabelUpdate::new(core, provider).into());
            }
            None => self.apply_label(path, LabelData::text(element.name())),
        }
        Ok(())
    }

    /// Reveals and selects `path`, expanding its ancestors as they load.
    pub fn navigate(&mut self, path: &TreePath) -> Result<(), UpdateError> {
        let core = self.new_core(path)?;
        self.schedule(NavigateUpdate::new(core).into());
        Ok(())
    }

    /// Resolves the input to show for `source`; the answer replaces the input.
    ///
    /// A resolution still in flight is canceled.
    pub fn resolve_input(&mut self, source: Element) -> Result<(), UpdateError> {
        let provider = self
            .adapters
            .input_provider(&source)
            .ok_or_else(|| UpdateError::NoAdapter(source.name().to_string()))?;
        let core = self.new_core(&TreePath::root())?;
        if let Some(previous) = self.input_update.take() {
            previous.cancel();
        }
        let update = ViewerInputUpdate::new(core, provider, source);
        self.input_update = Some(Arc::clone(&update));
        self.schedule(update.into());
        Ok(())
    }

    /// Asks the memento provider to encode the element at `path`.
    pub fn encode_state(&mut self, path: &TreePath) -> Result<(), UpdateError> {
        self.schedule_memento(path, MementoMode::Encode, Vec::new(), PendingState::default())
    }

    /// Compares the element at `path` against `memento`; on a match `delta`
    /// is restored as the element materializes.
    pub fn compare_state(
        &mut self,
        path: &TreePath,
        memento: Vec<u8>,
        delta: PendingState,
    ) -> Result<(), UpdateError> {
        self.schedule_memento(path, MementoMode::Compare, memento, delta)
    }

    fn schedule_memento(
        &mut self,
        path: &TreePath,
        mode: MementoMode,
        memento: Vec<u8>,
        delta: PendingState,
    ) -> Result<(), UpdateError> {
        let element = self.element_at(path)?;
        let provider = self
            .adapters
            .memento_provider(&element)
            .ok_or_else(|| UpdateError::NoAdapter(element.name().to_string()))?;
        let core = self.new_core(path)?;
        self.schedule(MementoUpdate::new(core, provider, mode, memento, delta).into());
        Ok(())
    }

    fn schedule(&mut self, update: UpdateRequest) {
        let metrics = self.shared.metrics();
        metrics.update_scheduled();
        trace!(id = %update.id(), kind = %update.kind(), path = %update.element_path(), "Scheduling update");
        if self.scheduler.schedule(update) == ScheduleOutcome::Coalesced {
            metrics.update_coalesced();
        }
        self.request_trigger();
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Queues one validation pass; repeated requests before it runs collapse.
    pub(crate) fn request_validate(&mut self) {
        if !self.validate_requested {
            self.validate_requested = true;
            self.shared.post(DisplayJob::Validate);
        }
    }

    pub(crate) fn request_trigger(&mut self) {
        if !self.trigger_requested {
            self.trigger_requested = true;
            self.shared.post(DisplayJob::Trigger);
        }
    }

    pub(crate) fn validate(&mut self) {
        if self.input.is_none() || self.shared.is_disposed() {
            return;
        }
        let revealed = self.tree.validate();
        if revealed.is_empty() {
            return;
        }
        trace!(items = revealed.len(), "Validating revealed items");
        let in_progress = self.shared.in_progress();
        for id in revealed {
            self.item_revealed(id, &in_progress);
        }
    }

    /// Returns true if an update of `kind` for `path` is waiting or in flight.
    fn is_pending(
        &self,
        in_progress: &[UpdateRequest],
        kind: UpdateKind,
        path: &TreePath,
        index: Option<usize>,
    ) -> bool {
        self.scheduler.is_waiting(kind, path, index)
            || in_progress
                .iter()
                .any(|update| !update.is_canceled() && update.targets(kind, path, index))
    }

    fn item_revealed(&mut self, id: ItemId, in_progress: &[UpdateRequest]) {
        let Some(item) = self.tree.item(id) else {
            return;
        };

        if id == self.tree.root() {
            let root = TreePath::root();
            if (item.needs_count() || item.needs_data())
                && !self.is_pending(in_progress, UpdateKind::ChildCount, &root, None)
            {
                let result = self.request_child_count(&root);
                log_request(&root, result);
            }
            return;
        }

        if item.needs_data() {
            let index = item.index();
            let Some(parent_path) = item.parent().and_then(|parent| self.tree.path_of(parent)) else {
                return;
            };
            let model = self
                .shared
                .transform()
                .view_to_model_index(&parent_path, index);
            if !self.is_pending(in_progress, UpdateKind::Children, &parent_path, Some(model)) {
                let result = self.request_children(&parent_path, model, 1);
                log_request(&parent_path, result);
            }
            return;
        }

        let needs_label = item.needs_label();
        let needs_count = item.needs_count() && item.is_expanded() && item.has_items();
        let Some(path) = self.tree.path_of(id) else {
            return;
        };
        if needs_label && !self.is_pending(in_progress, UpdateKind::Label, &path, None) {
            let result = self.request_label(&path);
            log_request(&path, result);
        }
        if needs_count && !self.is_pending(in_progress, UpdateKind::ChildCount, &path, None) {
            let result = self.request_child_count(&path);
            log_request(&path, result);
        }
    }

    // -------------------------------------------------------------------------
    // Start and commit
    // -------------------------------------------------------------------------

    pub(crate) fn trigger_updates(&mut self) {
        let ready = self.scheduler.take_ready();
        for update in ready {
            update.start();
        }
    }

    pub(crate) fn commit(&mut self, updates: Vec<UpdateRequest>) {
        self.shared.metrics().batch_committed();
        debug!(count = updates.len(), "Committing batch");
        for update in updates {
            self.commit_update(update);
        }
    }

    /// Applies one update and always cleans it up.
    fn commit_update(&mut self, update: UpdateRequest) {
        let current_input = self.input.as_ref() == Some(update.core().viewer_input());
        let applicable = current_input
            && !update.is_canceled()
            && !self.shared.is_disposed()
            && update.status().is_ok();

        if applicable {
            let result = panic::catch_unwind(AssertUnwindSafe(|| update.perform_update(self)));
            if result.is_err() {
                error!(id = %update.id(), kind = %update.kind(), path = %update.element_path(), "Applying update panicked");
                self.shared.metrics().apply_panicked();
            }
        } else if let Err(e) = update.status() {
            debug!(id = %update.id(), kind = %update.kind(), path = %update.element_path(), error = %e, "Update failed");
        }
        self.update_complete(&update);
    }

    pub(crate) fn update_complete(&mut self, update: &UpdateRequest) {
        self.scheduler.release(update);
        self.shared.update_complete(update);
        self.request_trigger();
    }

    /// Records filter membership from a re-validation fetch, then hands the
    /// child count that spawned it to the batch.
    pub(crate) fn filter_pass(&mut self, children: Arc<ChildrenUpdate>, owner: Arc<ChildCountUpdate>) {
        match children.status() {
            Ok(()) if !children.is_canceled() && !self.shared.is_disposed() => {
                let outcome = children.apply(self, true);
                owner.mark_filter_validated();
                self.shared.metrics().filter_pass();
                trace!(
                    path = %owner.element_path(),
                    filtered = outcome.newly_filtered.len(),
                    unfiltered = outcome.newly_unfiltered.len(),
                    "Filter pass applied"
                );
            }
            Ok(()) => {}
            Err(e) => {
                warn!(path = %owner.element_path(), error = %e, "Filter re-validation failed");
                owner.set_error(e);
            }
        }
        self.shared.batch_done(UpdateRequest::ChildCount(owner));
    }
}

fn log_request(path: &TreePath, result: Result<(), UpdateError>) {
    if let Err(e) = result {
        debug!(path = %path, error = %e, "Update not requested");
    }
}
