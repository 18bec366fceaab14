//! Batch coordinator.
//!
//! Providers complete updates from many threads. The batch collects the
//! completed updates of each started group and hands them to the display
//! thread as one commit job once every member of that group has finished, so
//! a wave of answers costs one display-thread entry instead of one per update.
//!
//! Groups are keyed by scheduling path. The scheduler never runs two groups
//! on overlapping paths, so a path identifies at most one group at a time,
//! and a slow group never holds back the commit of another.
//!
//! ```text
//! start ──► pending[path] ──done──► completed[path] ──(path drained)──► Commit job
//!                          │
//!                          └─(canceled)──► Release job (cleanup only)
//! ```

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::display::DisplayJob;
use crate::model::TreePath;
use crate::update::{UpdateId, UpdateRequest};

#[derive(Default)]
struct BatchState {
    pending: HashSet<UpdateId>,
    completed: Vec<UpdateRequest>,
}

/// Collects completed updates until every pending member of their group has
/// finished.
pub(crate) struct Batch {
    groups: Mutex<HashMap<TreePath, BatchState>>,
    display: mpsc::UnboundedSender<DisplayJob>,
}

impl Batch {
    pub(crate) fn new(display: mpsc::UnboundedSender<DisplayJob>) -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            display,
        }
    }

    /// Registers a started update as pending in its group.
    pub(crate) fn batch(&self, update: &UpdateRequest) {
        self.groups
            .lock()
            .entry(update.scheduling_path())
            .or_default()
            .pending
            .insert(update.id());
    }

    /// Records a finished update.
    ///
    /// Canceled updates only need cleanup and are released on their own.
    /// When the last pending member of a group finishes, one commit job
    /// carries the group's completed updates to the display thread.
    pub(crate) fn done(&self, update: UpdateRequest) {
        let path = update.scheduling_path();
        let mut jobs = Vec::with_capacity(2);
        {
            let mut groups = self.groups.lock();
            let state = groups.entry(path.clone()).or_default();
            state.pending.remove(&update.id());
            if update.is_canceled() {
                jobs.push(DisplayJob::Release(update));
            } else {
                state.completed.push(update);
            }
            if state.pending.is_empty() {
                if let Some(state) = groups.remove(&path) {
                    if !state.completed.is_empty() {
                        trace!(path = %path, count = state.completed.len(), "Batch drained");
                        jobs.push(DisplayJob::Commit(state.completed));
                    }
                }
            }
        }
        for job in jobs {
            if self.display.send(job).is_err() {
                warn!("Display queue closed; dropping batch job");
            }
        }
    }

    /// Number of started updates that have not finished.
    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.groups.lock().values().map(|state| state.pending.len()).sum()
    }

    /// Number of finished updates waiting for their group to drain.
    #[cfg(test)]
    pub(crate) fn completed_count(&self) -> usize {
        self.groups.lock().values().map(|state| state.completed.len()).sum()
    }
}
