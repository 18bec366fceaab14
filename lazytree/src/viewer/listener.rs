//! Update lifecycle listeners.

use crate::update::UpdateRequest;

/// Observes update activity of a viewer.
///
/// `updates_begin` fires when the first update starts while none is in
/// flight, and `updates_complete` when the last in-flight update has been
/// cleaned up. Every `update_started` is eventually paired with one
/// `update_complete`, canceled and failed updates included.
///
/// Callbacks run on the display thread and must not block.
pub trait ViewerUpdateListener: Send + Sync {
    fn updates_begin(&self) {}

    fn updates_complete(&self) {}

    fn update_started(&self, _update: &UpdateRequest) {}

    fn update_complete(&self, _update: &UpdateRequest) {}
}
