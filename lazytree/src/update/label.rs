//! Label requests.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::base::{UpdateCore, ViewerUpdate};
use super::{split_canceled, Siblings, UpdateRequest};
use crate::model::TreePath;
use crate::provider::{same_provider, ElementLabelProvider};
use crate::viewer::{TreeModelViewer, ViewerShared};

/// Presentation of one column.
///
/// Image, font and color values are opaque to the viewer; they are handed to
/// the display as given.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLabel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

/// Label payload for one element: a slot per visible column plus check state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelData {
    pub columns: Vec<ColumnLabel>,
    pub checked: bool,
    pub grayed: bool,
}

impl LabelData {
    /// Creates a payload with `slots` empty columns.
    pub fn with_slots(slots: usize) -> Self {
        Self {
            columns: vec![ColumnLabel::default(); slots],
            ..Self::default()
        }
    }

    /// Creates a single-column payload showing `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            columns: vec![ColumnLabel {
                text: Some(text.into()),
                ..ColumnLabel::default()
            }],
            ..Self::default()
        }
    }

    /// Returns the text of the first column.
    pub fn primary_text(&self) -> Option<&str> {
        self.columns.first().and_then(|c| c.text.as_deref())
    }
}

/// Asks for the label of an element.
pub struct LabelUpdate {
    core: UpdateCore,
    provider: Arc<dyn ElementLabelProvider>,
    label: Mutex<LabelData>,
    siblings: Siblings<LabelUpdate>,
}

impl LabelUpdate {
    pub(crate) fn new(core: UpdateCore, provider: Arc<dyn ElementLabelProvider>) -> Arc<Self> {
        let slots = core.presentation_context().label_slots();
        Arc::new(Self {
            core,
            provider,
            label: Mutex::new(LabelData::with_slots(slots)),
            siblings: Siblings::new(),
        })
    }

    /// Returns the visible column ids; empty for a single-column tree.
    pub fn columns(&self) -> Vec<String> {
        self.presentation_context().columns().to_vec()
    }

    fn with_column(&self, column: usize, f: impl FnOnce(&mut ColumnLabel)) {
        let mut label = self.label.lock();
        if let Some(slot) = label.columns.get_mut(column) {
            f(slot);
        }
    }

    /// Sets the text of a column. Out-of-range columns are ignored.
    pub fn set_label(&self, text: impl Into<String>, column: usize) {
        let text = text.into();
        self.with_column(column, |slot| slot.text = Some(text));
    }

    pub fn set_image(&self, image: impl Into<String>, column: usize) {
        let image = image.into();
        self.with_column(column, |slot| slot.image = Some(image));
    }

    pub fn set_font(&self, font: impl Into<String>, column: usize) {
        let font = font.into();
        self.with_column(column, |slot| slot.font = Some(font));
    }

    pub fn set_foreground(&self, color: impl Into<String>, column: usize) {
        let color = color.into();
        self.with_column(column, |slot| slot.foreground = Some(color));
    }

    pub fn set_background(&self, color: impl Into<String>, column: usize) {
        let color = color.into();
        self.with_column(column, |slot| slot.background = Some(color));
    }

    pub fn set_checked(&self, checked: bool, grayed: bool) {
        let mut label = self.label.lock();
        label.checked = checked;
        label.grayed = grayed;
    }

    /// Returns a copy of the recorded label.
    pub fn label(&self) -> LabelData {
        self.label.lock().clone()
    }

    /// Completes the request. Calls after the first are ignored.
    pub fn done(self: &Arc<Self>) {
        UpdateRequest::from(Arc::clone(self)).done();
    }

    pub(crate) fn scheduling_path(&self) -> TreePath {
        self.element_path().parent_path()
    }

    pub(crate) fn same_request(&self, other: &Self) -> bool {
        self.viewer_input() == other.viewer_input() && self.element_path() == other.element_path()
    }

    pub(crate) fn coalesce(&self, other: &Arc<Self>) -> bool {
        if !same_provider(&self.provider, &other.provider)
            || self.viewer_input() != other.viewer_input()
        {
            return false;
        }
        if self.contains_update(other.element_path()) {
            return true;
        }
        if self.scheduling_path() == other.scheduling_path() {
            self.siblings.push(Arc::clone(other));
            return true;
        }
        false
    }

    pub(crate) fn contains_update(&self, path: &TreePath) -> bool {
        self.element_path() == path || self.siblings.targets(path)
    }

    pub(crate) fn batch_members(self: &Arc<Self>) -> Vec<Arc<Self>> {
        self.siblings.with_primary(self)
    }

    pub(crate) fn start_request(self: &Arc<Self>, shared: &ViewerShared) {
        let (live, canceled) = split_canceled(self.batch_members());
        for update in &canceled {
            update.done();
        }
        if live.is_empty() {
            return;
        }
        shared.metrics().provider_call();
        self.provider.update_labels(live);
    }

    pub(crate) fn perform_update(&self, viewer: &mut TreeModelViewer) {
        viewer.apply_label(self.element_path(), self.label());
    }
}

impl ViewerUpdate for LabelUpdate {
    fn core(&self) -> &UpdateCore {
        &self.core
    }
}

impl fmt::Debug for LabelUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelUpdate")
            .field("id", &self.core.id())
            .field("path", self.element_path())
            .field("siblings", &self.siblings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_data_serializes_compactly() {
        let label = LabelData::text("x = 5");
        let json = serde_json::to_string(&label).unwrap();
        assert_eq!(json, r#"{"columns":[{"text":"x = 5"}],"checked":false,"grayed":false}"#);
        assert_eq!(label.primary_text(), Some("x = 5"));
    }

    #[test]
    fn test_with_slots() {
        let label = LabelData::with_slots(3);
        assert_eq!(label.columns.len(), 3);
        assert_eq!(label.primary_text(), None);
    }
}
