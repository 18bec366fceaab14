//! Presentation context captured by every update.

/// Configuration snapshot describing the view an update is computed for.
///
/// Providers may vary their answers by presentation (a variables view and a
/// registers view show the same model differently). The visible columns drive
/// the shape of label payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationContext {
    id: String,
    columns: Vec<String>,
}

impl PresentationContext {
    /// Creates a context with no columns (single-column tree).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            columns: Vec::new(),
        }
    }

    /// Sets the visible column identifiers.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the presentation identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the visible column identifiers; empty when the tree has no columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of label slots a label update carries (at least one).
    pub fn label_slots(&self) -> usize {
        self.columns.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_slots() {
        assert_eq!(PresentationContext::new("variables").label_slots(), 1);
        let ctx = PresentationContext::new("variables").with_columns(["name", "value", "type"]);
        assert_eq!(ctx.label_slots(), 3);
        assert_eq!(ctx.columns()[1], "value");
    }
}
