//! Update error types.

use thiserror::Error;

/// Errors an update request can finish with.
///
/// A failed update is never applied to the tree, but its cleanup still runs
/// so the scheduling path it held is released.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpdateError {
    /// The provider reported a failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// The request was canceled before it could be applied.
    #[error("update canceled")]
    Canceled,

    /// The viewer was disposed before the request completed.
    #[error("viewer disposed")]
    Disposed,

    /// The viewer has no input to request against.
    #[error("viewer has no input")]
    NoInput,

    /// No provider adapter is registered for the element.
    #[error("no adapter for element '{0}'")]
    NoAdapter(String),

    /// The provider answered outside the requested range.
    #[error("index {index} outside requested range {offset}..{end}")]
    InvalidRange {
        index: usize,
        offset: usize,
        end: usize,
    },
}

impl UpdateError {
    /// Creates a provider error from any displayable failure.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_error_display() {
        assert_eq!(
            UpdateError::provider("target not suspended").to_string(),
            "provider error: target not suspended"
        );
        assert_eq!(UpdateError::Canceled.to_string(), "update canceled");
        let err = UpdateError::InvalidRange {
            index: 9,
            offset: 2,
            end: 5,
        };
        assert!(err.to_string().contains("2..5"));
    }
}
