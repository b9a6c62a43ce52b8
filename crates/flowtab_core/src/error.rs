//! Error types for match-table operations.
//!
//! Errors are discriminated values, never panics. The hot path (`lookup`)
//! and diagnostics (`dump`) cannot fail; everything on the control plane
//! returns [`MatchResult`].

use thiserror::Error;

/// Result type alias for match-table operations.
pub type MatchResult<T> = Result<T, MatchError>;

/// Errors that can occur on the match-table control plane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Every slot of the match unit is occupied.
    #[error("match table is full")]
    TableFull,

    /// The handle references a slot that is not currently live.
    #[error("handle does not reference a live entry")]
    InvalidHandle,

    /// The slot was deleted (and possibly reused) since the handle was
    /// issued; the embedded version no longer matches.
    #[error("handle is stale, the entry was deleted since it was issued")]
    ExpiredHandle,

    /// The match key parameters violate the discipline's schema.
    #[error("malformed match key: {reason}")]
    BadMatchKey {
        /// What the parameter sequence got wrong.
        reason: String,
    },

    /// An entry with the same canonical key is already installed.
    #[error("an entry with the same match key is already installed")]
    DuplicateEntry,

    /// Internal invariant violation. Should be impossible.
    #[error("internal error: {reason}")]
    Internal {
        /// The invariant that broke.
        reason: String,
    },
}

impl MatchError {
    /// Creates a [`MatchError::BadMatchKey`].
    pub fn bad_match_key(reason: impl Into<String>) -> Self {
        Self::BadMatchKey {
            reason: reason.into(),
        }
    }

    /// Creates a [`MatchError::Internal`].
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Returns true if the operation may succeed on retry after the caller
    /// frees capacity.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::TableFull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MatchError::bad_match_key("two lpm parameters");
        assert_eq!(err.to_string(), "malformed match key: two lpm parameters");
        assert_eq!(MatchError::TableFull.to_string(), "match table is full");
    }

    #[test]
    fn test_is_retryable() {
        assert!(MatchError::TableFull.is_retryable());
        assert!(!MatchError::InvalidHandle.is_retryable());
        assert!(!MatchError::internal("bug").is_retryable());
    }
}
