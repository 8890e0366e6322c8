//! Driver error type
//!
//! Every failure a caller can see from a collection handle. Publish failures
//! on the remote op channel are not represented here: they are logged by the
//! dispatcher and never reach the write caller.

use thiserror::Error;

/// Result alias used across the driver
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by collection operations and store backends
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// No document identifier could be derived from the call arguments.
    /// Raised before the store is touched.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The call arguments have an unusable shape (e.g. findAndModify options
    /// without an `update` member).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The store refused the operation (conflicting operators, bad paths, ...)
    #[error("store rejected operation: {0}")]
    StoreRejected(String),

    /// The store could not be reached
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Discriminant of [`Error`], for matching without the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidIdentifier,
    InvalidRequest,
    StoreRejected,
    StoreUnavailable,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::StoreRejected(_) => ErrorKind::StoreRejected,
            Error::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// Whether the error came from the store (as opposed to argument normalization)
    pub fn is_store_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StoreRejected | ErrorKind::StoreUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            Error::InvalidIdentifier("x".into()).kind(),
            ErrorKind::InvalidIdentifier
        );
        assert_eq!(
            Error::StoreRejected("conflict".into()).kind(),
            ErrorKind::StoreRejected
        );
        assert_eq!(
            Error::StoreUnavailable("down".into()).kind(),
            ErrorKind::StoreUnavailable
        );
    }

    #[test]
    fn test_store_error_classification() {
        assert!(Error::StoreRejected("a".into()).is_store_error());
        assert!(Error::StoreUnavailable("b".into()).is_store_error());
        assert!(!Error::InvalidIdentifier("c".into()).is_store_error());
        assert!(!Error::InvalidRequest("d".into()).is_store_error());
    }

    #[test]
    fn test_display_includes_message() {
        let err = Error::StoreRejected("Updating the path 'a' would create a conflict".into());
        assert_eq!(
            err.to_string(),
            "store rejected operation: Updating the path 'a' would create a conflict"
        );
    }
}
