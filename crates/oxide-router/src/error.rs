//! Error types for routing.

use std::fmt;

use thiserror::Error;

/// Boxed error type returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Router-specific errors.
///
/// The registration variants (`InvalidPattern`, `CatchAllNotLast`,
/// `ParamConflict`, `DuplicateRoute`) are only produced while building a
/// [`Dispatcher`](crate::Dispatcher) and mean the route table is wrong.
/// Everything else is contained inside a single request.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The pattern could not be parsed.
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A catch-all segment was followed by more segments.
    #[error("catch-all must be the last segment in {pattern:?}")]
    CatchAllNotLast { pattern: String },

    /// Two routes disagree on the parameter name at the same position.
    #[error("{pattern:?} names {new:?} where an existing route uses {existing:?}")]
    ParamConflict {
        pattern: String,
        existing: String,
        new: String,
    },

    /// The same pattern was registered twice for one method.
    #[error("route already registered: {method} {pattern}")]
    DuplicateRoute { method: String, pattern: String },

    /// No route matched the request.
    #[error("no route matched: {method} {path}")]
    NotFound { method: String, path: String },

    /// The path is registered, but not under this method.
    #[error("method not allowed: {method} for {path}")]
    MethodNotAllowed { method: String, path: String },

    /// A handler failed while the chain was running.
    #[error("handler failed: {0}")]
    Handler(#[from] HandlerFailure),

    /// A second write was attempted after the response was sent.
    #[error("response already committed")]
    ResponseAlreadyCommitted,
}

impl RouterError {
    /// Returns true for errors raised while registering routes.
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern { .. }
                | Self::CatchAllNotLast { .. }
                | Self::ParamConflict { .. }
                | Self::DuplicateRoute { .. }
        )
    }

    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// An unrecovered failure raised from inside a handler.
#[derive(Debug)]
pub enum HandlerFailure {
    /// The handler panicked; holds the panic message.
    Panic(String),
    /// The handler returned an error.
    Error(BoxError),
}

impl HandlerFailure {
    /// Builds a failure from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panic(message)
    }

    /// Returns true if the handler panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panic(message) => write!(f, "panicked: {message}"),
            Self::Error(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for HandlerFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Panic(_) => None,
            Self::Error(err) => Some(err.as_ref()),
        }
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_classification() {
        let err = RouterError::DuplicateRoute {
            method: "GET".to_string(),
            pattern: "/ping".to_string(),
        };
        assert!(err.is_registration());
        assert_eq!(err.to_string(), "route already registered: GET /ping");
        let err = RouterError::NotFound {
            method: "GET".to_string(),
            path: "/".to_string(),
        };
        assert!(!err.is_registration());
    }

    #[test]
    fn test_panic_payloads() {
        let failure = HandlerFailure::from_panic(Box::new("boom"));
        assert!(failure.is_panic());
        assert_eq!(failure.to_string(), "panicked: boom");

        let failure = HandlerFailure::from_panic(Box::new(String::from("owned")));
        assert_eq!(failure.to_string(), "panicked: owned");

        let failure = HandlerFailure::from_panic(Box::new(42_u8));
        assert_eq!(failure.to_string(), "panicked: non-string panic payload");
    }
}
