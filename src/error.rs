//! Error taxonomy shared by every resource category.
//!
//! Lookups, capability checks, model registration and upstream I/O all
//! report through `ResourceError` so callers handle a camera, a sensor and
//! a vision service the same way.

use std::borrow::Cow;

use thiserror::Error;

/// Errors surfaced by resource lookup, reconfiguration and model operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: Cow<'static, str>, name: String },

    #[error("expected implementation of {expected} but got {actual}")]
    UnimplementedInterface { expected: String, actual: String },

    #[error("expected {expected} but got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("{kind} already registered: {name}")]
    Conflict { kind: Cow<'static, str>, name: String },

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("resource closed: {0}")]
    Closed(String),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Sentinel a sensor returns when a reading should not be captured.
    #[error("no capture to store")]
    NoCaptureToStore,
}

impl ResourceError {
    pub fn not_found(kind: impl Into<Cow<'static, str>>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn conflict(kind: impl Into<Cow<'static, str>>, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns true for lookups that found nothing under the given name.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the failure came from outside the core (camera, model, peer).
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Remote(_))
    }
}

pub type Result<T, E = ResourceError> = std::result::Result<T, E>;
