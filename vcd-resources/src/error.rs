//! Reconcile error types.

use thiserror::Error;

use crate::params::Action;

/// Errors that can abort a reconcile invocation.
///
/// Every variant carries enough context (sub-resource, operation, remote
/// status and body) to diagnose the failure from the module response alone.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// `state` is not one of `present`, `absent`, `update`.
    #[error("invalid state '{0}', expected one of: present, absent, update")]
    InvalidState(String),

    /// `operation` is not a known query operation.
    #[error("invalid operation '{0}', expected one of: read")]
    InvalidOperation(String),

    /// Neither `state` nor `operation` was supplied.
    #[error("Please provide state/operation for resource")]
    MissingAction,

    /// No provider implements this operation for this sub-resource.
    #[error("{operation} is not supported for sub-resource '{resource}'")]
    Unsupported { resource: String, operation: Action },

    /// Sub-resource configuration does not have the expected shape.
    #[error("invalid configuration for '{resource}': {reason}")]
    InvalidConfig { resource: String, reason: String },

    /// The remote API answered with a failure status.
    #[error("{operation} {resource} failed: {status}: {body}")]
    RemoteCall {
        resource: String,
        operation: Action,
        status: u16,
        body: serde_json::Value,
    },

    /// The sub-resource does not exist remotely and the operation needs it.
    #[error("{resource} '{key}' does not exist")]
    NotFound { resource: String, key: String },

    /// The remote call did not complete within the request timeout.
    #[error("{operation} {resource} timed out")]
    Timeout { resource: String, operation: Action },

    /// The invocation was cancelled while a call was in flight.
    #[error("reconcile cancelled")]
    Cancelled,

    /// Connection-level failure (DNS, refused, TLS, malformed response).
    #[error("transport: {0}")]
    Transport(String),

    /// Logging in to vCD failed.
    #[error("authentication failed: {0}")]
    Authentication(String),
}

/// Result type for reconcile operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
