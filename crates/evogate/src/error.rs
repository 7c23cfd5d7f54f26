//! Error taxonomy for gateway operations.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur when preparing or executing a gateway call.
///
/// Validation, resolution and instance errors are caller mistakes and are
/// surfaced before any network traffic. Network and gateway errors come back
/// from the wire; whether they are retried depends on the operation class
/// (reads get one retry, sends none).
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed, missing, or out-of-range caller input.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A media reference could not be turned into a transmittable payload.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Instance lookup failed.
    #[error(transparent)]
    Instance(#[from] InstanceError),

    /// Transport-level failure (timeout, connection refused, TLS).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway error (status {status}): {detail}")]
    Gateway { status: u16, detail: String },
}

impl Error {
    /// Whether a read operation may retry after this error.
    ///
    /// 5xx and transport failures are transient; everything else is
    /// permanent and retrying would only repeat the same mistake.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Gateway { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors produced while resolving a media reference.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The source does not exist, is not a regular file, or failed to read.
    #[error("unreadable media source {reference}: {reason}")]
    UnreadableSource { reference: String, reason: String },

    /// The reference uses a scheme this resolver cannot handle.
    #[error("unsupported media scheme: {0}")]
    UnsupportedScheme(String),

    /// The payload exceeds the inline transport cap.
    #[error("media payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: u64, limit: u64 },
}

/// Errors produced by instance selection.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("unknown gateway instance: {0}")]
    NotFound(String),

    #[error("no default gateway instance configured")]
    NoDefault,
}

/// Classifies a failed dispatch outcome for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 4xx — the gateway rejected the request; retrying cannot help.
    Rejected,
    /// 5xx — the gateway failed; a later attempt may succeed.
    Transient,
}

/// Outcome of a message dispatch.
///
/// Gateway-level outcomes (accepted, rejected, server error) land here;
/// local failures and transport errors surface as [`Error`] instead.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub success: bool,
    /// Message id assigned by the gateway, when the response carried one.
    pub message_id: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub detail: Option<String>,
}

impl DispatchResult {
    pub(crate) fn accepted(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error_kind: None,
            detail: None,
        }
    }

    pub(crate) fn failed(kind: ErrorKind, detail: String) -> Self {
        Self {
            success: false,
            message_id: None,
            error_kind: Some(kind),
            detail: Some(detail),
        }
    }
}

/// A refresh outcome: the freshest value available plus the error that kept
/// it stale, if the refresh failed. The cached value is never cleared on
/// failure; callers decide whether stale data is acceptable.
#[derive(Debug, Clone)]
pub struct Refreshed<T> {
    pub value: T,
    pub error: Option<Arc<Error>>,
}

impl<T> Refreshed<T> {
    pub fn is_fresh(&self) -> bool {
        self.error.is_none()
    }
}
