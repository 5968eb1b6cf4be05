//! Error taxonomy for the edge client core
//!
//! This module defines the fixed set of [`ErrorKind`]s the core can surface
//! (spec §7) and [`ControllerError`], the concrete error type every fallible
//! operation returns. Every error carries an optional server-supplied error
//! code, an optional HTTP status, and a human-readable message.

use thiserror::Error;

/// The fixed taxonomy of error kinds the core can surface.
///
/// This list is exhaustive and process-wide: it is never extended at
/// runtime. New server error codes that do not match the table in
/// [`crate::envelope::map_server_code`] map to [`ErrorKind::Unspecified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The operation completed successfully; no error present.
    Ok,
    /// The requested resource does not exist.
    NotFound,
    /// The controller itself is unreachable or returned a transport-level failure.
    ControllerUnavailable,
    /// No edge router / ingress node is available to route the session.
    GatewayUnavailable,
    /// Authentication failed, is missing, or has expired.
    AuthFailed,
    /// The submitted posture response was rejected as invalid.
    InvalidPosture,
    /// The supplied MFA token was invalid.
    MfaInvalidToken,
    /// MFA is already enrolled for this identity.
    MfaExists,
    /// MFA verification was requested but the identity has not enrolled.
    MfaNotEnrolled,
    /// The supplied enrollment JWT was invalid.
    JwtInvalid,
    /// The caller is not authorized to perform the operation.
    NotAuthorized,
    /// The client is in a state that does not permit the requested operation.
    InvalidState,
    /// The client was constructed with an invalid configuration.
    InvalidConfig,
    /// The client (or the specific request) was disabled/cancelled.
    Disabled,
    /// A server error code was received that does not appear in the mapping table.
    Unspecified,
}

/// The concrete error type returned by every fallible core operation.
///
/// Carries the internal [`ErrorKind`], the raw server error code (if the
/// failure came from a parsed envelope), the HTTP status (if any), and a
/// human-readable message.
#[derive(Debug, Error, Clone)]
#[error("{kind:?}: {message}")]
pub struct ControllerError {
    /// The internal error kind.
    pub kind: ErrorKind,
    /// The raw `error.code` string from the envelope, when present.
    pub server_code: Option<String>,
    /// The HTTP status code of the response that produced this error, when known.
    pub http_status: Option<u16>,
    /// A human-readable message.
    pub message: String,
}

impl ControllerError {
    /// Construct an error with just a kind and message; no server code or HTTP status.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            server_code: None,
            http_status: None,
            message: message.into(),
        }
    }

    /// Construct an error carrying an HTTP status.
    pub fn with_http_status(kind: ErrorKind, http_status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            server_code: None,
            http_status: Some(http_status),
            message: message.into(),
        }
    }

    /// Construct an error carrying a server error code and HTTP status.
    pub fn from_server_code(
        kind: ErrorKind,
        server_code: impl Into<String>,
        http_status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            server_code: Some(server_code.into()),
            http_status: Some(http_status),
            message: message.into(),
        }
    }

    /// The synthetic error returned synchronously when a non-pre-session
    /// operation is attempted without an API session token (spec §3, §4.C).
    pub fn auth_failed_no_session() -> Self {
        Self::new(ErrorKind::AuthFailed, "no api session token set")
    }

    /// The synthetic error delivered to every in-flight request's terminal
    /// callback after cancellation (spec §4.B, §5).
    pub fn disabled() -> Self {
        Self::new(ErrorKind::Disabled, "controller was closed or cancelled")
    }
}

impl From<reqwest::Error> for ControllerError {
    fn from(e: reqwest::Error) -> Self {
        ControllerError::new(ErrorKind::ControllerUnavailable, e.to_string())
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(e: serde_json::Error) -> Self {
        ControllerError::new(ErrorKind::InvalidState, format!("decode error: {e}"))
    }
}

/// Result type alias used throughout the core.
///
/// Unlike a top-level application binary, a library crate keeps its error
/// type concrete (not erased behind `anyhow::Error`) so callers can match on
/// [`ErrorKind`].
pub type Result<T> = std::result::Result<T, ControllerError>;
