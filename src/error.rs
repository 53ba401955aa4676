//! # Error Types
//!
//! Every failure the dispatch pipeline can produce, grouped the way they are
//! surfaced:
//!
//! - [`MetadataError`] - raised while building the route table, never at request time
//! - [`ParamFailure`] - one invalid or missing parameter; collected, never thrown alone
//! - [`HttpException`] - a classified failure raised by a handler (passes its status through)
//! - [`HandlerError`] - what a handler may return: classified or unclassified
//! - [`DispatchError`] - the terminal outcome of a failed request, one HTTP status each
//!
//! Only [`crate::server::ResponseTranslator`] turns these into wire responses.

use http::Method;
use serde::Serialize;
use thiserror::Error;

use crate::server::status_kind;

/// Failure while resolving declarative service metadata into a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// Two declarations for the same service register the same verb.
    #[error("duplicate route: service '{service}' declares {verb} more than once")]
    DuplicateRoute { service: String, verb: String },

    /// A declaration is malformed (unknown type, bad expression, broken bounds, ...).
    #[error("invalid metadata at {location}: {message}")]
    InvalidMetadata { location: String, message: String },
}

impl MetadataError {
    pub(crate) fn invalid(location: impl Into<String>, message: impl Into<String>) -> Self {
        MetadataError::InvalidMetadata {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Name of the error as reported in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataError::DuplicateRoute { .. } => "DuplicateRouteError",
            MetadataError::InvalidMetadata { .. } => "InvalidMetadataError",
        }
    }
}

/// Why a single parameter was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParamFailureKind {
    #[serde(rename = "MissingParameterError")]
    MissingParameter,
    #[serde(rename = "InvalidTypeError")]
    InvalidType,
    #[serde(rename = "OutOfRangeError")]
    OutOfRange,
    #[serde(rename = "InvalidValueError")]
    InvalidValue,
    #[serde(rename = "FilterRejectedError")]
    FilterRejected,
}

impl ParamFailureKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamFailureKind::MissingParameter => "MissingParameterError",
            ParamFailureKind::InvalidType => "InvalidTypeError",
            ParamFailureKind::OutOfRange => "OutOfRangeError",
            ParamFailureKind::InvalidValue => "InvalidValueError",
            ParamFailureKind::FilterRejected => "FilterRejectedError",
        }
    }
}

impl std::fmt::Display for ParamFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rejected parameter, as listed in the aggregated 400 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{parameter}: {message}")]
pub struct ParamFailure {
    pub parameter: String,
    pub kind: ParamFailureKind,
    pub message: String,
}

impl ParamFailure {
    pub fn new(
        parameter: impl Into<String>,
        kind: ParamFailureKind,
        message: impl Into<String>,
    ) -> Self {
        ParamFailure {
            parameter: parameter.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Structured failure with an explicit HTTP status.
///
/// Handlers return this (through [`HandlerError::Http`]) when the failure is
/// meant for the client: the status and message are sent unchanged inside the
/// `{type, message}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status} {message}")]
pub struct HttpException {
    pub status: u16,
    pub message: String,
}

impl HttpException {
    /// Create an exception with an arbitrary status. Statuses outside
    /// 400..=599 are clamped to 500 when translated.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        HttpException {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// The `type` field of the error envelope, derived from the status.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        status_kind(self.status)
    }
}

/// Failure returned by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Classified failure: its status passes through.
    #[error(transparent)]
    Http(#[from] HttpException),

    /// Anything else. Downgraded to a generic 500; the detail is only logged.
    #[error("unclassified handler failure: {0}")]
    Unclassified(anyhow::Error),
}

impl HandlerError {
    pub fn unclassified(err: impl Into<anyhow::Error>) -> Self {
        HandlerError::Unclassified(err.into())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Unclassified(err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Unclassified(err.into())
    }
}

/// Terminal outcome of a request that did not produce a handler result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("service '{service}' not found")]
    ServiceNotFound { service: String },

    #[error("method {verb} not allowed for service '{service}'")]
    MethodNotAllowed {
        service: String,
        verb: Method,
        allowed: Vec<Method>,
    },

    #[error("{} invalid parameter(s)", .failures.len())]
    Validation { failures: Vec<ParamFailure> },

    #[error("authentication required")]
    Unauthorized,

    #[error("access denied: {reason}")]
    Forbidden { reason: String },

    #[error(transparent)]
    Http(HttpException),

    #[error("unclassified handler failure: {0}")]
    Unclassified(anyhow::Error),
}

impl DispatchError {
    /// HTTP status this error is reported with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::ServiceNotFound { .. } => 404,
            DispatchError::MethodNotAllowed { .. } => 405,
            DispatchError::Validation { .. } => 400,
            DispatchError::Unauthorized => 401,
            DispatchError::Forbidden { .. } => 403,
            DispatchError::Http(e) if (400..=599).contains(&e.status) => e.status,
            DispatchError::Http(_) | DispatchError::Unclassified(_) => 500,
        }
    }

    /// The `type` field of the error envelope.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::ServiceNotFound { .. } => "ServiceNotFoundError",
            DispatchError::MethodNotAllowed { .. } => "MethodNotAllowedError",
            DispatchError::Validation { .. } => "ValidationError",
            DispatchError::Unauthorized => "UnauthorizedError",
            DispatchError::Forbidden { .. } => "ForbiddenError",
            DispatchError::Http(_) => status_kind(self.status()),
            DispatchError::Unclassified(_) => "UnclassifiedHandlerError",
        }
    }

    /// True for failures whose detail must not reach the client.
    #[must_use]
    pub fn is_unclassified(&self) -> bool {
        self.status() == 500
    }
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Http(e) => DispatchError::Http(e),
            HandlerError::Unclassified(e) => DispatchError::Unclassified(e),
        }
    }
}
