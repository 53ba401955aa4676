use serde_json::{json, Value};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::DispatchError;
use crate::spec::{AutoResponse, BodyKind, ResponseMode};

/// Inline capacity for response headers before spilling to the heap.
pub const MAX_INLINE_HEADERS: usize = 8;

/// Extra response headers. Names are shared `Arc<str>`s since the same few
/// names (`allow`, `x-request-id`) repeat on every response.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Content type of every error envelope.
pub const ERROR_CONTENT_TYPE: &str = "application/json";

/// Message sent for unclassified failures in place of their detail.
pub const GENERIC_ERROR_MESSAGE: &str = "An internal error occurred";

/// What goes back over the wire: status, content type, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub content_type: String,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        WireResponse {
            status,
            content_type: content_type.into(),
            headers: HeaderVec::new(),
            body: body.into(),
        }
    }

    /// Serialize `body` as `application/json`.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, ERROR_CONTENT_TYPE, body.to_string())
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body.into())
    }

    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, ERROR_CONTENT_TYPE, Vec::new())
    }

    /// Add a header, replacing any earlier value with the same name
    /// (case-insensitive).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let existing = self
            .headers
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name));
        match existing {
            Some(idx) => self.headers[idx].1 = value,
            None => self.headers.push((Arc::from(name), value)),
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text, if it is.
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Body parsed as JSON, if it is.
    #[must_use]
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        status_reason(self.status)
    }
}

/// What a handler hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// Nothing: the declared status with an empty body.
    Null,
    /// A string, sent verbatim.
    Text(String),
    /// A structured value, serialized according to the route's body kind.
    Json(Value),
    /// A complete wire response; required by `Manual` routes.
    Wire(WireResponse),
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => HandlerOutput::Null,
            other => HandlerOutput::Json(other),
        }
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        HandlerOutput::Text(text)
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        HandlerOutput::Text(text.to_string())
    }
}

impl From<()> for HandlerOutput {
    fn from(_: ()) -> Self {
        HandlerOutput::Null
    }
}

impl From<WireResponse> for HandlerOutput {
    fn from(response: WireResponse) -> Self {
        HandlerOutput::Wire(response)
    }
}

/// Turns handler results and failures into wire responses.
///
/// The only place in the crate where an error becomes a status code and body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTranslator;

impl ResponseTranslator {
    #[must_use]
    pub fn new() -> Self {
        ResponseTranslator
    }

    /// Translate either outcome of a dispatch.
    #[must_use]
    pub fn translate(
        &self,
        result: Result<HandlerOutput, DispatchError>,
        mode: &ResponseMode,
    ) -> WireResponse {
        match result.and_then(|output| self.success(output, mode)) {
            Ok(response) => response,
            Err(err) => self.failure(&err),
        }
    }

    /// Shape a successful handler result.
    ///
    /// A `Manual` route must return [`HandlerOutput::Wire`]; anything else is
    /// a handler bug and is reported as an unclassified failure. A `Wire`
    /// result on an `Auto` route is passed through untouched.
    pub fn success(
        &self,
        output: HandlerOutput,
        mode: &ResponseMode,
    ) -> Result<WireResponse, DispatchError> {
        match (mode, output) {
            (_, HandlerOutput::Wire(response)) => Ok(response),
            (ResponseMode::Manual, other) => Err(DispatchError::Unclassified(anyhow::anyhow!(
                "manual route returned {} instead of a wire response",
                output_kind(&other)
            ))),
            (ResponseMode::Auto(auto), output) => Ok(shape(auto, output)),
        }
    }

    /// Error envelope for a failed request.
    ///
    /// Unclassified failures are logged here with their detail; the client
    /// only sees [`GENERIC_ERROR_MESSAGE`].
    #[must_use]
    pub fn failure(&self, err: &DispatchError) -> WireResponse {
        let status = err.status();
        let kind = err.kind();

        let body = match err {
            DispatchError::Validation { failures } => json!({
                "type": kind,
                "message": "request parameters failed validation",
                "errors": failures,
            }),
            DispatchError::Forbidden { .. } => json!({ "type": kind, "message": "access denied" }),
            DispatchError::Http(e) if !err.is_unclassified() => {
                json!({ "type": kind, "message": e.message })
            }
            _ if err.is_unclassified() => {
                error!(status, kind, error = %err, "Unclassified failure");
                json!({ "type": "UnclassifiedHandlerError", "message": GENERIC_ERROR_MESSAGE })
            }
            other => json!({ "type": kind, "message": other.to_string() }),
        };

        let mut response = WireResponse::json(status, &body);
        if let DispatchError::MethodNotAllowed { allowed, .. } = err {
            let verbs: Vec<&str> = allowed.iter().map(http::Method::as_str).collect();
            response.set_header("allow", verbs.join(", "));
        }
        debug!(status, kind, "Translated failure");
        response
    }
}

fn shape(auto: &AutoResponse, output: HandlerOutput) -> WireResponse {
    let body: Vec<u8> = match (auto.body, output) {
        (BodyKind::Empty, _) | (_, HandlerOutput::Null) | (_, HandlerOutput::Json(Value::Null)) => {
            Vec::new()
        }
        (_, HandlerOutput::Text(text)) | (_, HandlerOutput::Json(Value::String(text))) => {
            text.into_bytes()
        }
        (_, HandlerOutput::Json(value)) => value.to_string().into_bytes(),
        // Handled by the caller.
        (_, HandlerOutput::Wire(response)) => response.body,
    };
    WireResponse::new(auto.status, auto.content_type.clone(), body)
}

fn output_kind(output: &HandlerOutput) -> &'static str {
    match output {
        HandlerOutput::Null => "null",
        HandlerOutput::Text(_) => "text",
        HandlerOutput::Json(_) => "a JSON value",
        HandlerOutput::Wire(_) => "a wire response",
    }
}

/// Reason phrase for a status code.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        s if s < 200 => "Informational",
        s if s < 300 => "Success",
        s if s < 400 => "Redirection",
        s if s < 500 => "Client Error",
        _ => "Server Error",
    }
}

/// The `type` of an error envelope for a handler-raised status.
#[must_use]
pub fn status_kind(status: u16) -> &'static str {
    match status {
        400 => "BadRequestError",
        401 => "UnauthorizedError",
        403 => "ForbiddenError",
        404 => "NotFoundError",
        405 => "MethodNotAllowedError",
        409 => "ConflictError",
        422 => "UnprocessableEntityError",
        500 => "InternalServerError",
        s if (400..500).contains(&s) => "ClientError",
        _ => "ServerError",
    }
}
