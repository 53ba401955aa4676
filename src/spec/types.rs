use http::Method;
use std::fmt;
use std::sync::Arc;

use crate::security::SecurityRequirement;
use crate::validator::{NamedFilter, ParamValue};

/// Default content type of automatically shaped responses.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Verbs a route may be declared for.
pub const SUPPORTED_VERBS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Int,
    Double,
    Bool,
    Array,
    Email,
    Url,
    JsonObject,
}

impl ParamType {
    /// Parse a declared type name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Some(ParamType::String),
            "int" | "integer" => Some(ParamType::Int),
            "double" | "float" | "number" => Some(ParamType::Double),
            "bool" | "boolean" => Some(ParamType::Bool),
            "array" | "list" => Some(ParamType::Array),
            "email" => Some(ParamType::Email),
            "url" | "uri" => Some(ParamType::Url),
            "json" | "object" | "json-object" => Some(ParamType::JsonObject),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Int => "int",
            ParamType::Double => "double",
            ParamType::Bool => "bool",
            ParamType::Array => "array",
            ParamType::Email => "email",
            ParamType::Url => "url",
            ParamType::JsonObject => "json-object",
        }
    }

    /// Types that accept `min`/`max`.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamType::Int | ParamType::Double)
    }

    /// Types that accept `min_length`/`max_length`.
    #[must_use]
    pub fn has_length(&self) -> bool {
        matches!(
            self,
            ParamType::String | ParamType::Email | ParamType::Url | ParamType::Array
        )
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved description of one request parameter.
///
/// Built by the resolver from a [`super::ParameterDeclaration`]; the builder
/// methods exist for constructing specs directly (tests, programmatic tables).
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<ParamValue>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub allowed_values: Option<Vec<ParamValue>>,
    pub filter: Option<NamedFilter>,
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        ParameterSpec {
            name: name.into(),
            param_type,
            required: false,
            default: None,
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            allowed_values: None,
            filter: None,
            description: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: ParamValue) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min_value = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max_value = Some(max);
        self
    }

    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    #[must_use]
    pub fn one_of(mut self, values: Vec<ParamValue>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: NamedFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Kind of body an automatically shaped response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Structured values are serialized; strings are sent verbatim.
    Json,
    /// Everything is rendered as text.
    Text,
    /// The body is always empty, whatever the handler returns.
    Empty,
}

impl BodyKind {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(BodyKind::Json),
            "text" | "raw" => Some(BodyKind::Text),
            "empty" | "none" => Some(BodyKind::Empty),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyKind::Json => "json",
            BodyKind::Text => "text",
            BodyKind::Empty => "empty",
        }
    }

    /// Content type used when a route declares none.
    #[must_use]
    pub fn default_content_type(&self) -> &'static str {
        match self {
            BodyKind::Json | BodyKind::Empty => DEFAULT_CONTENT_TYPE,
            BodyKind::Text => "text/plain; charset=utf-8",
        }
    }
}

/// Status, body kind and content type of an automatically shaped response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoResponse {
    pub status: u16,
    pub body: BodyKind,
    pub content_type: String,
}

impl Default for AutoResponse {
    fn default() -> Self {
        AutoResponse {
            status: 200,
            body: BodyKind::Json,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// How a handler's result becomes a wire response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMode {
    /// The handler builds the wire response itself.
    Manual,
    /// The translator shapes the response.
    Auto(AutoResponse),
}

impl Default for ResponseMode {
    fn default() -> Self {
        ResponseMode::Auto(AutoResponse::default())
    }
}

/// One verb of a service bound to a handler.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub verb: Method,
    pub handler_name: String,
    pub parameters: Vec<ParameterSpec>,
    pub security: SecurityRequirement,
    pub response: ResponseMode,
    pub description: Option<String>,
}

impl RouteSpec {
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// A named group of routes ("controller"), at most one route per verb.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub routes: Vec<Arc<RouteSpec>>,
}

impl ServiceDescriptor {
    /// The route declared for `verb`, if any.
    #[must_use]
    pub fn route_for(&self, verb: &Method) -> Option<&Arc<RouteSpec>> {
        self.routes.iter().find(|r| r.verb == *verb)
    }

    /// Declared verbs, in declaration order.
    #[must_use]
    pub fn verbs(&self) -> Vec<Method> {
        self.routes.iter().map(|r| r.verb.clone()).collect()
    }
}
