use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top level of a services file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicesDocument {
    #[serde(default)]
    pub services: Vec<ServiceDeclaration>,
}

/// Declaration of one service, as written by hand or loaded from a file.
///
/// Nothing here is checked until the declarations go through
/// [`super::MetadataResolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityDeclaration>,
    #[serde(default)]
    pub routes: Vec<RouteDeclaration>,
}

impl ServiceDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        ServiceDeclaration {
            name: name.into(),
            description: None,
            security: None,
            routes: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Add a service-level security attribute (`public`, `authenticated` or
    /// an expression). Calling it again adds another attribute.
    #[must_use]
    pub fn security(mut self, attribute: impl Into<String>) -> Self {
        self.security = Some(SecurityDeclaration::push(self.security.take(), attribute.into()));
        self
    }

    #[must_use]
    pub fn route(mut self, route: RouteDeclaration) -> Self {
        self.routes.push(route);
        self
    }
}

/// Declaration of one verb of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    pub verb: String,
    #[serde(alias = "handler_name", alias = "handlerRef")]
    pub handler: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RouteDeclaration {
    pub fn new(verb: impl Into<String>, handler: impl Into<String>) -> Self {
        RouteDeclaration {
            verb: verb.into(),
            handler: handler.into(),
            parameters: Vec::new(),
            security: None,
            response: None,
            description: None,
        }
    }

    pub fn get(handler: impl Into<String>) -> Self {
        Self::new("GET", handler)
    }

    pub fn post(handler: impl Into<String>) -> Self {
        Self::new("POST", handler)
    }

    pub fn put(handler: impl Into<String>) -> Self {
        Self::new("PUT", handler)
    }

    pub fn patch(handler: impl Into<String>) -> Self {
        Self::new("PATCH", handler)
    }

    pub fn delete(handler: impl Into<String>) -> Self {
        Self::new("DELETE", handler)
    }

    #[must_use]
    pub fn param(mut self, param: ParameterDeclaration) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a route-level security attribute. Any route-level attribute
    /// replaces the service-level requirement for this route.
    #[must_use]
    pub fn security(mut self, attribute: impl Into<String>) -> Self {
        self.security = Some(SecurityDeclaration::push(self.security.take(), attribute.into()));
        self
    }

    #[must_use]
    pub fn response(mut self, response: ResponseDeclaration) -> Self {
        self.response = Some(response);
        self
    }

    #[must_use]
    pub fn manual(self) -> Self {
        self.response(ResponseDeclaration::manual())
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Declaration of one parameter. `type` is kept as text so unknown names can
/// be reported with their location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, alias = "minValue", alias = "minimum", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, alias = "maxValue", alias = "maximum", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, alias = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, alias = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterDeclaration {
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        ParameterDeclaration {
            name: name.into(),
            param_type: param_type.into(),
            required: false,
            default: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            allowed: None,
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
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
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
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filter = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// One security attribute or a list of attributes on the same level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecurityDeclaration {
    Single(String),
    Combined(Vec<String>),
}

impl SecurityDeclaration {
    #[must_use]
    pub fn attributes(&self) -> Vec<&str> {
        match self {
            SecurityDeclaration::Single(attr) => vec![attr.as_str()],
            SecurityDeclaration::Combined(attrs) => attrs.iter().map(String::as_str).collect(),
        }
    }

    fn push(existing: Option<Self>, attribute: String) -> Self {
        match existing {
            None => SecurityDeclaration::Single(attribute),
            Some(SecurityDeclaration::Single(first)) => {
                SecurityDeclaration::Combined(vec![first, attribute])
            }
            Some(SecurityDeclaration::Combined(mut attrs)) => {
                attrs.push(attribute);
                SecurityDeclaration::Combined(attrs)
            }
        }
    }
}

/// Response shaping: `manual`, `auto`, or an object with the auto settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseDeclaration {
    Mode(String),
    Auto(AutoResponseDeclaration),
}

impl ResponseDeclaration {
    #[must_use]
    pub fn manual() -> Self {
        ResponseDeclaration::Mode("manual".to_string())
    }

    #[must_use]
    pub fn auto() -> Self {
        ResponseDeclaration::Auto(AutoResponseDeclaration::default())
    }

    /// Auto response with an explicit default status.
    #[must_use]
    pub fn status(status: u16) -> Self {
        ResponseDeclaration::Auto(AutoResponseDeclaration {
            status: Some(status),
            ..AutoResponseDeclaration::default()
        })
    }

    /// Set the body kind (`json`, `text`, `empty`) of an auto response.
    #[must_use]
    pub fn body(self, kind: impl Into<String>) -> Self {
        let mut auto = self.into_auto();
        auto.body = Some(kind.into());
        ResponseDeclaration::Auto(auto)
    }

    #[must_use]
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        let mut auto = self.into_auto();
        auto.content_type = Some(content_type.into());
        ResponseDeclaration::Auto(auto)
    }

    fn into_auto(self) -> AutoResponseDeclaration {
        match self {
            ResponseDeclaration::Auto(auto) => auto,
            ResponseDeclaration::Mode(_) => AutoResponseDeclaration::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoResponseDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, alias = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}
