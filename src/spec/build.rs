use http::Method;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::declare::{
    ParameterDeclaration, ResponseDeclaration, RouteDeclaration, SecurityDeclaration,
    ServiceDeclaration,
};
use super::types::{
    AutoResponse, BodyKind, ParamType, ParameterSpec, ResponseMode, RouteSpec, ServiceDescriptor,
    DEFAULT_CONTENT_TYPE, SUPPORTED_VERBS,
};
use crate::error::MetadataError;
use crate::registry::ServiceRegistry;
use crate::security::SecurityRequirement;
use crate::validator::{check_constraints, coerce, FilterRegistry, ParamValue};

/// Builds the immutable route table from service declarations.
///
/// Resolution is a pure transform: the first problem found aborts it with a
/// [`MetadataError`] naming where in the declarations it sits.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    filters: FilterRegistry,
    default_content_type: String,
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes collected for one service name across declarations.
struct PendingService {
    description: Option<String>,
    routes: Vec<Arc<RouteSpec>>,
}

impl MetadataResolver {
    /// Resolver with the built-in filters and `application/json` responses.
    #[must_use]
    pub fn new() -> Self {
        MetadataResolver {
            filters: FilterRegistry::with_builtins(),
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    /// Filters that `filter:` references are looked up in.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    /// Content type for JSON and empty auto responses that declare none.
    #[must_use]
    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Resolve declarations into a registry.
    ///
    /// Declarations that share a service name are merged; a verb declared
    /// twice for the same service fails with `DuplicateRouteError`.
    pub fn resolve(
        &self,
        declarations: &[ServiceDeclaration],
    ) -> Result<ServiceRegistry, MetadataError> {
        let mut pending: BTreeMap<String, PendingService> = BTreeMap::new();

        for decl in declarations {
            let name = check_service_name(&decl.name)?;
            let service_security = decl
                .security
                .as_ref()
                .map(|s| parse_security(s, &format!("service '{name}'")))
                .transpose()?;

            let entry = pending.entry(name.clone()).or_insert(PendingService {
                description: None,
                routes: Vec::new(),
            });
            if entry.description.is_none() {
                entry.description.clone_from(&decl.description);
            }

            for route_decl in &decl.routes {
                let route = self.resolve_route(&name, route_decl, service_security.as_ref())?;
                if entry.routes.iter().any(|r| r.verb == route.verb) {
                    return Err(MetadataError::DuplicateRoute {
                        service: name,
                        verb: route.verb.to_string(),
                    });
                }
                debug!(
                    service = %name,
                    verb = %route.verb,
                    handler_name = %route.handler_name,
                    security = %route.security,
                    params = route.parameters.len(),
                    "Resolved route"
                );
                entry.routes.push(Arc::new(route));
            }
        }

        let services: Vec<ServiceDescriptor> = pending
            .into_iter()
            .map(|(name, p)| ServiceDescriptor {
                name,
                description: p.description,
                routes: p.routes,
            })
            .collect();
        let registry = ServiceRegistry::from_descriptors(services);
        info!(
            services = registry.len(),
            routes = registry.route_count(),
            "Service registry built"
        );
        Ok(registry)
    }

    fn resolve_route(
        &self,
        service: &str,
        decl: &RouteDeclaration,
        service_security: Option<&SecurityRequirement>,
    ) -> Result<RouteSpec, MetadataError> {
        let verb = parse_verb(&decl.verb).ok_or_else(|| {
            MetadataError::invalid(
                format!("service '{service}'"),
                format!("unsupported verb '{}'", decl.verb),
            )
        })?;
        let location = format!("{service} {verb}");

        let handler_name = decl.handler.trim();
        if handler_name.is_empty() {
            return Err(MetadataError::invalid(location, "handler name must not be empty"));
        }

        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(decl.parameters.len());
        for param in &decl.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(MetadataError::invalid(
                    &location,
                    format!("parameter '{}' declared more than once", param.name),
                ));
            }
            parameters.push(self.resolve_parameter(&location, param)?);
        }

        let route_security = decl
            .security
            .as_ref()
            .map(|s| parse_security(s, &location))
            .transpose()?;
        let security = SecurityRequirement::effective(service_security, route_security.as_ref());

        let response = self.resolve_response(&location, decl.response.as_ref())?;

        Ok(RouteSpec {
            verb,
            handler_name: handler_name.to_string(),
            parameters,
            security,
            response,
            description: decl.description.clone(),
        })
    }

    fn resolve_parameter(
        &self,
        route: &str,
        decl: &ParameterDeclaration,
    ) -> Result<ParameterSpec, MetadataError> {
        let name = decl.name.trim();
        if name.is_empty() {
            return Err(MetadataError::invalid(route, "parameter name must not be empty"));
        }
        let location = format!("{route} parameter '{name}'");
        let invalid = |message: String| MetadataError::invalid(&location, message);

        let param_type = ParamType::parse(&decl.param_type)
            .ok_or_else(|| invalid(format!("unknown parameter type '{}'", decl.param_type)))?;

        if decl.required && decl.default.is_some() {
            return Err(invalid("a required parameter cannot declare a default".into()));
        }

        if decl.min.is_some() || decl.max.is_some() {
            if !param_type.is_numeric() {
                return Err(invalid(format!("min/max do not apply to type {param_type}")));
            }
            if decl.min.into_iter().chain(decl.max).any(|b| !b.is_finite()) {
                return Err(invalid("min/max must be finite numbers".into()));
            }
        }
        if let (Some(min), Some(max)) = (decl.min, decl.max) {
            if min > max {
                return Err(invalid(format!("min {min} is greater than max {max}")));
            }
        }

        if (decl.min_length.is_some() || decl.max_length.is_some()) && !param_type.has_length() {
            return Err(invalid(format!(
                "min_length/max_length do not apply to type {param_type}"
            )));
        }
        if let (Some(min), Some(max)) = (decl.min_length, decl.max_length) {
            if min > max {
                return Err(invalid(format!(
                    "min_length {min} is greater than max_length {max}"
                )));
            }
        }

        let filter = match &decl.filter {
            Some(filter_name) => Some(
                self.filters
                    .get(filter_name)
                    .ok_or_else(|| invalid(format!("unknown filter '{filter_name}'")))?,
            ),
            None => None,
        };

        let allowed_values = match &decl.allowed {
            Some(values) if values.is_empty() => {
                return Err(invalid("enum must list at least one value".into()));
            }
            Some(values) => Some(
                values
                    .iter()
                    .map(|v| enum_member(param_type, v))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|msg| invalid(format!("enum member {msg}")))?,
            ),
            None => None,
        };

        let mut spec = ParameterSpec {
            name: name.to_string(),
            param_type,
            required: decl.required,
            default: None,
            min_value: decl.min,
            max_value: decl.max,
            min_length: decl.min_length,
            max_length: decl.max_length,
            allowed_values,
            filter,
            description: decl.description.clone(),
        };

        if let Some(raw_default) = &decl.default {
            let value = coerce(param_type, raw_default)
                .map_err(|msg| invalid(format!("default value: {msg}")))?;
            check_constraints(&spec, &value)
                .map_err(|failure| invalid(format!("default value: {}", failure.message)))?;
            spec.default = Some(value);
        }

        Ok(spec)
    }

    fn resolve_response(
        &self,
        location: &str,
        decl: Option<&ResponseDeclaration>,
    ) -> Result<ResponseMode, MetadataError> {
        let auto = match decl {
            None => None,
            Some(ResponseDeclaration::Mode(mode)) => match mode.trim().to_ascii_lowercase().as_str() {
                "manual" => return Ok(ResponseMode::Manual),
                "auto" => None,
                other => {
                    return Err(MetadataError::invalid(
                        location,
                        format!("unknown response mode '{other}' (expected manual or auto)"),
                    ))
                }
            },
            Some(ResponseDeclaration::Auto(auto)) => Some(auto),
        };

        let status = auto.and_then(|a| a.status).unwrap_or(200);
        if !(100..=599).contains(&status) {
            return Err(MetadataError::invalid(
                location,
                format!("response status {status} is outside 100-599"),
            ));
        }

        let body = match auto.and_then(|a| a.body.as_deref()) {
            Some(name) => BodyKind::parse(name).ok_or_else(|| {
                MetadataError::invalid(location, format!("unknown response body kind '{name}'"))
            })?,
            None => BodyKind::Json,
        };

        let content_type = match auto.and_then(|a| a.content_type.as_deref()) {
            Some(ct) if !ct.trim().is_empty() => ct.trim().to_string(),
            _ if body == BodyKind::Text => body.default_content_type().to_string(),
            _ => self.default_content_type.clone(),
        };

        Ok(ResponseMode::Auto(AutoResponse {
            status,
            body,
            content_type,
        }))
    }
}

/// Resolve with the default resolver.
pub fn resolve(declarations: &[ServiceDeclaration]) -> Result<ServiceRegistry, MetadataError> {
    MetadataResolver::new().resolve(declarations)
}

fn check_service_name(name: &str) -> Result<String, MetadataError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MetadataError::invalid("service", "service name must not be empty"));
    }
    if trimmed.contains('/') || trimmed.chars().any(char::is_whitespace) {
        return Err(MetadataError::invalid(
            format!("service '{trimmed}'"),
            "service name must not contain '/' or whitespace",
        ));
    }
    Ok(trimmed.to_string())
}

fn parse_verb(verb: &str) -> Option<Method> {
    let upper = verb.trim().to_ascii_uppercase();
    SUPPORTED_VERBS.iter().find(|m| m.as_str() == upper).cloned()
}

fn parse_security(
    decl: &SecurityDeclaration,
    location: &str,
) -> Result<SecurityRequirement, MetadataError> {
    SecurityRequirement::from_attributes(&decl.attributes())
        .map_err(|e| MetadataError::invalid(location, e.to_string()))
}

/// Enum members of array parameters are element values; everything else is
/// coerced to the declared type.
fn enum_member(param_type: ParamType, raw: &Value) -> Result<ParamValue, String> {
    if param_type != ParamType::Array {
        return coerce(param_type, raw).map_err(|msg| format!("{raw}: {msg}"));
    }
    match raw {
        Value::String(s) => Ok(ParamValue::String(s.clone())),
        Value::Bool(b) => Ok(ParamValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(ParamValue::Int(i)),
            None => n
                .as_f64()
                .map(ParamValue::Double)
                .ok_or_else(|| format!("{raw}: not a representable number")),
        },
        other => Err(format!("{other}: array enum members must be scalars")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::declare::ResponseDeclaration;
    use serde_json::json;

    fn users() -> ServiceDeclaration {
        ServiceDeclaration::new("users").route(
            RouteDeclaration::get("list_users")
                .param(ParameterDeclaration::new("name", "string").required())
                .param(
                    ParameterDeclaration::new("age", "int")
                        .with_default(18)
                        .min(0.0)
                        .max(150.0),
                ),
        )
    }

    fn invalid_message(result: Result<ServiceRegistry, MetadataError>) -> String {
        match result {
            Err(MetadataError::InvalidMetadata { message, .. }) => message,
            other => panic!("expected InvalidMetadata, got {other:?}"),
        }
    }

    #[test]
    fn resolves_defaults_and_response() {
        let registry = resolve(&[users()]).unwrap();
        let route = registry.get("users").unwrap().route_for(&Method::GET).unwrap().clone();
        assert_eq!(route.handler_name, "list_users");
        assert_eq!(route.parameter("age").unwrap().default, Some(ParamValue::Int(18)));
        assert_eq!(route.security, SecurityRequirement::Public);
        assert_eq!(route.response, ResponseMode::default());
    }

    #[test]
    fn duplicate_verb_across_declarations() {
        let again = ServiceDeclaration::new("users").route(RouteDeclaration::new("get", "other"));
        let err = resolve(&[users(), again]).unwrap_err();
        assert_eq!(
            err,
            MetadataError::DuplicateRoute {
                service: "users".into(),
                verb: "GET".into()
            }
        );
    }

    #[test]
    fn merges_declarations_with_distinct_verbs() {
        let more = ServiceDeclaration::new("users").route(RouteDeclaration::post("create_user"));
        let registry = resolve(&[users(), more]).unwrap();
        assert_eq!(
            registry.get("users").unwrap().verbs(),
            vec![Method::GET, Method::POST]
        );
    }

    #[test]
    fn rejects_bad_parameter_declarations() {
        let cases = [
            (ParameterDeclaration::new("x", "uuid"), "unknown parameter type"),
            (
                ParameterDeclaration::new("x", "int").required().with_default(1),
                "required parameter",
            ),
            (ParameterDeclaration::new("x", "int").min(5.0).max(1.0), "greater than max"),
            (ParameterDeclaration::new("x", "string").min(1.0), "do not apply"),
            (ParameterDeclaration::new("x", "bool").max_length(3), "do not apply"),
            (ParameterDeclaration::new("x", "int").with_default("ten"), "default value"),
            (
                ParameterDeclaration::new("x", "int").max(10.0).with_default(11),
                "default value",
            ),
            (ParameterDeclaration::new("x", "int").one_of(["a"]), "enum member"),
            (ParameterDeclaration::new("x", "string").filter("rot13"), "unknown filter"),
        ];
        for (param, expected) in cases {
            let decl = ServiceDeclaration::new("s").route(RouteDeclaration::get("h").param(param));
            let message = invalid_message(resolve(&[decl]));
            assert!(message.contains(expected), "{message:?} should mention {expected:?}");
        }
    }

    #[test]
    fn rejects_bad_routes() {
        let bad_verb = ServiceDeclaration::new("s").route(RouteDeclaration::new("HEAD", "h"));
        assert!(invalid_message(resolve(&[bad_verb])).contains("unsupported verb"));

        let bad_expr =
            ServiceDeclaration::new("s").route(RouteDeclaration::get("h").security("hasRole(admin)"));
        assert!(resolve(&[bad_expr]).is_err());

        let bad_status = ServiceDeclaration::new("s")
            .route(RouteDeclaration::get("h").response(ResponseDeclaration::status(700)));
        assert!(invalid_message(resolve(&[bad_status])).contains("outside"));

        let dup_param = ServiceDeclaration::new("s").route(
            RouteDeclaration::get("h")
                .param(ParameterDeclaration::new("a", "int"))
                .param(ParameterDeclaration::new("a", "string")),
        );
        assert!(invalid_message(resolve(&[dup_param])).contains("more than once"));

        assert!(resolve(&[ServiceDeclaration::new("a/b")]).is_err());
        assert!(resolve(&[ServiceDeclaration::new(" ")]).is_err());
    }

    #[test]
    fn route_security_overrides_service_security() {
        let decl = ServiceDeclaration::new("secure")
            .security("authenticated")
            .route(RouteDeclaration::get("open").security("public"))
            .route(RouteDeclaration::post("write"));
        let registry = resolve(&[decl]).unwrap();
        let service = registry.get("secure").unwrap();
        assert_eq!(
            service.route_for(&Method::GET).unwrap().security,
            SecurityRequirement::Public
        );
        assert_eq!(
            service.route_for(&Method::POST).unwrap().security,
            SecurityRequirement::RequiresAuthentication
        );
    }

    #[test]
    fn response_content_types() {
        let decl = ServiceDeclaration::new("s")
            .route(RouteDeclaration::get("a").response(ResponseDeclaration::auto().body("text")))
            .route(RouteDeclaration::post("b").response(ResponseDeclaration::status(201)))
            .route(RouteDeclaration::put("c").manual());
        let registry = MetadataResolver::new()
            .with_default_content_type("application/vnd.api+json")
            .resolve(&[decl])
            .unwrap();
        let service = registry.get("s").unwrap();
        let auto = |verb: &Method| match &service.route_for(verb).unwrap().response {
            ResponseMode::Auto(a) => a.clone(),
            ResponseMode::Manual => panic!("expected auto"),
        };
        assert_eq!(auto(&Method::GET).content_type, "text/plain; charset=utf-8");
        assert_eq!(auto(&Method::POST).status, 201);
        assert_eq!(auto(&Method::POST).content_type, "application/vnd.api+json");
        assert_eq!(
            service.route_for(&Method::PUT).unwrap().response,
            ResponseMode::Manual
        );
    }

    #[test]
    fn array_enum_members_stay_scalar() {
        let decl = ServiceDeclaration::new("s").route(
            RouteDeclaration::get("h")
                .param(ParameterDeclaration::new("tags", "array").one_of([json!("a"), json!(2)])),
        );
        let registry = resolve(&[decl]).unwrap();
        let route = registry.get("s").unwrap().routes[0].clone();
        assert_eq!(
            route.parameter("tags").unwrap().allowed_values,
            Some(vec![ParamValue::from("a"), ParamValue::Int(2)])
        );
    }
}
