//! Immutable service registry and its read-only snapshot.
//!
//! The registry is built once by [`crate::spec::MetadataResolver`] and shared
//! (behind an `Arc`) by every request; nothing mutates it afterwards, so
//! concurrent readers need no locking.
//!
//! [`RegistrySnapshot`] is the serializable view handed to an OpenAPI
//! generator: service names plus each route's verb, parameters, security and
//! response shape.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::security::SecurityRequirement;
use crate::spec::{ParameterSpec, ResponseMode, RouteSpec, ServiceDescriptor};

/// Services by name.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Arc<ServiceDescriptor>>,
}

impl ServiceRegistry {
    pub(crate) fn from_descriptors(descriptors: Vec<ServiceDescriptor>) -> Self {
        ServiceRegistry {
            services: descriptors
                .into_iter()
                .map(|d| (d.name.clone(), Arc::new(d)))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.services.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Services in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ServiceDescriptor>> {
        self.services.values()
    }

    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    /// Total number of routes across all services.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.services.values().map(|s| s.routes.len()).sum()
    }

    /// Every handler name referenced by a route.
    #[must_use]
    pub fn handler_names(&self) -> BTreeSet<&str> {
        self.iter()
            .flat_map(|s| s.routes.iter().map(|r| r.handler_name.as_str()))
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            services: self.iter().map(|s| ServiceSnapshot::from(s.as_ref())).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub services: Vec<ServiceSnapshot>,
}

impl RegistrySnapshot {
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSnapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub routes: Vec<RouteSnapshot>,
}

impl From<&ServiceDescriptor> for ServiceSnapshot {
    fn from(service: &ServiceDescriptor) -> Self {
        ServiceSnapshot {
            name: service.name.clone(),
            description: service.description.clone(),
            routes: service.routes.iter().map(|r| RouteSnapshot::from(r.as_ref())).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSnapshot {
    pub verb: String,
    pub handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<ParameterSnapshot>,
    pub security: SecuritySnapshot,
    pub response: ResponseSnapshot,
}

impl From<&RouteSpec> for RouteSnapshot {
    fn from(route: &RouteSpec) -> Self {
        RouteSnapshot {
            verb: route.verb.to_string(),
            handler: route.handler_name.clone(),
            description: route.description.clone(),
            parameters: route.parameters.iter().map(ParameterSnapshot::from).collect(),
            security: SecuritySnapshot::from(&route.security),
            response: ResponseSnapshot::from(&route.response),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&ParameterSpec> for ParameterSnapshot {
    fn from(p: &ParameterSpec) -> Self {
        ParameterSnapshot {
            name: p.name.clone(),
            param_type: p.param_type.as_str(),
            required: p.required,
            default: p.default.as_ref().map(|v| v.to_json()),
            minimum: p.min_value,
            maximum: p.max_value,
            min_length: p.min_length,
            max_length: p.max_length,
            allowed: p
                .allowed_values
                .as_ref()
                .map(|vs| vs.iter().map(|v| v.to_json()).collect()),
            filter: p.filter.as_ref().map(|f| f.name.clone()),
            description: p.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuritySnapshot {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl From<&SecurityRequirement> for SecuritySnapshot {
    fn from(req: &SecurityRequirement) -> Self {
        SecuritySnapshot {
            kind: req.kind(),
            expression: match req {
                SecurityRequirement::Expression(expr) => Some(expr.source.clone()),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSnapshot {
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl From<&ResponseMode> for ResponseSnapshot {
    fn from(mode: &ResponseMode) -> Self {
        match mode {
            ResponseMode::Manual => ResponseSnapshot {
                mode: "manual",
                status: None,
                body: None,
                content_type: None,
            },
            ResponseMode::Auto(auto) => ResponseSnapshot {
                mode: "auto",
                status: Some(auto.status),
                body: Some(auto.body.as_str()),
                content_type: Some(auto.content_type.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::spec::{resolve, ParameterDeclaration, RouteDeclaration, ServiceDeclaration};
    use serde_json::json;

    #[test]
    fn snapshot_serializes_routes() {
        let registry = resolve(&[ServiceDeclaration::new("users")
            .security("hasRole('admin')")
            .route(
                RouteDeclaration::get("list_users")
                    .param(ParameterDeclaration::new("age", "int").with_default(18).min(0.0)),
            )])
        .unwrap();

        let json = registry.snapshot().to_json();
        assert_eq!(
            json,
            json!({
                "services": [{
                    "name": "users",
                    "routes": [{
                        "verb": "GET",
                        "handler": "list_users",
                        "parameters": [{
                            "name": "age",
                            "type": "int",
                            "required": false,
                            "default": 18,
                            "minimum": 0.0
                        }],
                        "security": {"kind": "expression", "expression": "hasRole('admin')"},
                        "response": {
                            "mode": "auto",
                            "status": 200,
                            "body": "json",
                            "content_type": "application/json"
                        }
                    }]
                }]
            })
        );
    }

    #[test]
    fn counts_and_handler_names() {
        let registry = resolve(&[
            ServiceDeclaration::new("b").route(RouteDeclaration::get("h1")),
            ServiceDeclaration::new("a")
                .route(RouteDeclaration::get("h1"))
                .route(RouteDeclaration::post("h2")),
        ])
        .unwrap();
        assert_eq!(registry.service_names(), vec!["a", "b"]);
        assert_eq!(registry.route_count(), 3);
        assert_eq!(registry.handler_names().into_iter().collect::<Vec<_>>(), vec!["h1", "h2"]);
        assert!(registry.contains("a"));
        assert!(!registry.is_empty());
    }
}
