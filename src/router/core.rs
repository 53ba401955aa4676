//! Router core - two-stage (service, verb) lookup on the request hot path.

use http::Method;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::registry::ServiceRegistry;
use crate::spec::{RouteSpec, ServiceDescriptor};

/// Result of matching a (service, verb) pair to its route.
///
/// Both halves are `Arc`s into the shared registry, so a match costs two
/// reference-count increments and no copies of route metadata.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub service: Arc<ServiceDescriptor>,
    pub route: Arc<RouteSpec>,
}

impl RouteMatch {
    #[inline]
    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.route.handler_name
    }

    #[inline]
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service.name
    }

    #[inline]
    #[must_use]
    pub fn verb(&self) -> &Method {
        &self.route.verb
    }
}

/// Matches requests against the immutable registry.
///
/// Matching is exact on both stages: no prefixes, wildcards or priorities.
/// The registry guarantees at most one route per (service, verb), so the
/// first hit is the only hit.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ServiceRegistry>,
}

impl Router {
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        info!(
            services = registry.len(),
            routes = registry.route_count(),
            "Routing table loaded"
        );
        Router { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Look up the route for `verb` on `service`.
    ///
    /// # Errors
    ///
    /// * `ServiceNotFound` - no service has that name (404)
    /// * `MethodNotAllowed` - the service exists but declares no route for
    ///   the verb (405); carries the verbs it does declare
    pub fn route(&self, service: &str, verb: &Method) -> Result<RouteMatch, DispatchError> {
        let start = Instant::now();

        let Some(descriptor) = self.registry.get(service) else {
            warn!(
                service = %service,
                verb = %verb,
                duration_us = start.elapsed().as_micros(),
                "No service matched"
            );
            return Err(DispatchError::ServiceNotFound {
                service: service.to_string(),
            });
        };

        let Some(route) = descriptor.route_for(verb) else {
            let allowed = descriptor.verbs();
            warn!(
                service = %service,
                verb = %verb,
                allowed = ?allowed,
                duration_us = start.elapsed().as_micros(),
                "Verb not declared for service"
            );
            return Err(DispatchError::MethodNotAllowed {
                service: service.to_string(),
                verb: verb.clone(),
                allowed,
            });
        };

        debug!(
            service = %service,
            verb = %verb,
            handler_name = %route.handler_name,
            duration_us = start.elapsed().as_micros(),
            "Route matched"
        );
        Ok(RouteMatch {
            service: Arc::clone(descriptor),
            route: Arc::clone(route),
        })
    }

    /// Verbs declared by `service`, or `None` if it does not exist.
    #[must_use]
    pub fn allowed_verbs(&self, service: &str) -> Option<Vec<Method>> {
        self.registry.get(service).map(|s| s.verbs())
    }

    /// `(verb, service, handler)` for every route, for startup diagnostics.
    #[must_use]
    pub fn route_table(&self) -> Vec<(Method, String, String)> {
        self.registry
            .iter()
            .flat_map(|s| {
                s.routes
                    .iter()
                    .map(|r| (r.verb.clone(), s.name.clone(), r.handler_name.clone()))
            })
            .collect()
    }
}
