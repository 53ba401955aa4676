//! Dispatcher core - the per-request pipeline.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::request::{Handler, HandlerRequest, HandlerResult, RequestContext};
use crate::error::DispatchError;
use crate::middleware::Middleware;
use crate::registry::ServiceRegistry;
use crate::router::{RouteMatch, Router};
use crate::security::{AccessDecision, AuthorizationEvaluator};
use crate::server::{ResponseTranslator, WireResponse};
use crate::validator::validate_params;

/// Header carrying the request id on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Matches, validates, authorizes, invokes and translates.
///
/// Holds only data that is immutable after startup (the registry, handlers,
/// middleware), so a single `Dispatcher` can serve any number of threads
/// through a shared reference.
pub struct Dispatcher {
    router: Router,
    handlers: HashMap<String, Arc<dyn Handler>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    evaluator: AuthorizationEvaluator,
    translator: ResponseTranslator,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        handlers.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("handlers", &handlers)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

impl Dispatcher {
    /// A dispatcher over `registry` with no handlers registered yet.
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Dispatcher {
            router: Router::new(registry),
            handlers: HashMap::new(),
            middlewares: Vec::new(),
            evaluator: AuthorizationEvaluator::new(),
            translator: ResponseTranslator::new(),
        }
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        self.router.registry()
    }

    #[must_use]
    pub fn translator(&self) -> &ResponseTranslator {
        &self.translator
    }

    /// Bind a closure to `name`. A handler already registered under the same
    /// name is replaced.
    pub fn register_handler<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&HandlerRequest<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(name, Arc::new(handler));
    }

    /// Bind a shared handler object to `name`.
    pub fn register(&mut self, name: &str, handler: Arc<dyn Handler>) {
        if self.handlers.insert(name.to_string(), handler).is_some() {
            warn!(handler_name = %name, "Replaced existing handler");
        }
        info!(
            handler_name = %name,
            total_handlers = self.handlers.len(),
            declared = self.registry().handler_names().contains(name),
            "Handler registered"
        );
    }

    /// Add middleware around handler invocation. Runs in insertion order.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Handler names referenced by routes but not registered.
    #[must_use]
    pub fn missing_handlers(&self) -> Vec<String> {
        self.registry()
            .handler_names()
            .into_iter()
            .filter(|name| !self.handlers.contains_key(*name))
            .map(str::to_string)
            .collect()
    }

    /// Handle one request to completion. Never panics on behalf of a
    /// handler and always yields exactly one response.
    pub fn dispatch(&self, mut ctx: RequestContext) -> WireResponse {
        let start = Instant::now();

        let mut response = match self.router.route(&ctx.service, &ctx.verb) {
            Ok(matched) => self.dispatch_matched(&matched, &mut ctx),
            Err(err) => self.translator.failure(&err),
        };
        response.set_header(REQUEST_ID_HEADER, ctx.request_id.to_string());

        let latency = start.elapsed();
        if response.status >= 500 {
            warn!(
                request_id = %ctx.request_id,
                service = %ctx.service,
                verb = %ctx.verb,
                status = response.status,
                latency_ms = latency.as_millis() as u64,
                "Request failed"
            );
        } else {
            info!(
                request_id = %ctx.request_id,
                service = %ctx.service,
                verb = %ctx.verb,
                status = response.status,
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            );
        }
        response
    }

    fn dispatch_matched(&self, matched: &RouteMatch, ctx: &mut RequestContext) -> WireResponse {
        let route = &matched.route;
        let request_id = ctx.request_id;

        // Every declared parameter is checked; failures are aggregated.
        let params = match validate_params(&route.parameters, &ctx.params) {
            Ok(params) => params,
            Err(failures) => {
                debug!(
                    request_id = %request_id,
                    handler_name = %route.handler_name,
                    failures = failures.len(),
                    parameters = ?failures.iter().map(|f| f.parameter.as_str()).collect::<Vec<_>>(),
                    "Parameter validation failed"
                );
                return self.translator.failure(&DispatchError::Validation { failures });
            }
        };

        // The principal is only resolved once the request is known to be well-formed.
        let principal = ctx.principal_for(&route.security);
        match self.evaluator.evaluate(&route.security, principal.as_ref()) {
            AccessDecision::Allow => {}
            AccessDecision::Unauthorized => {
                return self.translator.failure(&DispatchError::Unauthorized);
            }
            AccessDecision::Forbidden { reason } => {
                debug!(request_id = %request_id, reason = %reason, "Access forbidden");
                return self.translator.failure(&DispatchError::Forbidden { reason });
            }
        }

        let Some(handler) = self.handlers.get(&route.handler_name) else {
            error!(
                request_id = %request_id,
                handler_name = %route.handler_name,
                available_handlers = self.handlers.len(),
                "Handler not registered"
            );
            return self.translator.failure(&DispatchError::Unclassified(anyhow::anyhow!(
                "no handler registered under '{}'",
                route.handler_name
            )));
        };

        let req = HandlerRequest {
            request_id,
            service: matched.service_name(),
            verb: &route.verb,
            handler_name: &route.handler_name,
            params: &params,
            principal: principal.as_ref(),
            raw: &ctx.params,
        };

        let early = self.middlewares.iter().enumerate().find_map(|(idx, mw)| {
            let early = mw.before(&req)?;
            debug!(
                request_id = %request_id,
                middleware_idx = idx,
                status = early.status,
                "Middleware returned early response"
            );
            Some(early)
        });

        let (mut response, latency) = match early {
            Some(r) => (r, Duration::ZERO),
            None => {
                let started = Instant::now();
                let result = self.invoke(handler.as_ref(), &req);
                let response = self.translator.translate(result, &route.response);
                (response, started.elapsed())
            }
        };

        for mw in &self.middlewares {
            mw.after(&req, &mut response, latency);
        }
        response
    }

    /// Run the handler, turning panics and returned errors into
    /// [`DispatchError`]s.
    fn invoke(
        &self,
        handler: &dyn Handler,
        req: &HandlerRequest<'_>,
    ) -> Result<crate::server::HandlerOutput, DispatchError> {
        debug!(
            request_id = %req.request_id,
            handler_name = %req.handler_name,
            params = req.params.len(),
            "Request dispatched to handler"
        );
        match catch_unwind(AssertUnwindSafe(|| handler.handle(req))) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => {
                let err = DispatchError::from(err);
                debug!(
                    request_id = %req.request_id,
                    handler_name = %req.handler_name,
                    status = err.status(),
                    "Handler returned an error"
                );
                Err(err)
            }
            Err(panic) => {
                let panic_message = panic_message(panic.as_ref());
                error!(
                    request_id = %req.request_id,
                    handler_name = %req.handler_name,
                    panic_message = %panic_message,
                    "Handler panicked"
                );
                Err(DispatchError::Unclassified(anyhow::anyhow!(
                    "handler '{}' panicked: {panic_message}",
                    req.handler_name
                )))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
