//! # brrtdispatch
//!
//! **brrtdispatch** is a metadata-driven HTTP request dispatcher. Services are
//! declared once (in YAML, JSON or code); every request is then matched,
//! validated, authorized, handed to a named handler and translated into a
//! wire response from that table alone.
//!
//! ## Overview
//!
//! A request is addressed by a *service* name and an HTTP *verb*, never by a
//! URL path. Each (service, verb) pair binds a handler by name together with
//! the parameters it accepts, the security requirement guarding it and how
//! its result becomes a response. Handlers never see raw input: they receive
//! typed, validated parameters and an optional principal.
//!
//! ## Architecture
//!
//! - **[`spec`]** - service declarations and the [`spec::MetadataResolver`]
//!   that checks them and builds the route table
//! - **[`registry`]** - the immutable, shareable route table and its
//!   serializable snapshot
//! - **[`router`]** - two-stage lookup: service by name (404), then verb (405)
//! - **[`validator`]** - type coercion, bounds, enums and filters for every
//!   declared parameter, with failures aggregated into one 400
//! - **[`security`]** - principals, requirements and the
//!   `hasRole` / `hasAuthority` expression evaluator
//! - **[`dispatcher`]** - the per-request pipeline and handler registration
//! - **[`server`]** - HTTP edge helpers and the [`server::ResponseTranslator`]
//! - **[`middleware`]** - hooks around handler invocation
//! - **[`config`]**, **[`logging`]**, **[`ids`]**, **[`error`]** - ambient
//!   plumbing
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Dispatcher
//!     participant Router
//!     participant Validator
//!     participant Evaluator as AuthorizationEvaluator
//!     participant Handler
//!     participant Translator as ResponseTranslator
//!
//!     Caller->>Dispatcher: dispatch(RequestContext)
//!     Dispatcher->>Router: route(service, verb)
//!     alt Unknown service
//!         Router-->>Caller: 404 ServiceNotFoundError
//!     else Verb not declared
//!         Router-->>Caller: 405 MethodNotAllowedError + Allow
//!     end
//!     Dispatcher->>Validator: validate_params(route.parameters, raw)
//!     alt Any parameter invalid
//!         Validator-->>Caller: 400 ValidationError (all failures)
//!     end
//!     Dispatcher->>Evaluator: evaluate(route.security, principal)
//!     alt No principal
//!         Evaluator-->>Caller: 401 UnauthorizedError
//!     else Requirement not met
//!         Evaluator-->>Caller: 403 ForbiddenError
//!     end
//!     Dispatcher->>Handler: handle(HandlerRequest)
//!     Handler-->>Dispatcher: HandlerOutput / HandlerError / panic
//!     Dispatcher->>Translator: translate(result, route.response)
//!     Translator-->>Caller: WireResponse + x-request-id
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use brrtdispatch::{Dispatcher, Principal, RequestContext};
//! use brrtdispatch::spec::{parse_services_yaml, MetadataResolver};
//!
//! let declarations = parse_services_yaml(r#"
//! services:
//!   - name: reports
//!     security: "hasRole('analyst')"
//!     routes:
//!       - verb: GET
//!         handler: get_report
//!         parameters:
//!           - { name: id, type: int, required: true, min: 1 }
//! "#)?;
//! let registry = MetadataResolver::new().resolve(&declarations)?;
//!
//! let mut dispatcher = Dispatcher::new(Arc::new(registry));
//! dispatcher.register_handler("get_report", |req| {
//!     Ok(json!({ "report": req.get_i64("id") }).into())
//! });
//!
//! let anonymous = dispatcher.dispatch(RequestContext::get("reports", "id=3"));
//! assert_eq!(anonymous.status, 401);
//!
//! let analyst = Principal::new("ana").with_role("analyst");
//! let ok = dispatcher.dispatch(RequestContext::get("reports", "id=3").with_principal(analyst));
//! assert_eq!(ok.body_json(), Some(json!({ "report": 3 })));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Concurrency
//!
//! The registry and the dispatcher are immutable once built and are shared by
//! reference (or `Arc`) across threads. Per-request state lives in the
//! [`dispatcher::RequestContext`], which is consumed by the call that
//! dispatches it.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod security;
pub mod server;
pub mod spec;
pub mod validator;

pub use dispatcher::{Dispatcher, HandlerOutput, HandlerRequest, HandlerResult, RequestContext};
pub use error::{DispatchError, HandlerError, HttpException, MetadataError, ParamFailure};
pub use registry::ServiceRegistry;
pub use security::{Principal, SecurityRequirement};
pub use server::WireResponse;
pub use spec::{load_registry, resolve, MetadataResolver};
