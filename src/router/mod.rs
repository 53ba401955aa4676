//! # Router Module
//!
//! Matches an incoming request to exactly one route of the service registry.
//!
//! ## Overview
//!
//! Lookup is two-stage:
//!
//! 1. **Service**: exact match on the service name. A miss is
//!    `ServiceNotFoundError` (404).
//! 2. **Verb**: exact match on the HTTP verb among the service's routes. A
//!    miss is `MethodNotAllowedError` (405), reported with the verbs the
//!    service does declare.
//!
//! How a physical URL maps to a service name is decided before the router is
//! called; the router only ever sees the name.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use http::Method;
//! use brrtdispatch::router::Router;
//! use brrtdispatch::spec::{resolve, RouteDeclaration, ServiceDeclaration};
//!
//! let registry = resolve(&[ServiceDeclaration::new("users").route(RouteDeclaration::get("list_users"))])?;
//! let router = Router::new(Arc::new(registry));
//!
//! let matched = router.route("users", &Method::GET).unwrap();
//! assert_eq!(matched.handler_name(), "list_users");
//! assert_eq!(router.route("users", &Method::DELETE).unwrap_err().status(), 405);
//! # Ok::<(), brrtdispatch::error::MetadataError>(())
//! ```

mod core;

pub use self::core::{RouteMatch, Router};
