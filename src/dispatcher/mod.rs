//! # Dispatcher Module
//!
//! Runs one request through the fixed pipeline and always produces exactly
//! one wire response.
//!
//! ## Request Flow
//!
//! 1. **Lookup** - the router matches (service, verb); 404 / 405 on a miss
//! 2. **Validation** - every declared parameter is validated; all failures are
//!    reported together as one 400
//! 3. **Authorization** - the route's requirement is evaluated against the
//!    principal; 401 without one, 403 when it falls short. A deferred principal
//!    resolver only runs here, so malformed requests never trigger it
//! 4. **Middleware `before`** - may answer early instead of the handler
//! 5. **Handler** - looked up by name; panics are caught
//! 6. **Translation** - the result or failure becomes status, content type
//!    and body
//! 7. **Middleware `after`** - observes the final response and latency
//!
//! Every response carries an `x-request-id` header.
//!
//! ## Handler Registration
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use brrtdispatch::dispatcher::{Dispatcher, RequestContext};
//! use brrtdispatch::spec::{resolve, ParameterDeclaration, RouteDeclaration, ServiceDeclaration};
//!
//! let registry = resolve(&[ServiceDeclaration::new("users").route(
//!     RouteDeclaration::get("get_user").param(ParameterDeclaration::new("id", "int").min(1.0)),
//! )])?;
//!
//! let mut dispatcher = Dispatcher::new(Arc::new(registry));
//! dispatcher.register_handler("get_user", |req| {
//!     Ok(json!({ "id": req.get_i64("id") }).into())
//! });
//!
//! let res = dispatcher.dispatch(RequestContext::get("users", "id=5"));
//! assert_eq!(res.status, 200);
//! assert_eq!(res.body_json(), Some(json!({ "id": 5 })));
//! # Ok::<(), brrtdispatch::error::MetadataError>(())
//! ```
//!
//! ## Error Handling
//!
//! - Handlers return [`crate::error::HttpException`] (via `HandlerError::Http`)
//!   to choose the status themselves
//! - Any other error, a panic, or a route whose handler was never registered
//!   becomes a 500 with a generic message; the detail is logged

mod core;
mod request;

pub use self::core::{Dispatcher, REQUEST_ID_HEADER};
pub use request::{Handler, HandlerRequest, HandlerResult, PrincipalSource, RequestContext};
pub use crate::server::HandlerOutput;
