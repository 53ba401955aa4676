//! # Spec Module
//!
//! The route table: declarations as they are written, and the resolved model
//! the dispatcher serves from.
//!
//! ## Overview
//!
//! - [`ServiceDeclaration`] / [`RouteDeclaration`] / [`ParameterDeclaration`] -
//!   the declarative input, loaded from YAML/JSON or built in code
//! - [`MetadataResolver`] - checks declarations and builds the
//!   [`crate::registry::ServiceRegistry`]
//! - [`ParameterSpec`] / [`RouteSpec`] / [`ServiceDescriptor`] - the resolved,
//!   immutable model
//!
//! Everything that can be wrong with a declaration (unknown type, malformed
//! security expression, a verb declared twice, a default outside its bounds)
//! is reported here, once, before any request is served.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::spec::{resolve, ParameterDeclaration, RouteDeclaration, ServiceDeclaration};
//!
//! let users = ServiceDeclaration::new("users").route(
//!     RouteDeclaration::get("list_users")
//!         .param(ParameterDeclaration::new("name", "string").required())
//!         .param(ParameterDeclaration::new("age", "int").with_default(18).min(0.0).max(150.0)),
//! );
//! let registry = resolve(&[users])?;
//! assert!(registry.get("users").is_some());
//! # Ok::<(), brrtdispatch::error::MetadataError>(())
//! ```

mod build;
mod declare;
mod load;
mod types;

pub use build::{resolve, MetadataResolver};
pub use declare::{
    AutoResponseDeclaration, ParameterDeclaration, ResponseDeclaration, RouteDeclaration,
    SecurityDeclaration, ServiceDeclaration, ServicesDocument,
};
pub use load::{load_registry, load_services, parse_services_json, parse_services_yaml};
pub use types::{
    AutoResponse, BodyKind, ParamType, ParameterSpec, ResponseMode, RouteSpec, ServiceDescriptor,
    DEFAULT_CONTENT_TYPE, SUPPORTED_VERBS,
};
