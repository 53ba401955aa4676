//! # Middleware Module
//!
//! [`Middleware`] hooks run around handler invocation: `before` may answer
//! in place of the handler, `after` sees the final response and latency.
//! [`TracingMiddleware`] is the stock implementation that logs both ends.

mod core;
mod tracing;

pub use self::core::Middleware;
pub use self::tracing::TracingMiddleware;
