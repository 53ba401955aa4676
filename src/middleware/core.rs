use std::time::Duration;

use crate::dispatcher::HandlerRequest;
use crate::server::WireResponse;

/// Hooks around handler invocation.
///
/// Middleware only runs for requests that were matched, validated and
/// authorized; lookup, validation and authorization failures never reach it.
pub trait Middleware: Send + Sync {
    /// Called before the handler. Returning a response skips the handler and
    /// the remaining `before` hooks.
    fn before(&self, _req: &HandlerRequest<'_>) -> Option<WireResponse> {
        None
    }

    /// Called with the final response, whether it came from the handler or
    /// from an early `before`.
    fn after(&self, _req: &HandlerRequest<'_>, _res: &mut WireResponse, _latency: Duration) {}
}
