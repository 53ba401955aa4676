use std::time::Duration;

use tracing::{info, warn};

use super::Middleware;
use crate::dispatcher::HandlerRequest;
use crate::server::WireResponse;

/// Logs handler start and completion with latency.
///
/// Responses slower than `slow_threshold` are logged at `warn`.
#[derive(Debug, Clone, Copy)]
pub struct TracingMiddleware {
    slow_threshold: Duration,
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        TracingMiddleware {
            slow_threshold: Duration::from_millis(500),
        }
    }
}

impl TracingMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }
}

impl Middleware for TracingMiddleware {
    fn before(&self, req: &HandlerRequest<'_>) -> Option<WireResponse> {
        info!(
            request_id = %req.request_id,
            service = %req.service,
            verb = %req.verb,
            handler_name = %req.handler_name,
            principal = req.principal.map(|p| p.id.as_str()).unwrap_or("<anonymous>"),
            "Handler start"
        );
        None
    }

    fn after(&self, req: &HandlerRequest<'_>, res: &mut WireResponse, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        if latency > self.slow_threshold {
            warn!(
                request_id = %req.request_id,
                handler_name = %req.handler_name,
                status = res.status,
                latency_ms,
                "Slow handler"
            );
        } else {
            info!(
                request_id = %req.request_id,
                handler_name = %req.handler_name,
                status = res.status,
                latency_ms,
                "Handler complete"
            );
        }
    }
}
