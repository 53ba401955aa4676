//! Middleware hooks around handler invocation.

mod common;

use brrtdispatch::dispatcher::{Dispatcher, HandlerRequest, RequestContext};
use brrtdispatch::middleware::{Middleware, TracingMiddleware};
use brrtdispatch::WireResponse;
use common::fixtures::services_registry;
use common::logs::CapturedLogs;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records the order hooks run in.
struct Recorder {
    label: &'static str,
    events: Arc<Mutex<Vec<String>>>,
}

impl Middleware for Recorder {
    fn before(&self, req: &HandlerRequest<'_>) -> Option<WireResponse> {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}:before:{}", self.label, req.handler_name));
        None
    }

    fn after(&self, _req: &HandlerRequest<'_>, res: &mut WireResponse, _latency: Duration) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}:after:{}", self.label, res.status));
        res.set_header(&format!("x-seen-by-{}", self.label), "1");
    }
}

fn dispatcher(calls: Arc<AtomicUsize>) -> Dispatcher {
    let mut d = Dispatcher::new(services_registry());
    d.register_handler("get_item", move |req| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "id": req.get_i64("id") }).into())
    });
    d
}

#[test]
fn test_hooks_run_in_order_around_handler() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let mut d = dispatcher(Arc::clone(&calls));
    for label in ["a", "b"] {
        d.add_middleware(Arc::new(Recorder {
            label,
            events: Arc::clone(&events),
        }));
    }

    let res = d.dispatch(RequestContext::get("items", "id=2"));
    assert_eq!(res.status, 200);
    assert_eq!(res.header("x-seen-by-a"), Some("1"));
    assert_eq!(res.header("x-seen-by-b"), Some("1"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *events.lock().unwrap(),
        vec!["a:before:get_item", "b:before:get_item", "a:after:200", "b:after:200"]
    );
}

#[test]
fn test_before_hook_short_circuits_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut d = Dispatcher::new(services_registry());
    let counter = Arc::clone(&calls);
    d.register_handler("list_users", move |_req| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(().into())
    });
    d.add_middleware(Arc::new(Maintenance));
    d.add_middleware(Arc::new(Recorder {
        label: "late",
        events: Arc::clone(&events),
    }));

    let res = d.dispatch(RequestContext::get("users", "name=Ann"));
    assert_eq!(res.status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    events.lock().unwrap().clear();
    let res = d.dispatch(RequestContext::get("users", "name=Ann&maintenance=on"));
    assert_eq!(res.status, 503);
    assert_eq!(res.body_str(), Some("back soon"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // Later `before` hooks are skipped, every `after` hook still runs.
    assert_eq!(*events.lock().unwrap(), vec!["late:after:503"]);
}

/// Answers every request itself while a `maintenance` flag is present. The
/// flag is not a declared parameter, so it is read from the raw source.
struct Maintenance;

impl Middleware for Maintenance {
    fn before(&self, req: &HandlerRequest<'_>) -> Option<WireResponse> {
        req.raw
            .get("maintenance")
            .is_some()
            .then(|| WireResponse::text(503, "back soon"))
    }
}

#[test]
fn test_middleware_skipped_for_rejected_requests() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut d = dispatcher(Arc::new(AtomicUsize::new(0)));
    d.add_middleware(Arc::new(Recorder {
        label: "mw",
        events: Arc::clone(&events),
    }));
    assert_eq!(d.dispatch(RequestContext::get("items", "id=0")).status, 400);
    assert_eq!(d.dispatch(RequestContext::get("missing", "")).status, 404);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_tracing_middleware_logs_handler_lifecycle() {
    let logs = CapturedLogs::start();
    let mut d = dispatcher(Arc::new(AtomicUsize::new(0)));
    d.add_middleware(Arc::new(TracingMiddleware::new().with_slow_threshold(Duration::from_secs(60))));
    let res = d.dispatch(RequestContext::get("items", "id=4"));
    assert_eq!(res.status, 200);
    let output = logs.contents();
    assert!(output.contains("Handler start"), "{output}");
    assert!(output.contains("Handler complete"), "{output}");
    assert!(output.contains("handler_name=get_item"), "{output}");
}

#[test]
fn test_tracing_middleware_flags_slow_handlers() {
    let logs = CapturedLogs::start();
    let mut d = Dispatcher::new(services_registry());
    d.register_handler("get_item", |_req| {
        std::thread::sleep(Duration::from_millis(5));
        Ok(json!(null).into())
    });
    d.add_middleware(Arc::new(TracingMiddleware::new().with_slow_threshold(Duration::ZERO)));
    d.dispatch(RequestContext::get("items", ""));
    assert!(logs.contents().contains("Slow handler"));
}
