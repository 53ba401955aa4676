//! Tests for the request dispatcher
//!
//! # Test Coverage
//!
//! Drives the full pipeline (lookup, validation, authorization, invocation,
//! translation) against the `services.yaml` fixture:
//! - 404 / 405 lookup failures and the `allow` header
//! - aggregated 400 validation responses and defaults
//! - handler-raised statuses, unclassified failures and panics
//! - auto and manual response shaping
//! - request id propagation
//! - sharing one dispatcher across threads

mod common;

use brrtdispatch::dispatcher::{Dispatcher, RequestContext, REQUEST_ID_HEADER};
use brrtdispatch::ids::RequestId;
use brrtdispatch::server::GENERIC_ERROR_MESSAGE;
use brrtdispatch::{HttpException, Principal, WireResponse};
use common::fixtures::services_registry;
use common::logs::CapturedLogs;
use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;

fn dispatcher() -> Dispatcher {
    let mut d = Dispatcher::new(services_registry());
    d.register_handler("list_users", |req| {
        Ok(json!({
            "name": req.get_str("name"),
            "age": req.get_i64("age"),
        })
        .into())
    });
    d.register_handler("create_user", |req| {
        let tags = req.params.get_array("tags").map_or(0, <[Value]>::len);
        Ok(json!({ "email": req.get_str("email"), "tags": tags }).into())
    });
    d.register_handler("get_item", |req| {
        Ok(json!({ "id": req.get_i64("id"), "sort": req.get_str("sort") }).into())
    });
    d.register_handler("put_item", |_req| {
        Ok(WireResponse::text(202, "accepted").with_header("etag", "v1").into())
    });
    d.register_handler("delete_item", |_req| Ok(json!({ "deleted": true }).into()));
    d.register_handler("render_report", |_req| Ok("line one\nline two".into()));
    d
}

fn errors_of(res: &WireResponse) -> Vec<Value> {
    res.body_json()
        .and_then(|b| b["errors"].as_array().cloned())
        .unwrap_or_default()
}

#[test]
fn test_users_age_out_of_range_is_400() {
    let res = dispatcher().dispatch(RequestContext::get("users", "name=Ann&age=200"));
    assert_eq!(res.status, 400);
    assert_eq!(res.content_type, "application/json");
    let body = res.body_json().unwrap();
    assert_eq!(body["type"], "ValidationError");
    let errors = errors_of(&res);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["parameter"], "age");
    assert_eq!(errors[0]["kind"], "OutOfRangeError");
}

#[test]
fn test_users_age_defaults_to_18() {
    let res = dispatcher().dispatch(RequestContext::get("users", "name=%20Ann%20"));
    assert_eq!(res.status, 200);
    assert_eq!(res.body_json().unwrap(), json!({ "name": "Ann", "age": 18 }));
}

#[test]
fn test_all_failures_reported_together() {
    let res = dispatcher().dispatch(RequestContext::get("users", "age=old"));
    assert_eq!(res.status, 400);
    let errors = errors_of(&res);
    let kinds: Vec<(&str, &str)> = errors
        .iter()
        .map(|e| (e["parameter"].as_str().unwrap(), e["kind"].as_str().unwrap()))
        .collect();
    assert_eq!(
        kinds,
        vec![("name", "MissingParameterError"), ("age", "InvalidTypeError")]
    );
}

#[test]
fn test_item_id_round_trip() {
    let d = dispatcher();

    let ok = d.dispatch(RequestContext::get("items", "id=5"));
    assert_eq!(ok.body_json().unwrap(), json!({ "id": 5, "sort": "asc" }));

    let low = d.dispatch(RequestContext::get("items", "id=0"));
    assert_eq!(low.status, 400);
    let errors = errors_of(&low);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["parameter"], "id");
    assert_eq!(errors[0]["kind"], "OutOfRangeError");

    let defaulted = d.dispatch(RequestContext::get("items", ""));
    assert_eq!(defaulted.body_json().unwrap()["id"], 10);

    let bad_sort = d.dispatch(RequestContext::get("items", "sort=up"));
    assert_eq!(errors_of(&bad_sort)[0]["kind"], "InvalidValueError");
}

#[test]
fn test_unknown_service_is_404() {
    let res = dispatcher().dispatch(RequestContext::get("orders", ""));
    assert_eq!(res.status, 404);
    assert_eq!(res.body_json().unwrap()["type"], "ServiceNotFoundError");
}

#[test]
fn test_undeclared_verb_is_405_with_allow() {
    let ctx = RequestContext::new(Method::PATCH, "users", Default::default());
    let res = dispatcher().dispatch(ctx);
    assert_eq!(res.status, 405);
    assert_eq!(res.header("allow"), Some("GET, POST"));
    assert_eq!(res.body_json().unwrap()["type"], "MethodNotAllowedError");
}

#[test]
fn test_json_body_post_with_principal() {
    let ctx = RequestContext::from_http(
        "POST",
        "users",
        "",
        Some("application/json; charset=utf-8"),
        br#"{"email":"Ann@Example.COM","tags":["a","b"]}"#,
    )
    .unwrap()
    .with_principal(Principal::new("u1"));

    let res = dispatcher().dispatch(ctx);
    assert_eq!(res.status, 201);
    assert_eq!(
        res.body_json().unwrap(),
        json!({ "email": "ann@example.com", "tags": 2 })
    );
}

#[test]
fn test_malformed_json_body_is_rejected_before_dispatch() {
    let err = RequestContext::from_http("POST", "users", "", Some("application/json"), b"{")
        .unwrap_err();
    assert_eq!(err.status(), 400);
}

#[test]
fn test_handler_http_exception_passes_through() {
    let mut d = dispatcher();
    d.register_handler("get_item", |req| {
        Err(HttpException::not_found(format!("item {} not found", req.get_i64("id").unwrap_or(0))).into())
    });
    let res = d.dispatch(RequestContext::get("items", "id=7"));
    assert_eq!(res.status, 404);
    assert_eq!(
        res.body_json().unwrap(),
        json!({ "type": "NotFoundError", "message": "item 7 not found" })
    );
}

#[test]
fn test_unclassified_error_is_generic_500_and_logged() {
    let logs = CapturedLogs::start();
    let mut d = dispatcher();
    d.register_handler("get_item", |_req| {
        Err(anyhow::anyhow!("database password rejected").into())
    });
    let res = d.dispatch(RequestContext::get("items", ""));
    assert_eq!(res.status, 500);
    let body = res.body_json().unwrap();
    assert_eq!(body["type"], "UnclassifiedHandlerError");
    assert_eq!(body["message"], GENERIC_ERROR_MESSAGE);
    assert!(!res.body_str().unwrap().contains("password"));
    assert!(logs.contents().contains("database password rejected"));
}

#[test]
fn test_panicking_handler_is_500() {
    let logs = CapturedLogs::start();
    let mut d = dispatcher();
    d.register_handler("get_item", |_req| panic!("handler exploded"));
    let res = d.dispatch(RequestContext::get("items", ""));
    assert_eq!(res.status, 500);
    assert_eq!(res.body_json().unwrap()["message"], GENERIC_ERROR_MESSAGE);
    assert!(logs.contents().contains("handler exploded"));

    // The dispatcher keeps serving after a panic.
    d.register_handler("get_item", |_req| Ok(json!(1).into()));
    assert_eq!(d.dispatch(RequestContext::get("items", "")).status, 200);
}

#[test]
fn test_manual_route_passes_wire_response_through() {
    let res = dispatcher().dispatch(RequestContext::new(
        Method::PUT,
        "items",
        Default::default(),
    ));
    assert_eq!(res.status, 202);
    assert_eq!(res.body_str(), Some("accepted"));
    assert_eq!(res.header("etag"), Some("v1"));
}

#[test]
fn test_manual_route_without_wire_response_is_500() {
    let mut d = dispatcher();
    d.register_handler("put_item", |_req| Ok(json!({ "ok": true }).into()));
    let res = d.dispatch(RequestContext::new(Method::PUT, "items", Default::default()));
    assert_eq!(res.status, 500);
}

#[test]
fn test_auto_response_shapes() {
    let d = dispatcher();

    let deleted = d.dispatch(RequestContext::new(Method::DELETE, "items", Default::default()));
    assert_eq!(deleted.status, 204);
    assert!(deleted.body.is_empty());

    let report = d.dispatch(RequestContext::get("reports", ""));
    assert_eq!(report.status, 200);
    assert_eq!(report.content_type, "text/plain; charset=utf-8");
    assert_eq!(report.body_str(), Some("line one\nline two"));
}

#[test]
fn test_null_and_string_results_on_json_routes() {
    let mut d = dispatcher();
    d.register_handler("get_item", |_req| Ok(Value::Null.into()));
    let empty = d.dispatch(RequestContext::get("items", ""));
    assert_eq!(empty.status, 200);
    assert!(empty.body.is_empty());

    d.register_handler("get_item", |_req| Ok(json!("plain").into()));
    let text = d.dispatch(RequestContext::get("items", ""));
    assert_eq!(text.body_str(), Some("plain"));
    assert_eq!(text.content_type, "application/json");
}

#[test]
fn test_unregistered_handler_is_500() {
    let d = Dispatcher::new(services_registry());
    let missing = d.missing_handlers();
    assert!(missing.contains(&"get_item".to_string()));
    assert!(missing.contains(&"secure_status".to_string()));

    let res = d.dispatch(RequestContext::get("items", ""));
    assert_eq!(res.status, 500);
    assert_eq!(res.body_json().unwrap()["type"], "UnclassifiedHandlerError");
}

#[test]
fn test_every_response_carries_request_id() {
    let d = dispatcher();
    let ok = d.dispatch(RequestContext::get("items", ""));
    let id = ok.header(REQUEST_ID_HEADER).unwrap();
    assert!(id.parse::<RequestId>().is_ok());

    let not_found = d.dispatch(RequestContext::get("nope", ""));
    assert!(not_found.header(REQUEST_ID_HEADER).is_some());

    let fixed = RequestId::new();
    let echoed = d.dispatch(RequestContext::get("items", "").with_request_id(fixed));
    assert_eq!(echoed.header(REQUEST_ID_HEADER), Some(fixed.to_string().as_str()));
}

#[test]
fn test_dispatcher_is_shared_across_threads() {
    let d = Arc::new(dispatcher());
    std::thread::scope(|scope| {
        for n in 1..=8i64 {
            let d = Arc::clone(&d);
            scope.spawn(move || {
                for _ in 0..25 {
                    let res = d.dispatch(RequestContext::get("items", &format!("id={n}")));
                    assert_eq!(res.body_json().unwrap()["id"], n);
                }
            });
        }
    });
}
