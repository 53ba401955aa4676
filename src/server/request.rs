use http::Method;
use serde_json::Value;
use tracing::debug;

use crate::error::HttpException;
use crate::validator::RawParams;

/// Parse an HTTP method token. Unknown but well-formed tokens are kept as
/// extension methods so the router can answer 405 for them.
pub fn parse_method(method: &str) -> Result<Method, HttpException> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| HttpException::bad_request(format!("invalid HTTP method '{method}'")))
}

/// Build the raw parameter source of a request from its HTTP parts.
///
/// `GET` and `DELETE` requests, and any request without a body, read the
/// query string. Otherwise the body is parsed according to its content type:
/// JSON documents as JSON, `application/x-www-form-urlencoded` as a form map.
/// A body of any other type falls back to the query string.
///
/// # Errors
///
/// A malformed JSON body is a 400.
pub fn parse_params(
    method: &Method,
    query: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<RawParams, HttpException> {
    let reads_query = *method == Method::GET || *method == Method::DELETE || body.is_empty();
    if reads_query {
        let params = RawParams::from_query_string(query);
        debug!(param_count = params.len(), "Query params parsed");
        return Ok(params);
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") || mime.is_empty() {
        let parse_start = std::time::Instant::now();
        let json: Value = serde_json::from_slice(body).map_err(|e| {
            HttpException::bad_request(format!("request body is not valid JSON: {e}"))
        })?;
        debug!(
            parse_duration_us = parse_start.elapsed().as_micros(),
            body_fields = json.as_object().map(|o| o.len()),
            "JSON body parsed"
        );
        return Ok(RawParams::json(json));
    }

    if mime == "application/x-www-form-urlencoded" {
        let pairs = url::form_urlencoded::parse(body).into_owned();
        let params = RawParams::form(pairs);
        debug!(param_count = params.len(), "Form body parsed");
        return Ok(params);
    }

    debug!(content_type = %mime, "Unsupported body type, reading query string");
    Ok(RawParams::from_query_string(query))
}
