//! # Validator Module
//!
//! Turns the raw parameters of a request into typed, validated values using the
//! route's [`ParameterSpec`] list.
//!
//! ## Algorithm
//!
//! For every declared parameter, in declaration order:
//!
//! 1. **Presence** - absent and required fails with `MissingParameterError`;
//!    absent and optional yields the declared default (no further checks).
//! 2. **Coercion** - the raw value is converted to the declared type
//!    (`InvalidTypeError` when it cannot be).
//! 3. **Bounds** - `min`/`max` for numbers, `min_length`/`max_length` for
//!    strings (characters) and arrays (elements), all inclusive (`OutOfRangeError`).
//! 4. **Enum** - the value must be one of the allowed values (`InvalidValueError`).
//! 5. **Filter** - a custom filter may normalise or reject the value
//!    (`FilterRejectedError`).
//!
//! Failures are collected across all parameters rather than stopping at the
//! first one, so a single 400 response can list every offending parameter.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::spec::{ParamType, ParameterSpec};
//! use brrtdispatch::validator::{validate_params, RawParams};
//!
//! let specs = vec![ParameterSpec::new("id", ParamType::Int).min(1.0)];
//! let ok = validate_params(&specs, &RawParams::query([("id", "5")])).unwrap();
//! assert_eq!(ok.get_i64("id"), Some(5));
//!
//! let failures = validate_params(&specs, &RawParams::query([("id", "0")])).unwrap_err();
//! assert_eq!(failures[0].parameter, "id");
//! ```

mod coerce;
mod filters;
mod source;
mod value;

pub use coerce::coerce;
pub use filters::{FilterRegistry, NamedFilter, ParamFilter};
pub use source::{RawParams, SourceKind};
pub use value::{ParamValue, ValidatedParams};

use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{ParamFailure, ParamFailureKind};
use crate::spec::{ParamType, ParameterSpec};
use coerce::measure_length;

/// Validate one parameter against its raw value (`None` when absent).
///
/// Returns `Ok(None)` for an absent optional parameter without a default.
pub fn validate_param(
    spec: &ParameterSpec,
    raw: Option<&Value>,
) -> Result<Option<ParamValue>, ParamFailure> {
    let Some(raw) = raw else {
        if spec.required {
            return Err(ParamFailure::new(
                &spec.name,
                ParamFailureKind::MissingParameter,
                format!("required parameter '{}' is missing", spec.name),
            ));
        }
        return Ok(spec.default.clone());
    };

    let value = coerce(spec.param_type, raw)
        .map_err(|msg| ParamFailure::new(&spec.name, ParamFailureKind::InvalidType, msg))?;

    check_constraints(spec, &value)?;

    match &spec.filter {
        Some(filter) => filter.apply(raw, value).map(Some).map_err(|reason| {
            ParamFailure::new(
                &spec.name,
                ParamFailureKind::FilterRejected,
                format!("rejected by filter '{}': {reason}", filter.name),
            )
        }),
        None => Ok(Some(value)),
    }
}

/// Validate every declared parameter, collecting all failures.
pub fn validate_params(
    specs: &[ParameterSpec],
    raw: &RawParams,
) -> Result<ValidatedParams, Vec<ParamFailure>> {
    let body_target = whole_body_target(specs, raw);
    let bound_body = body_target
        .and(raw.body_object())
        .map(|obj| Value::Object(obj.clone()));

    let mut params = ValidatedParams::new();
    let mut failures = Vec::new();

    for spec in specs {
        let raw_value = match raw.get(&spec.name) {
            Some(v) => Some(v),
            None if body_target == Some(spec.name.as_str()) => bound_body.as_ref(),
            None => None,
        };
        match validate_param(spec, raw_value) {
            Ok(Some(value)) => params.insert(&spec.name, value),
            Ok(None) => {}
            Err(failure) => failures.push(failure),
        }
    }

    if failures.is_empty() {
        Ok(params)
    } else {
        Err(failures)
    }
}

/// Bounds and enum membership of an already coerced value.
pub(crate) fn check_constraints(spec: &ParameterSpec, value: &ParamValue) -> Result<(), ParamFailure> {
    if let Some(min) = spec.min_value {
        if compare_to_bound(value, min) == Some(Ordering::Less) {
            return Err(out_of_range(spec, format!("must be >= {min}, got {value}")));
        }
    }
    if let Some(max) = spec.max_value {
        if compare_to_bound(value, max) == Some(Ordering::Greater) {
            return Err(out_of_range(spec, format!("must be <= {max}, got {value}")));
        }
    }

    if let Some(len) = measure_length(value) {
        if let Some(min) = spec.min_length {
            if len < min {
                return Err(out_of_range(
                    spec,
                    format!("length must be >= {min}, got {len}"),
                ));
            }
        }
        if let Some(max) = spec.max_length {
            if len > max {
                return Err(out_of_range(
                    spec,
                    format!("length must be <= {max}, got {len}"),
                ));
            }
        }
    }

    if let Some(allowed) = &spec.allowed_values {
        let member = match (spec.param_type, value) {
            (ParamType::Array, ParamValue::Array(items)) => items
                .iter()
                .all(|item| allowed.iter().any(|a| element_matches(a, item))),
            _ => allowed.contains(value),
        };
        if !member {
            let choices: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            return Err(ParamFailure::new(
                &spec.name,
                ParamFailureKind::InvalidValue,
                format!("'{value}' is not one of [{}]", choices.join(", ")),
            ));
        }
    }

    Ok(())
}

fn out_of_range(spec: &ParameterSpec, message: String) -> ParamFailure {
    ParamFailure::new(&spec.name, ParamFailureKind::OutOfRange, message)
}

/// Order a numeric value against an `f64` bound without widening integers,
/// so `i64` values beyond 2^53 are compared exactly.
fn compare_to_bound(value: &ParamValue, bound: f64) -> Option<Ordering> {
    match value {
        ParamValue::Int(i) => compare_int(*i, bound),
        ParamValue::Double(d) => d.partial_cmp(&bound),
        _ => None,
    }
}

fn compare_int(i: i64, bound: f64) -> Option<Ordering> {
    // 2^63 is exactly representable; every finite bound below it floors into i64.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if bound.is_nan() {
        return None;
    }
    if bound >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    if bound < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    let floor = bound.floor();
    let whole = floor as i64;
    match i.cmp(&whole) {
        Ordering::Equal if bound > floor => Some(Ordering::Less),
        ord => Some(ord),
    }
}

fn element_matches(allowed: &ParamValue, item: &Value) -> bool {
    match (allowed, item) {
        (ParamValue::Int(a), Value::Number(n)) => match n.as_i64() {
            Some(i) => i == *a,
            None => n
                .as_f64()
                .is_some_and(|f| compare_int(*a, f) == Some(Ordering::Equal)),
        },
        (ParamValue::Double(a), Value::Number(n)) => match n.as_i64() {
            Some(i) => compare_int(i, *a) == Some(Ordering::Equal),
            None => n.as_f64() == Some(*a),
        },
        (_, Value::String(s)) => allowed.to_string() == *s,
        (_, other) => allowed.to_string() == other.to_string(),
    }
}

/// The single `json-object` parameter that receives the whole JSON body when
/// the body has no key of that name.
fn whole_body_target<'a>(specs: &'a [ParameterSpec], raw: &RawParams) -> Option<&'a str> {
    let body = raw.body_object()?;
    if body.is_empty() {
        return None;
    }
    let mut objects = specs
        .iter()
        .filter(|s| s.param_type == ParamType::JsonObject);
    let target = objects.next()?;
    if objects.next().is_some() || body.contains_key(&target.name) {
        return None;
    }
    Some(target.name.as_str())
}
