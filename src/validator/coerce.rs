//! Coercion of raw request values into declared parameter types.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::ParamValue;
use crate::spec::ParamType;

/// Syntactically valid e-mail address: local part, `@`, dotted host name.
static EMAIL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .ok()
});

/// Coerce `raw` into `param_type`. The error string becomes the message of an
/// `InvalidTypeError`.
pub fn coerce(param_type: ParamType, raw: &Value) -> Result<ParamValue, String> {
    match param_type {
        ParamType::String => coerce_string(raw),
        ParamType::Int => coerce_int(raw),
        ParamType::Double => coerce_double(raw),
        ParamType::Bool => coerce_bool(raw),
        ParamType::Array => coerce_array(raw),
        ParamType::Email => coerce_email(raw),
        ParamType::Url => coerce_url(raw),
        ParamType::JsonObject => match raw {
            Value::Object(map) => Ok(ParamValue::Object(map.clone())),
            other => Err(format!(
                "expected a JSON object, got {}",
                describe(other)
            )),
        },
    }
}

fn coerce_string(raw: &Value) -> Result<ParamValue, String> {
    match raw {
        Value::String(s) => Ok(ParamValue::String(s.clone())),
        Value::Number(n) => Ok(ParamValue::String(n.to_string())),
        Value::Bool(b) => Ok(ParamValue::String(b.to_string())),
        other => Err(format!("expected a string, got {}", describe(other))),
    }
}

fn coerce_int(raw: &Value) -> Result<ParamValue, String> {
    let fail = || format!("expected an integer, got {}", describe(raw));
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(ParamValue::Int(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Ok(ParamValue::Int(f as i64))
                }
                _ => Err(fail()),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map(ParamValue::Int).map_err(|_| fail()),
        _ => Err(fail()),
    }
}

fn coerce_double(raw: &Value) -> Result<ParamValue, String> {
    let fail = || format!("expected a number, got {}", describe(raw));
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(d) if d.is_finite() => Ok(ParamValue::Double(d)),
        _ => Err(fail()),
    }
}

fn coerce_bool(raw: &Value) -> Result<ParamValue, String> {
    let fail = || format!("expected a boolean, got {}", describe(raw));
    match raw {
        Value::Bool(b) => Ok(ParamValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(ParamValue::Bool(false)),
            Some(1) => Ok(ParamValue::Bool(true)),
            _ => Err(fail()),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(ParamValue::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(ParamValue::Bool(false)),
            _ => Err(fail()),
        },
        _ => Err(fail()),
    }
}

fn coerce_array(raw: &Value) -> Result<ParamValue, String> {
    match raw {
        Value::Array(items) => Ok(ParamValue::Array(items.clone())),
        Value::String(s) if s.is_empty() => Ok(ParamValue::Array(Vec::new())),
        Value::String(s) => Ok(ParamValue::Array(
            s.split(',')
                .map(|item| Value::String(item.trim().to_string()))
                .collect(),
        )),
        Value::Number(_) | Value::Bool(_) => Ok(ParamValue::Array(vec![raw.clone()])),
        other => Err(format!("expected an array, got {}", describe(other))),
    }
}

fn coerce_email(raw: &Value) -> Result<ParamValue, String> {
    let Value::String(s) = raw else {
        return Err(format!("expected an e-mail address, got {}", describe(raw)));
    };
    let candidate = s.trim();
    let valid = EMAIL_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(candidate));
    if valid {
        Ok(ParamValue::String(candidate.to_string()))
    } else {
        Err(format!("'{s}' is not a valid e-mail address"))
    }
}

fn coerce_url(raw: &Value) -> Result<ParamValue, String> {
    let Value::String(s) = raw else {
        return Err(format!("expected a URL, got {}", describe(raw)));
    };
    let candidate = s.trim();
    match url::Url::parse(candidate) {
        Ok(parsed) if parsed.has_host() && !candidate.contains(char::is_whitespace) => {
            Ok(ParamValue::String(candidate.to_string()))
        }
        _ => Err(format!("'{s}' is not a valid URL")),
    }
}

/// Number of characters (strings) or elements (arrays); `None` for other types.
pub(crate) fn measure_length(value: &ParamValue) -> Option<usize> {
    match value {
        ParamValue::String(s) => Some(s.chars().count()),
        ParamValue::Array(a) => Some(a.len()),
        _ => None,
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("\"{s}\""),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_from_string_and_number() {
        assert_eq!(coerce(ParamType::Int, &json!("42")), Ok(ParamValue::Int(42)));
        assert_eq!(coerce(ParamType::Int, &json!(" 7 ")), Ok(ParamValue::Int(7)));
        assert_eq!(coerce(ParamType::Int, &json!(3.0)), Ok(ParamValue::Int(3)));
        assert!(coerce(ParamType::Int, &json!("abc")).is_err());
        assert!(coerce(ParamType::Int, &json!(3.5)).is_err());
        assert!(coerce(ParamType::Int, &json!(true)).is_err());
    }

    #[test]
    fn double_rejects_non_finite() {
        assert_eq!(
            coerce(ParamType::Double, &json!("2.5")),
            Ok(ParamValue::Double(2.5))
        );
        assert!(coerce(ParamType::Double, &json!("NaN")).is_err());
        assert!(coerce(ParamType::Double, &json!("inf")).is_err());
    }

    #[test]
    fn bool_spellings() {
        for t in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(coerce(ParamType::Bool, &json!(t)), Ok(ParamValue::Bool(true)));
        }
        for f in ["false", "0", "no", "Off"] {
            assert_eq!(coerce(ParamType::Bool, &json!(f)), Ok(ParamValue::Bool(false)));
        }
        assert!(coerce(ParamType::Bool, &json!("maybe")).is_err());
        assert!(coerce(ParamType::Bool, &json!(2)).is_err());
    }

    #[test]
    fn array_from_csv_and_list() {
        assert_eq!(
            coerce(ParamType::Array, &json!("a, b,c")),
            Ok(ParamValue::Array(vec![json!("a"), json!("b"), json!("c")]))
        );
        assert_eq!(
            coerce(ParamType::Array, &json!("")),
            Ok(ParamValue::Array(vec![]))
        );
        assert_eq!(
            coerce(ParamType::Array, &json!([1, 2])),
            Ok(ParamValue::Array(vec![json!(1), json!(2)]))
        );
        assert!(coerce(ParamType::Array, &json!({"a": 1})).is_err());
    }

    #[test]
    fn email_pattern() {
        assert!(coerce(ParamType::Email, &json!("ann@example.com")).is_ok());
        assert!(coerce(ParamType::Email, &json!("first.last+tag@mail.example.org")).is_ok());
        assert!(coerce(ParamType::Email, &json!("ann@localhost")).is_err());
        assert!(coerce(ParamType::Email, &json!("not-an-email")).is_err());
        assert!(coerce(ParamType::Email, &json!("a b@example.com")).is_err());
        assert!(coerce(ParamType::Email, &json!(12)).is_err());
    }

    #[test]
    fn url_requires_scheme_and_host() {
        assert!(coerce(ParamType::Url, &json!("https://example.com/path?q=1")).is_ok());
        assert!(coerce(ParamType::Url, &json!("example.com")).is_err());
        assert!(coerce(ParamType::Url, &json!("mailto:ann@example.com")).is_err());
        assert!(coerce(ParamType::Url, &json!("http://exa mple.com")).is_err());
    }

    #[test]
    fn json_object_requires_structured_value() {
        assert!(coerce(ParamType::JsonObject, &json!({"a": 1})).is_ok());
        assert!(coerce(ParamType::JsonObject, &json!("{\"a\": 1}")).is_err());
        assert!(coerce(ParamType::JsonObject, &json!([1])).is_err());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert_eq!(measure_length(&ParamValue::from("héllo")), Some(5));
        assert_eq!(measure_length(&ParamValue::Int(5)), None);
    }
}
