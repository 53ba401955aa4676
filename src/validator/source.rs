use serde_json::{Map, Value};

/// Where the raw parameters of a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Query-string map (typically GET).
    Query,
    /// Form-encoded body.
    Form,
    /// Parsed JSON document.
    Json,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Query => write!(f, "query"),
            SourceKind::Form => write!(f, "form"),
            SourceKind::Json => write!(f, "json"),
        }
    }
}

/// Raw, unvalidated parameter source of one request.
///
/// Query and form values are kept as JSON strings; a key given more than once
/// (or with a `[]` suffix) becomes an array of strings. A JSON body that is an
/// object exposes its top-level keys as parameters.
#[derive(Debug, Clone)]
pub struct RawParams {
    kind: SourceKind,
    values: Map<String, Value>,
    /// JSON body that is not an object (array, scalar); never addressable by name.
    other_body: Option<Value>,
}

impl RawParams {
    /// An empty query source.
    #[must_use]
    pub fn empty() -> Self {
        RawParams {
            kind: SourceKind::Query,
            values: Map::new(),
            other_body: None,
        }
    }

    pub fn query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::from_pairs(SourceKind::Query, pairs)
    }

    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::from_pairs(SourceKind::Form, pairs)
    }

    /// Parse a raw `a=1&b=two%20words` query string.
    #[must_use]
    pub fn from_query_string(qs: &str) -> Self {
        let qs = qs.strip_prefix('?').unwrap_or(qs);
        let pairs = qs.split('&').filter(|p| !p.is_empty()).map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        });
        Self::from_pairs(SourceKind::Query, pairs)
    }

    /// A parsed JSON document.
    #[must_use]
    pub fn json(body: Value) -> Self {
        match body {
            Value::Object(values) => RawParams {
                kind: SourceKind::Json,
                values,
                other_body: None,
            },
            other => RawParams {
                kind: SourceKind::Json,
                values: Map::new(),
                other_body: Some(other),
            },
        }
    }

    fn from_pairs<I, K, V>(kind: SourceKind, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut values = Map::new();
        for (k, v) in pairs {
            let raw_key = k.as_ref();
            let (key, forced_list) = match raw_key.strip_suffix("[]") {
                Some(stripped) => (stripped, true),
                None => (raw_key, false),
            };
            let value = Value::String(v.into());
            match values.get_mut(key) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None if forced_list => {
                    values.insert(key.to_string(), Value::Array(vec![value]));
                }
                None => {
                    values.insert(key.to_string(), value);
                }
            }
        }
        RawParams {
            kind,
            values,
            other_body: None,
        }
    }

    /// Add or replace a raw value.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Raw value for `name`; a missing key and a JSON `null` are both absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// The JSON body as an object, if this source is one.
    #[must_use]
    pub fn body_object(&self) -> Option<&Map<String, Value>> {
        match self.kind {
            SourceKind::Json if self.other_body.is_none() => Some(&self.values),
            _ => None,
        }
    }

    /// The JSON body when it is not an object.
    #[must_use]
    pub fn non_object_body(&self) -> Option<&Value> {
        self.other_body.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.other_body.is_none()
    }
}

impl Default for RawParams {
    fn default() -> Self {
        Self::empty()
    }
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|c| c.into_owned())
        .unwrap_or(spaced)
}
