use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ParamValue;

/// Custom parameter filter: `(raw, coerced) -> coerced'`, or `Err(reason)` to reject.
///
/// Filters must be pure. They run after type, bounds and enum checks, and the
/// value they return replaces the coerced one (normalisation).
pub type ParamFilter = Arc<dyn Fn(&Value, ParamValue) -> Result<ParamValue, String> + Send + Sync>;

/// A filter bound to a parameter, keeping the name it was declared with.
#[derive(Clone)]
pub struct NamedFilter {
    pub name: String,
    func: ParamFilter,
}

impl NamedFilter {
    pub fn new(name: impl Into<String>, func: ParamFilter) -> Self {
        NamedFilter {
            name: name.into(),
            func,
        }
    }

    /// Run the filter.
    pub fn apply(&self, raw: &Value, value: ParamValue) -> Result<ParamValue, String> {
        (self.func)(raw, value)
    }
}

impl fmt::Debug for NamedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedFilter").field("name", &self.name).finish()
    }
}

/// Filters that declarations can reference by name.
///
/// [`FilterRegistry::default`] contains the built-ins: `trim`, `lowercase`,
/// `uppercase` and `non_empty`. String filters leave non-string values untouched.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, ParamFilter>,
}

impl FilterRegistry {
    /// A registry without any filter.
    #[must_use]
    pub fn empty() -> Self {
        FilterRegistry {
            filters: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("trim", map_string(|s| s.trim().to_string()));
        registry.register("lowercase", map_string(|s| s.to_lowercase()));
        registry.register("uppercase", map_string(|s| s.to_uppercase()));
        registry.register("non_empty", |_raw: &Value, value: ParamValue| {
            let blank = match &value {
                ParamValue::String(s) => s.trim().is_empty(),
                ParamValue::Array(a) => a.is_empty(),
                _ => false,
            };
            if blank {
                Err("value must not be empty".to_string())
            } else {
                Ok(value)
            }
        });
        registry
    }

    /// Register (or replace) a filter under `name`.
    pub fn register<F>(&mut self, name: &str, filter: F)
    where
        F: Fn(&Value, ParamValue) -> Result<ParamValue, String> + Send + Sync + 'static,
    {
        self.filters.insert(name.to_string(), Arc::new(filter));
    }

    /// Builder-style [`FilterRegistry::register`].
    #[must_use]
    pub fn with<F>(mut self, name: &str, filter: F) -> Self
    where
        F: Fn(&Value, ParamValue) -> Result<ParamValue, String> + Send + Sync + 'static,
    {
        self.register(name, filter);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<NamedFilter> {
        self.filters
            .get(name)
            .map(|f| NamedFilter::new(name, Arc::clone(f)))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}

fn map_string(
    f: impl Fn(&str) -> String + Send + Sync + 'static,
) -> impl Fn(&Value, ParamValue) -> Result<ParamValue, String> + Send + Sync + 'static {
    move |_raw: &Value, value: ParamValue| match value {
        ParamValue::String(s) => Ok(ParamValue::String(f(&s))),
        other => Ok(other),
    }
}
