//! # Runtime Configuration Module
//!
//! Process-level settings: logging, where the services file lives and the
//! default content type of automatically shaped responses.
//!
//! ## Sources
//!
//! Settings come from an optional YAML file and from environment variables;
//! the environment wins.
//!
//! ```yaml
//! log:
//!   level: debug
//!   format: pretty
//! services_file: config/services.yaml
//! default_content_type: application/json
//! ```
//!
//! ## Environment Variables
//!
//! | variable | field |
//! |---|---|
//! | `BRRTD_LOG_LEVEL` | `log.level` |
//! | `BRRTD_LOG_FORMAT` | `log.format` (`json`, `pretty`, `compact`) |
//! | `BRRTD_LOG_TARGET_FILTER` | `log.target_filter` |
//! | `BRRTD_SERVICES_FILE` | `services_file` |
//! | `BRRTD_DEFAULT_CONTENT_TYPE` | `default_content_type` |
//!
//! ## Usage
//!
//! ```no_run
//! use brrtdispatch::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_yaml_file("brrtdispatch.yaml")?.with_env_overrides();
//! let registry = config.load_registry()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::logging::{LogConfig, LogFormat};
use crate::registry::ServiceRegistry;
use crate::spec::{load_registry, MetadataResolver, DEFAULT_CONTENT_TYPE};
use crate::validator::FilterRegistry;

/// Prefix of every environment variable read here.
pub const ENV_PREFIX: &str = "BRRTD_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub log: LogConfig,
    pub services_file: Option<PathBuf>,
    pub default_content_type: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            log: LogConfig::default(),
            services_file: None,
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Read a YAML configuration file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("failed to parse configuration YAML")
    }

    /// Apply `BRRTD_*` variables from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which is given full variable names
    /// (`BRRTD_LOG_LEVEL`, ...). Empty values are ignored.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
        };
        if let Some(level) = var("LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.log.format = LogFormat::parse(&format);
        }
        if let Some(filter) = var("LOG_TARGET_FILTER") {
            self.log.target_filter = Some(filter);
        }
        if let Some(file) = var("SERVICES_FILE") {
            self.services_file = Some(PathBuf::from(file));
        }
        if let Some(content_type) = var("DEFAULT_CONTENT_TYPE") {
            self.default_content_type = content_type;
        }
        self
    }

    /// A resolver using the built-in filters and this configuration's
    /// default content type.
    #[must_use]
    pub fn resolver(&self) -> MetadataResolver {
        self.resolver_with_filters(FilterRegistry::with_builtins())
    }

    #[must_use]
    pub fn resolver_with_filters(&self, filters: FilterRegistry) -> MetadataResolver {
        MetadataResolver::new()
            .with_filters(filters)
            .with_default_content_type(self.default_content_type.clone())
    }

    /// Load and resolve the configured services file.
    pub fn load_registry(&self) -> Result<ServiceRegistry> {
        let path = self
            .services_file
            .as_ref()
            .ok_or_else(|| anyhow!("no services file configured (set {ENV_PREFIX}SERVICES_FILE)"))?;
        load_registry(path, &self.resolver())
    }
}
