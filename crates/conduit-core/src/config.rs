//! # Conduit Configuration
//!
//! Settings for proxy synthesis, loaded from environment variables or built
//! programmatically.

use crate::value::MAX_ARITY;
use std::env;

/// Configuration for a [`ProxyBuilder`](crate::ProxyBuilder).
///
/// # Example
/// ```rust
/// use conduit_core::ProxyConfig;
///
/// // Load from environment
/// let config = ProxyConfig::from_env();
///
/// // Or customize
/// let config = ProxyConfig::default()
///     .with_type_cache(false)
///     .with_max_parameters(4);
/// assert_eq!(config.max_parameters, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Reuse a synthesized type for every proxy of the same contract.
    /// Default: true, Env: CONDUIT_TYPE_CACHE=false
    pub cache_types: bool,

    /// Verify routine bodies when a type is materialized.
    /// Default: true, Env: CONDUIT_VERIFY=false
    pub verify_routines: bool,

    /// Reject operations with more parameters than this. Never above 12.
    /// Default: 12, Env: CONDUIT_MAX_PARAMS=8
    pub max_parameters: usize,

    /// Prefix of synthesized type names.
    /// Default: "__Proxy_", Env: CONDUIT_TYPE_PREFIX
    pub type_name_prefix: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            cache_types: true,
            verify_routines: true,
            max_parameters: MAX_ARITY,
            type_name_prefix: "__Proxy_".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Create a new config from environment variables.
    /// Falls back to defaults for missing or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("CONDUIT_TYPE_CACHE") {
            config.cache_types = v.to_lowercase() != "false" && v != "0";
        }
        if let Ok(v) = env::var("CONDUIT_VERIFY") {
            config.verify_routines = v.to_lowercase() != "false" && v != "0";
        }
        if let Ok(v) = env::var("CONDUIT_MAX_PARAMS") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_parameters = n.min(MAX_ARITY);
            }
        }
        if let Ok(v) = env::var("CONDUIT_TYPE_PREFIX") {
            config.type_name_prefix = v;
        }

        config
    }

    /// Builder: Enable or disable the type cache.
    pub fn with_type_cache(mut self, enabled: bool) -> Self {
        self.cache_types = enabled;
        self
    }

    /// Builder: Enable or disable routine verification.
    pub fn with_verification(mut self, enabled: bool) -> Self {
        self.verify_routines = enabled;
        self
    }

    /// Builder: Set the parameter limit (clamped to 12).
    pub fn with_max_parameters(mut self, limit: usize) -> Self {
        self.max_parameters = limit.min(MAX_ARITY);
        self
    }

    /// Builder: Set the type name prefix.
    pub fn with_type_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.type_name_prefix = prefix.into();
        self
    }

    /// Name of the type synthesized for `contract`.
    pub fn type_name(&self, contract: &str, observed: bool) -> String {
        if observed {
            format!("{}{}_Observed", self.type_name_prefix, contract)
        } else {
            format!("{}{}", self.type_name_prefix, contract)
        }
    }
}
