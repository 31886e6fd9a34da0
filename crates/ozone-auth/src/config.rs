//! Upstream and cache configuration for the resolvers.
//!
//! Loaded once at startup as the `[auth]` section of the server
//! configuration and threaded into the resolver constructors; nothing here is
//! read again at request time.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! default_issuer = "bouncer"
//! upstream_timeout = "3s"
//!
//! [auth.issuers.bouncer]
//! url = "http://bouncer-hydra:4445"
//! introspect_path = "/oauth2/introspect"
//!
//! [auth.issuers.accounts]
//! url = "http://accounts-hydra:4445"
//! introspect_path = "/oauth2/introspect"
//!
//! [auth.policy]
//! read_url = "http://keto:4466"
//!
//! [auth.cache]
//! failsafe_interval = "1s"
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Hint used when the caller does not name an issuer.
pub const DEFAULT_ISSUER: &str = "bouncer";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token issuers keyed by the hint callers use to select them.
    pub issuers: HashMap<String, IssuerConfig>,

    /// Issuer used for an omitted or unknown hint. Must be a key of `issuers`.
    pub default_issuer: String,

    pub policy: PolicyServiceConfig,

    pub cache: IntrospectionCacheConfig,

    /// Hard deadline for each individual upstream call.
    #[serde(with = "humantime_serde")]
    pub upstream_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut issuers = HashMap::new();
        issuers.insert(DEFAULT_ISSUER.to_string(), IssuerConfig::default());
        Self {
            issuers,
            default_issuer: DEFAULT_ISSUER.to_string(),
            policy: PolicyServiceConfig::default(),
            cache: IntrospectionCacheConfig::default(),
            upstream_timeout: Duration::from_secs(3),
        }
    }
}

/// A token introspection endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Base URL of the issuer's admin API.
    pub url: String,
    pub introspect_path: String,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:4445".to_string(),
            introspect_path: "/oauth2/introspect".to_string(),
        }
    }
}

/// Read API of the policy service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyServiceConfig {
    pub read_url: String,
    pub check_path: String,
    pub expand_path: String,
}

impl Default for PolicyServiceConfig {
    fn default() -> Self {
        Self {
            read_url: "http://localhost:4466".to_string(),
            check_path: "/relation-tuples/check".to_string(),
            expand_path: "/relation-tuples/expand".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntrospectionCacheConfig {
    /// When disabled every `check` introspects the token.
    pub enabled: bool,

    /// Safety margin subtracted from a token's remaining lifetime.
    #[serde(with = "humantime_serde")]
    pub failsafe_interval: Duration,

    /// How often expired entries are swept. Zero disables the sweep.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for IntrospectionCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failsafe_interval: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - `Missing` if there are no issuers or the default issuer is not one of them
    /// - `InvalidValue` for unparseable URLs, paths without a leading `/`, or a
    ///   zero upstream timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuers.is_empty() {
            return Err(ConfigError::Missing("auth.issuers".to_string()));
        }
        if !self.issuers.contains_key(&self.default_issuer) {
            return Err(ConfigError::Missing(format!(
                "auth.issuers.{} (named by auth.default_issuer)",
                self.default_issuer
            )));
        }

        for (hint, issuer) in &self.issuers {
            if hint.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "issuer hint must not be empty".to_string(),
                ));
            }
            parse_url(&format!("auth.issuers.{hint}.url"), &issuer.url)?;
            check_path(
                &format!("auth.issuers.{hint}.introspect_path"),
                &issuer.introspect_path,
            )?;
        }

        parse_url("auth.policy.read_url", &self.policy.read_url)?;
        check_path("auth.policy.check_path", &self.policy.check_path)?;
        check_path("auth.policy.expand_path", &self.policy.expand_path)?;

        if self.upstream_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.upstream_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse `value` as an absolute http(s) URL.
pub(crate) fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidValue(format!("{field}: '{value}' is not a URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue(format!(
            "{field}: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

fn check_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::InvalidValue(format!(
            "{field}: '{value}' must start with '/'"
        )));
    }
    Ok(())
}

/// Join a configured base URL and absolute path.
///
/// The path replaces whatever path the base URL carried.
pub(crate) fn endpoint(field: &str, base: &str, path: &str) -> Result<Url, ConfigError> {
    let mut url = parse_url(field, base)?;
    url.set_path(path);
    Ok(url)
}
