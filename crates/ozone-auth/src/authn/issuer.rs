use std::collections::HashMap;

use url::Url;

use crate::config::{AuthConfig, ConfigError, endpoint};

/// A resolved introspection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    name: String,
    introspect_url: Url,
}

impl Issuer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn introspect_url(&self) -> &Url {
        &self.introspect_url
    }
}

/// Issuers by hint, built once from configuration.
#[derive(Debug, Clone)]
pub struct IssuerRegistry {
    issuers: HashMap<String, Issuer>,
    default: Issuer,
}

impl IssuerRegistry {
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let mut issuers = HashMap::with_capacity(config.issuers.len());
        for (hint, issuer) in &config.issuers {
            let introspect_url = endpoint(
                &format!("auth.issuers.{hint}.url"),
                &issuer.url,
                &issuer.introspect_path,
            )?;
            issuers.insert(
                hint.clone(),
                Issuer {
                    name: hint.clone(),
                    introspect_url,
                },
            );
        }

        let default = issuers
            .get(&config.default_issuer)
            .cloned()
            .ok_or_else(|| {
                ConfigError::Missing(format!("auth.issuers.{}", config.default_issuer))
            })?;

        Ok(Self { issuers, default })
    }

    /// Issuer for `hint`; omitted or unknown hints fall back to the default.
    pub fn select(&self, hint: Option<&str>) -> &Issuer {
        match hint.and_then(|h| self.issuers.get(h)) {
            Some(issuer) => issuer,
            None => {
                if let Some(hint) = hint {
                    tracing::debug!(
                        hint,
                        default = %self.default.name,
                        "Unknown issuer hint, using default issuer"
                    );
                }
                &self.default
            }
        }
    }

    pub fn default_issuer(&self) -> &Issuer {
        &self.default
    }

    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssuerConfig;

    fn config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.issuers.insert(
            "accounts".to_string(),
            IssuerConfig {
                url: "http://accounts:4445".to_string(),
                introspect_path: "/oauth2/introspect".to_string(),
            },
        );
        config
    }

    #[test]
    fn test_select_by_hint() {
        let registry = IssuerRegistry::from_config(&config()).unwrap();
        assert_eq!(registry.len(), 2);

        let issuer = registry.select(Some("accounts"));
        assert_eq!(issuer.name(), "accounts");
        assert_eq!(
            issuer.introspect_url().as_str(),
            "http://accounts:4445/oauth2/introspect"
        );
    }

    #[test]
    fn test_fallback_to_default() {
        let registry = IssuerRegistry::from_config(&config()).unwrap();
        assert_eq!(registry.select(None).name(), "bouncer");
        assert_eq!(registry.select(Some("tars")).name(), "bouncer");
        assert_eq!(registry.default_issuer().name(), "bouncer");
    }

    #[test]
    fn test_missing_default_rejected() {
        let mut config = config();
        config.default_issuer = "xpert".to_string();
        let err = IssuerRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_bad_issuer_url_rejected() {
        let mut config = config();
        config.issuers.get_mut("accounts").unwrap().url = "not a url".to_string();
        assert!(IssuerRegistry::from_config(&config).is_err());
    }
}
