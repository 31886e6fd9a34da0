use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// RFC 7662 introspection response as returned by the issuer.
///
/// Inactive tokens come back with most fields missing, so everything
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IntrospectionResult {
    pub active: bool,
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: Option<i64>,
    /// Issuance, seconds since the Unix epoch.
    pub iat: Option<i64>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub token_type: Option<String>,
}

impl IntrospectionResult {
    /// The resolved subject. An empty subject means the token is unusable,
    /// whatever `active` says.
    pub fn subject(&self) -> Option<&str> {
        if self.sub.is_empty() {
            None
        } else {
            Some(&self.sub)
        }
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.exp
            .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
    }

    pub fn issued_at(&self) -> Option<OffsetDateTime> {
        self.iat
            .and_then(|iat| OffsetDateTime::from_unix_timestamp(iat).ok())
    }
}
