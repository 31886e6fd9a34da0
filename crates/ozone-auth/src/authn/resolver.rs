use std::sync::Arc;
use std::time::{Duration, Instant};

use ozone_core::header::AUTHORIZATION;
use ozone_core::{UpstreamClient, UpstreamError, UpstreamRequest};
use time::OffsetDateTime;
use tracing::{Span, debug, instrument, warn};

use super::bearer::parse_bearer;
use super::introspection::IntrospectionResult;
use super::issuer::{Issuer, IssuerRegistry};
use crate::AuthResult;
use crate::cache::{IntrospectionCache, introspection_expiry};
use crate::error::GatewayError;

/// Upstream name used in logs and `UpstreamUnavailable` errors.
pub const INTROSPECTION_SERVICE: &str = "introspection";

/// Resolves a bearer token to a subject via the selected issuer.
pub struct AuthenticationResolver {
    issuers: IssuerRegistry,
    cache: Arc<dyn IntrospectionCache>,
    upstream: UpstreamClient,
    failsafe_interval: Duration,
}

impl AuthenticationResolver {
    pub fn new(
        issuers: IssuerRegistry,
        cache: Arc<dyn IntrospectionCache>,
        upstream: UpstreamClient,
        failsafe_interval: Duration,
    ) -> Self {
        Self {
            issuers,
            cache,
            upstream,
            failsafe_interval,
        }
    }

    pub fn cache(&self) -> &Arc<dyn IntrospectionCache> {
        &self.cache
    }

    /// Resolve the subject of the token carried by `authorization`.
    ///
    /// `issuer_hint` is `None` when the caller did not send one; `Some("")`
    /// means it was sent empty and is rejected. A cache hit returns without
    /// any upstream call.
    #[instrument(
        name = "introspect_token",
        skip(self, authorization),
        fields(issuer = tracing::field::Empty, cached = tracing::field::Empty)
    )]
    pub async fn resolve(
        &self,
        issuer_hint: Option<&str>,
        authorization: Option<&str>,
    ) -> AuthResult<String> {
        if issuer_hint.is_some_and(str::is_empty) {
            return Err(GatewayError::bad_request("Invalid issuer hint"));
        }

        let token = parse_bearer(authorization)?;
        let header = authorization.unwrap_or_default();

        if let Some(subject) = self.cache.get(token).await {
            Span::current().record("cached", true);
            debug!("Subject found in cache");
            return Ok(subject);
        }
        Span::current().record("cached", false);

        let issuer = self.issuers.select(issuer_hint);
        Span::current().record("issuer", issuer.name());

        let result = self.introspect(issuer, header, token).await?;

        let Some(subject) = result.subject() else {
            warn!(active = result.active, "Introspection returned no subject");
            return Err(GatewayError::unauthorized("Invalid token"));
        };

        // Both clocks are read once so the entry cannot outlive `exp - failsafe`.
        let (now, at) = (OffsetDateTime::now_utc(), Instant::now());
        let expires_at = result
            .expires_at()
            .map(|exp| introspection_expiry(exp, now, at, self.failsafe_interval))
            .unwrap_or(at);
        self.cache.insert(token, subject.to_string(), expires_at).await;

        debug!(
            subject,
            ttl_secs = expires_at.duration_since(at).as_secs(),
            issued_at = result.issued_at().map(|iat| iat.unix_timestamp()),
            "Token introspected"
        );

        Ok(subject.to_string())
    }

    async fn introspect(
        &self,
        issuer: &Issuer,
        header: &str,
        token: &str,
    ) -> AuthResult<IntrospectionResult> {
        let unavailable = |e: &UpstreamError| {
            GatewayError::from_upstream(INTROSPECTION_SERVICE, e)
        };

        let request = UpstreamRequest::post(issuer.introspect_url().clone())
            .header(AUTHORIZATION, header)
            .map_err(|e| GatewayError::unauthorized(e.to_string()))?
            .form(&[("token", token)]);

        let response = self
            .upstream
            .execute(INTROSPECTION_SERVICE, request)
            .await
            .map_err(|e| unavailable(&e))?;

        response.json::<IntrospectionResult>().map_err(|e| {
            warn!(
                issuer = issuer.name(),
                status = response.status().as_u16(),
                error = %e,
                "Introspection response could not be decoded"
            );
            unavailable(&e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalIntrospectionCache;
    use crate::config::AuthConfig;

    fn resolver() -> AuthenticationResolver {
        let issuers = IssuerRegistry::from_config(&AuthConfig::default()).unwrap();
        AuthenticationResolver::new(
            issuers,
            Arc::new(LocalIntrospectionCache::new()),
            UpstreamClient::new(Duration::from_millis(100)).unwrap(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_empty_hint_is_bad_request() {
        let err = resolver()
            .resolve(Some(""), Some("Bearer abc"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::bad_request("Invalid issuer hint"));
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let err = resolver().resolve(None, None).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_upstream() {
        // The default issuer points at localhost:4445; a hit must never reach it.
        let resolver = resolver();
        resolver
            .cache()
            .insert("abc", "user-1".to_string(), Instant::now() + Duration::from_secs(60))
            .await;

        let subject = resolver
            .resolve(None, Some("Bearer abc"))
            .await
            .unwrap();
        assert_eq!(subject, "user-1");
    }
}
