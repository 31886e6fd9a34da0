//! The gateway facade.
//!
//! `check` authenticates and then authorizes; `query` and `expand` go
//! straight to the policy service. Every operation runs under the request
//! deadline: when it elapses the in-flight upstream call is dropped and the
//! caller gets `UpstreamUnavailable`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ozone_core::UpstreamClient;
use serde::Deserialize;
use tracing::warn;

use crate::AuthResult;
use crate::authn::{AuthenticationResolver, IssuerRegistry};
use crate::cache::{IntrospectionCache, create_introspection_cache};
use crate::config::{AuthConfig, ConfigError};
use crate::error::GatewayError;
use crate::policy::{
    ExpansionOutcome, ExpansionRequest, PolicyCheckRequest, PolicyDecision, PolicyResolver,
    PolicySubject, require_target,
};

/// Query parameters of `check`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckQuery {
    pub namespace: String,
    pub relation: String,
    pub object: String,
    /// Which issuer validates the token. `None` if the parameter was absent.
    #[serde(rename = "issuer-hint", alias = "hydra")]
    pub issuer_hint: Option<String>,
}

/// Query parameters of `query`: a target plus a direct or subject-set subject.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelationQuery {
    pub namespace: String,
    pub relation: String,
    pub object: String,
    #[serde(rename = "subject-id")]
    pub subject_id: Option<String>,
    #[serde(rename = "subject-set-namespace")]
    pub subject_set_namespace: Option<String>,
    #[serde(rename = "subject-set-relation")]
    pub subject_set_relation: Option<String>,
    #[serde(rename = "subject-set-object")]
    pub subject_set_object: Option<String>,
}

impl RelationQuery {
    fn subject(&self) -> PolicySubject {
        PolicySubject::from_parts(
            self.subject_id.as_deref(),
            self.subject_set_namespace.as_deref(),
            self.subject_set_relation.as_deref(),
            self.subject_set_object.as_deref(),
        )
    }
}

/// Query parameters of `expand`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExpandQuery {
    pub namespace: String,
    pub relation: String,
    pub object: String,
    /// Raw depth text; parsed during validation.
    #[serde(rename = "max-depth")]
    pub max_depth: Option<String>,
}

pub struct Gateway {
    authn: AuthenticationResolver,
    policy: PolicyResolver,
    request_timeout: Duration,
}

impl Gateway {
    pub fn new(
        authn: AuthenticationResolver,
        policy: PolicyResolver,
        request_timeout: Duration,
    ) -> Self {
        Self {
            authn,
            policy,
            request_timeout,
        }
    }

    /// Wire both resolvers from configuration.
    pub fn from_config(config: &AuthConfig, request_timeout: Duration) -> Result<Self, ConfigError> {
        config.validate()?;

        let upstream = UpstreamClient::new(config.upstream_timeout)
            .map_err(|e| ConfigError::InvalidValue(format!("upstream client: {e}")))?;
        let issuers = IssuerRegistry::from_config(config)?;
        let cache = create_introspection_cache(config.cache.enabled);

        let authn = AuthenticationResolver::new(
            issuers,
            cache,
            upstream.clone(),
            config.cache.failsafe_interval,
        );
        let policy = PolicyResolver::from_config(&config.policy, upstream)?;

        Ok(Self::new(authn, policy, request_timeout))
    }

    pub fn cache(&self) -> &Arc<dyn IntrospectionCache> {
        self.authn.cache()
    }

    /// Authenticate the bearer token, then check the resolved subject.
    ///
    /// A query missing its target is rejected before any upstream call, and
    /// the policy service is never consulted without a resolved subject.
    pub async fn check(
        &self,
        query: CheckQuery,
        authorization: Option<&str>,
    ) -> AuthResult<PolicyDecision> {
        self.within_deadline("check", async {
            require_target(&query.namespace, &query.relation, &query.object)?;
            let subject = self
                .authn
                .resolve(query.issuer_hint.as_deref(), authorization)
                .await?;
            self.policy
                .check_direct(&query.namespace, &query.relation, &query.object, &subject)
                .await
        })
        .await
    }

    /// Check a caller-supplied subject without authenticating.
    pub async fn query(&self, query: RelationQuery) -> AuthResult<PolicyDecision> {
        let request = PolicyCheckRequest::new(
            query.namespace.as_str(),
            query.relation.as_str(),
            query.object.as_str(),
            query.subject(),
        )?;
        self.within_deadline("query", self.policy.check(request))
            .await
    }

    pub async fn expand(&self, query: ExpandQuery) -> AuthResult<ExpansionOutcome> {
        let request = ExpansionRequest::new(
            query.namespace,
            query.relation,
            query.object,
            query.max_depth.as_deref(),
        )?;
        self.within_deadline("expand", self.policy.expand(&request))
            .await
    }

    async fn within_deadline<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = AuthResult<T>>,
    ) -> AuthResult<T> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Request deadline exceeded"
                );
                Err(GatewayError::upstream_unavailable(
                    operation,
                    "request deadline exceeded",
                ))
            }
        }
    }
}
