use ozone_core::{UpstreamClient, UpstreamError, UpstreamRequest};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::types::{
    CheckResponse, Decision, ExpansionOutcome, ExpansionRequest, POLICY_DOES_NOT_EXIST,
    POLICY_EXISTS, PolicyCheckRequest, PolicyDecision, PolicySubject, SubjectSet,
};
use crate::AuthResult;
use crate::config::{ConfigError, PolicyServiceConfig, endpoint};
use crate::error::GatewayError;

/// Upstream name used in logs and `UpstreamUnavailable` errors.
pub const POLICY_SERVICE: &str = "policy";

/// Client of the policy service's check and expand endpoints.
#[derive(Debug, Clone)]
pub struct PolicyResolver {
    upstream: UpstreamClient,
    check_url: Url,
    expand_url: Url,
}

impl PolicyResolver {
    pub fn from_config(
        config: &PolicyServiceConfig,
        upstream: UpstreamClient,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            upstream,
            check_url: endpoint("auth.policy.read_url", &config.read_url, &config.check_path)?,
            expand_url: endpoint("auth.policy.read_url", &config.read_url, &config.expand_path)?,
        })
    }

    /// Check a direct subject. The subject id is echoed back as the payload.
    #[instrument(name = "check_policy", skip(self))]
    pub async fn check_direct(
        &self,
        namespace: &str,
        relation: &str,
        object: &str,
        subject_id: &str,
    ) -> AuthResult<PolicyDecision> {
        let request =
            PolicyCheckRequest::new(namespace, relation, object, PolicySubject::direct(subject_id))?;
        let decision = self.dispatch_check(&request).await?;
        Ok(PolicyDecision {
            decision,
            payload: subject_id.to_string(),
        })
    }

    /// Check a subject-set. The payload is a fixed message.
    #[instrument(name = "check_policy_with_set", skip(self, subject_set), fields(subject_set = %subject_set))]
    pub async fn check_with_set(
        &self,
        namespace: &str,
        relation: &str,
        object: &str,
        subject_set: SubjectSet,
    ) -> AuthResult<PolicyDecision> {
        let request =
            PolicyCheckRequest::new(namespace, relation, object, PolicySubject::Set(subject_set))?;
        let decision = self.dispatch_check(&request).await?;
        let payload = match decision {
            Decision::Allowed => POLICY_EXISTS,
            Decision::Forbidden => POLICY_DOES_NOT_EXIST,
        };
        Ok(PolicyDecision {
            decision,
            payload: payload.to_string(),
        })
    }

    /// Run a validated check through the variant its subject selects.
    pub async fn check(&self, request: PolicyCheckRequest) -> AuthResult<PolicyDecision> {
        match request.subject() {
            PolicySubject::Direct { subject_id } => {
                self.check_direct(
                    request.namespace(),
                    request.relation(),
                    request.object(),
                    subject_id,
                )
                .await
            }
            PolicySubject::Set(set) => {
                self.check_with_set(
                    request.namespace(),
                    request.relation(),
                    request.object(),
                    set.clone(),
                )
                .await
            }
        }
    }

    async fn dispatch_check(&self, request: &PolicyCheckRequest) -> AuthResult<Decision> {
        let mut upstream = UpstreamRequest::get(self.check_url.clone())
            .query_pair("namespace", request.namespace())
            .query_pair("relation", request.relation())
            .query_pair("object", request.object());
        upstream = match request.subject() {
            PolicySubject::Direct { subject_id } => upstream.query_pair("subject_id", subject_id),
            PolicySubject::Set(set) => upstream
                .query_pair("subject_set.namespace", &set.namespace)
                .query_pair("subject_set.relation", &set.relation)
                .query_pair("subject_set.object", &set.object),
        };

        let response = self
            .upstream
            .execute(POLICY_SERVICE, upstream.accept_json())
            .await
            .map_err(|e| unavailable(&e))?;

        let body: CheckResponse = response.json().map_err(|e| {
            warn!(status = response.status().as_u16(), error = %e, "Check response could not be decoded");
            unavailable(&e)
        })?;

        let decision = Decision::from_allowed(body.allowed);
        if decision.is_allowed() {
            debug!(tuple = %request.to_tuple(), "Policy allows");
        } else {
            info!(tuple = %request.to_tuple(), "Policy denies");
        }
        Ok(decision)
    }

    /// Expand a relation into its subject tree.
    #[instrument(
        name = "expand_policy",
        skip(self, request),
        fields(
            namespace = request.namespace(),
            relation = request.relation(),
            object = request.object(),
            max_depth = ?request.max_depth()
        )
    )]
    pub async fn expand(&self, request: &ExpansionRequest) -> AuthResult<ExpansionOutcome> {
        let mut upstream = UpstreamRequest::get(self.expand_url.clone())
            .query_pair("namespace", request.namespace())
            .query_pair("relation", request.relation())
            .query_pair("object", request.object());
        if let Some(depth) = request.max_depth() {
            upstream = upstream.query_pair("max-depth", &depth.to_string());
        }

        let response = self
            .upstream
            .execute(POLICY_SERVICE, upstream.accept_json())
            .await
            .map_err(|e| unavailable(&e))?;

        let payload: Value = response.json().map_err(|e| {
            warn!(status = response.status().as_u16(), error = %e, "Expand response could not be decoded");
            unavailable(&e)
        })?;

        interpret_expansion(payload)
    }
}

fn unavailable(e: &UpstreamError) -> GatewayError {
    GatewayError::from_upstream(POLICY_SERVICE, e)
}

/// Classify an expand payload by the status code embedded in it.
fn interpret_expansion(payload: Value) -> AuthResult<ExpansionOutcome> {
    if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
        if embedded_code(error) == Some(404) {
            debug!("Expansion target has no policy tree");
            return Ok(ExpansionOutcome::NotFound(payload));
        }
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .unwrap_or("Policy service rejected the expansion")
            .to_string();
        warn!(error = %error, "Policy service reported an error");
        return Err(GatewayError::bad_request(message));
    }

    if embedded_code(&payload) == Some(404) {
        return Ok(ExpansionOutcome::NotFound(payload));
    }

    Ok(ExpansionOutcome::Found(payload))
}

fn embedded_code(value: &Value) -> Option<i64> {
    match value.get("code")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_found_payload_passes_through() {
        let payload = json!({"type": "union", "children": [{"type": "leaf", "subject_id": "u1"}]});
        assert_eq!(
            interpret_expansion(payload.clone()).unwrap(),
            ExpansionOutcome::Found(payload)
        );
    }

    #[test]
    fn test_embedded_not_found() {
        let payload = json!({"error": {"code": 404, "status": "Not Found", "message": "no tree"}});
        assert_eq!(
            interpret_expansion(payload.clone()).unwrap(),
            ExpansionOutcome::NotFound(payload)
        );

        let payload = json!({"code": 404, "message": "not found"});
        assert!(matches!(
            interpret_expansion(payload).unwrap(),
            ExpansionOutcome::NotFound(_)
        ));
    }

    #[test]
    fn test_string_code_is_recognised() {
        let payload = json!({"error": {"code": "404"}});
        assert!(matches!(
            interpret_expansion(payload).unwrap(),
            ExpansionOutcome::NotFound(_)
        ));
    }

    #[test]
    fn test_other_embedded_error_is_bad_request() {
        let payload = json!({"error": {"code": 400, "message": "unknown namespace"}});
        let err = interpret_expansion(payload).unwrap_err();
        assert_eq!(err, GatewayError::bad_request("unknown namespace"));
    }

    #[test]
    fn test_from_config_joins_paths() {
        let resolver = PolicyResolver::from_config(
            &PolicyServiceConfig::default(),
            UpstreamClient::new(std::time::Duration::from_secs(1)).unwrap(),
        )
        .unwrap();
        assert_eq!(
            resolver.check_url.as_str(),
            "http://localhost:4466/relation-tuples/check"
        );
        assert_eq!(
            resolver.expand_url.as_str(),
            "http://localhost:4466/relation-tuples/expand"
        );
    }
}
