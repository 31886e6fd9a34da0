use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::AuthResult;
use crate::authn::BEARER_MALFORMED;
use crate::error::GatewayError;
use crate::gateway::{CheckQuery, ExpandQuery, Gateway, RelationQuery};
use crate::policy::{Decision, ExpansionOutcome, PolicyDecision};

/// Shared state of the gateway routes.
#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<Gateway>,
}

impl GatewayState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

/// `GET /health`
pub async fn health_handler() -> &'static str {
    "OK!"
}

/// `GET /api/v1/auth/check`
pub async fn check_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    query: Result<Query<CheckQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(query) = query.map_err(rejected)?;
    let authorization = authorization_header(&headers)?;
    let decision = state.gateway.check(query, authorization).await?;
    Ok(decision_response(decision))
}

/// `GET /api/v1/auth/relation_tuples`
pub async fn query_handler(
    State(state): State<GatewayState>,
    query: Result<Query<RelationQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(query) = query.map_err(rejected)?;
    let decision = state.gateway.query(query).await?;
    Ok(decision_response(decision))
}

/// `GET /api/v1/auth/expand`
pub async fn expand_handler(
    State(state): State<GatewayState>,
    query: Result<Query<ExpandQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(query) = query.map_err(rejected)?;
    let outcome = state.gateway.expand(query).await?;
    let status = match outcome {
        ExpansionOutcome::Found(_) => StatusCode::OK,
        ExpansionOutcome::NotFound(_) => StatusCode::NOT_FOUND,
    };
    Ok((status, Json(outcome.into_payload())).into_response())
}

fn decision_response(decision: PolicyDecision) -> Response {
    let status = match decision.decision {
        Decision::Allowed => StatusCode::OK,
        Decision::Forbidden => StatusCode::FORBIDDEN,
    };
    (status, Json(decision.payload)).into_response()
}

fn rejected(rejection: QueryRejection) -> GatewayError {
    GatewayError::bad_request(rejection.body_text())
}

/// The `Authorization` header, if present. A value that is not visible ASCII
/// cannot carry a bearer token.
fn authorization_header(headers: &HeaderMap) -> AuthResult<Option<&str>> {
    headers
        .get(header::AUTHORIZATION)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| GatewayError::unauthorized(BEARER_MALFORMED))
        })
        .transpose()
}
