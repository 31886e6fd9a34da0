//! `IntoResponse` for [`GatewayError`].
//!
//! The body is the bare error message as a JSON string, the same shape the
//! decision endpoints use for their payloads.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.is_client_error() {
            tracing::info!(
                category = %self.category(),
                status = status.as_u16(),
                error = self.message(),
                "Request rejected"
            );
        } else {
            tracing::warn!(
                category = %self.category(),
                status = status.as_u16(),
                error = %self,
                "Upstream dependency failed"
            );
        }

        let mut response = (status, Json(self.message())).into_response();

        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(self.message());
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

fn build_www_authenticate_header(description: &str) -> String {
    let escaped = description.replace('"', "\\\"");
    format!("Bearer realm=\"ozone\", error=\"invalid_token\", error_description=\"{escaped}\"")
}
