//! Axum handlers for the gateway API.
//!
//! # Routes
//!
//! | Route                              | Operation                         |
//! |------------------------------------|-----------------------------------|
//! | `GET /health`                      | liveness, always `200 "OK!"`      |
//! | `GET /api/v1/auth/check`           | authenticate, then check          |
//! | `GET /api/v1/auth/relation_tuples` | check a caller-supplied subject   |
//! | `GET /api/v1/auth/expand`          | expand a relation                 |

mod error;
mod handlers;

use axum::{Router, routing::get};

pub use handlers::{GatewayState, check_handler, expand_handler, health_handler, query_handler};

/// Router with every gateway route, state applied.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1/auth", auth_routes())
        .with_state(state)
}

fn auth_routes() -> Router<GatewayState> {
    Router::new()
        .route("/check", get(check_handler))
        .route("/relation_tuples", get(query_handler))
        .route("/expand", get(expand_handler))
}
