#![allow(dead_code)]

use std::time::Duration;

use ozone_auth::{AuthConfig, Gateway, IssuerConfig};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const INTROSPECT_PATH: &str = "/oauth2/introspect";
pub const ACCOUNTS_INTROSPECT_PATH: &str = "/accounts/oauth2/introspect";
pub const CHECK_PATH: &str = "/relation-tuples/check";
pub const EXPAND_PATH: &str = "/relation-tuples/expand";

/// Config with both issuers and the policy service pointed at `server`.
pub fn config_for(server: &MockServer) -> AuthConfig {
    let mut config = AuthConfig::default();
    config.issuers.insert(
        "bouncer".to_string(),
        IssuerConfig {
            url: server.uri(),
            introspect_path: INTROSPECT_PATH.to_string(),
        },
    );
    config.issuers.insert(
        "accounts".to_string(),
        IssuerConfig {
            url: server.uri(),
            introspect_path: ACCOUNTS_INTROSPECT_PATH.to_string(),
        },
    );
    config.policy.read_url = server.uri();
    config.upstream_timeout = Duration::from_millis(500);
    config
}

pub fn gateway_for(server: &MockServer) -> Gateway {
    Gateway::from_config(&config_for(server), Duration::from_secs(5)).unwrap()
}

/// Introspection body for an active token expiring in `lifetime_secs`.
pub fn active_token(subject: &str, lifetime_secs: i64) -> Value {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    json!({
        "active": true,
        "sub": subject,
        "exp": now + lifetime_secs,
        "iat": now,
        "scope": "offline",
        "client_id": "client-123",
        "token_type": "access_token"
    })
}

pub async fn mount_introspection(server: &MockServer, body: Value, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(INTROSPECT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_check(server: &MockServer, allowed: bool, expected_calls: u64) {
    let status = if allowed { 200 } else { 403 };
    Mock::given(method("GET"))
        .and(path(CHECK_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "allowed": allowed })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Fails verification if anything reaches `server`.
pub async fn expect_no_calls(server: &MockServer) {
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}
