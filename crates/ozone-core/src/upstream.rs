//! HTTP executor for calls to the introspection and policy services.
//!
//! [`UpstreamClient`] owns one pooled `reqwest::Client` and applies a hard
//! per-call timeout to every request. Responses are handed back with their
//! status and body whatever the status code; interpreting a `403` or `404`
//! answer is the caller's job.

use std::time::Duration;

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::UpstreamError;
use crate::propagation::inject_trace_context;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A single outbound request, built up before execution.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<String>,
}

impl UpstreamRequest {
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Append a percent-encoded `key=value` pair to the query string.
    #[must_use]
    pub fn query_pair(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    /// Set a header, replacing any previous value for the same name.
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, UpstreamError> {
        let value = HeaderValue::from_str(value).map_err(|e| UpstreamError::InvalidHeader {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Ask for a JSON response.
    #[must_use]
    pub fn accept_json(mut self) -> Self {
        self.headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        self
    }

    /// Use `pairs` as an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        self.body = Some(encoded);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Status and raw body of an upstream answer.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decode the body as JSON regardless of the status code.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, UpstreamError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Pooled HTTP client with a fixed per-call deadline.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(Self { http, timeout })
    }

    /// Execute `request` against the upstream named `service`.
    ///
    /// The current span's trace context is injected into the request headers.
    /// Dropping the returned future cancels the call.
    #[instrument(
        name = "upstream.call",
        skip(self, request),
        fields(upstream = service, http.method = %request.method, http.path = %request.url.path())
    )]
    pub async fn execute(
        &self,
        service: &str,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let UpstreamRequest {
            method,
            url,
            mut headers,
            body,
        } = request;

        inject_trace_context(&mut headers);

        debug!(timeout_ms = self.timeout.as_millis() as u64, "Dispatching upstream request");

        let mut builder = self
            .http
            .request(method, url.clone())
            .headers(headers)
            .timeout(self.timeout);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            let err = self.map_reqwest_error(e);
            warn!(upstream = service, url = %url.path(), error = %err, "Upstream call failed");
            err
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            let err = if e.is_timeout() {
                UpstreamError::Timeout {
                    timeout_ms: self.timeout.as_millis(),
                }
            } else {
                UpstreamError::Body(e.to_string())
            };
            warn!(upstream = service, url = %url.path(), error = %err, "Failed to read upstream body");
            err
        })?;

        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            "Upstream responded"
        );

        Ok(UpstreamResponse::new(status, body.to_vec()))
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout {
                timeout_ms: self.timeout.as_millis(),
            }
        } else if e.is_connect() {
            UpstreamError::Connect(e.to_string())
        } else {
            UpstreamError::Request(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(timeout_ms: u64) -> UpstreamClient {
        UpstreamClient::new(Duration::from_millis(timeout_ms)).unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_query_pairs_are_encoded() {
        let request = UpstreamRequest::get(Url::parse("http://policy/check").unwrap())
            .query_pair("namespace", "files")
            .query_pair("subject_set.object", "a b&c");
        assert_eq!(
            request.url().as_str(),
            "http://policy/check?namespace=files&subject_set.object=a+b%26c"
        );
    }

    #[test]
    fn test_form_sets_content_type() {
        let request = UpstreamRequest::post(Url::parse("http://hydra/introspect").unwrap())
            .form(&[("token", "abc=")]);
        assert_eq!(request.headers().get(CONTENT_TYPE).unwrap(), FORM_CONTENT_TYPE);
        assert_eq!(request.body.as_deref(), Some("token=abc%3D"));
        assert_eq!(request.method(), &Method::POST);
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let err = UpstreamRequest::get(Url::parse("http://hydra/").unwrap())
            .header(AUTHORIZATION, "Bearer \n")
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidHeader { .. }));
    }

    #[tokio::test]
    async fn test_execute_post_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/introspect"))
            .and(header("authorization", "Bearer abc"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string("token=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"sub": "u1"})))
            .expect(1)
            .mount(&server)
            .await;

        let request = UpstreamRequest::post(url(&server, "/oauth2/introspect"))
            .header(AUTHORIZATION, "Bearer abc")
            .unwrap()
            .form(&[("token", "abc")]);
        let response = client(1000).execute("hydra", request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["sub"], "u1");
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/relation-tuples/check"))
            .and(query_param("subject_id", "u1"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(serde_json::json!({"allowed": false})),
            )
            .mount(&server)
            .await;

        let request = UpstreamRequest::get(url(&server, "/relation-tuples/check"))
            .query_pair("subject_id", "u1")
            .accept_json();
        let response = client(1000).execute("keto", request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["allowed"], false);
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let request = UpstreamRequest::get(url(&server, "/slow"));
        let err = client(50).execute("keto", request).await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop a listener to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = UpstreamRequest::get(Url::parse(&format!("http://{addr}/")).unwrap());
        let err = client(1000).execute("hydra", request).await.unwrap_err();
        assert!(err.is_transport(), "expected transport error, got {err:?}");
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let response = client(1000)
            .execute("keto", UpstreamRequest::get(url(&server, "/")))
            .await
            .unwrap();
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }
}
