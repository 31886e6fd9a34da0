//! Trace-context propagation for outbound upstream calls.
//!
//! The globally installed OpenTelemetry text-map propagator (W3C
//! `traceparent` once observability is initialised, a no-op otherwise) is
//! asked to serialise the context of the current `tracing` span into the
//! outbound request headers.

use opentelemetry::propagation::Injector;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing_opentelemetry::OpenTelemetrySpanExt;

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                self.0.insert(name, value);
            }
            _ => tracing::debug!(header = key, "Skipping unrepresentable trace header"),
        }
    }
}

/// Inject the current span's trace context into `headers`.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let cx = tracing::Span::current().context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderInjector(headers));
    });
}
