// Tracing initialization: env-filtered JSON or pretty logs, plus an optional
// OTLP span pipeline with W3C trace-context propagation.
use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogFormat, LoggingConfig, OtelConfig};

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing(logging: &LoggingConfig, otel: &OtelConfig) -> anyhow::Result<()> {
    // Prefer RUST_LOG from env, otherwise use the configured level.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&logging.level));

    let (json_layer, pretty_layer) = match logging.format {
        LogFormat::Json => (
            Some(fmt::layer().json().flatten_event(true).with_current_span(true)),
            None,
        ),
        LogFormat::Pretty => (None, Some(fmt::layer().with_target(false))),
    };

    let provider = if otel.enabled {
        Some(build_tracer_provider(otel)?)
    } else {
        None
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("ozone")));

    if tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing already initialized, skipping");
        return Ok(());
    }

    if let Some(provider) = provider {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        opentelemetry::global::set_tracer_provider(provider.clone());
        let _ = TRACER_PROVIDER.set(provider);
    }

    tracing::info!(
        service = %otel.service_name,
        otel_enabled = otel.enabled,
        level = %logging.level,
        "Tracing initialized"
    );
    Ok(())
}

fn build_tracer_provider(otel: &OtelConfig) -> anyhow::Result<SdkTracerProvider> {
    let endpoint = otel
        .endpoint
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| anyhow::anyhow!("otel.enabled=true requires otel.endpoint"))?;

    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(otel.service_name.clone())
        .build();

    let ratio = otel.sample_ratio.unwrap_or(1.0);
    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            ratio,
        ))))
        .with_resource(resource)
        .build())
}

/// Flush and stop the OTLP pipeline, if one was started.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
    }
}
