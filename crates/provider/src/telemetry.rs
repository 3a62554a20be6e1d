//! Logging and tracing set-up for the CLI

use std::{env, io};

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::SpanExporter;
use opentelemetry_resource_detectors::{K8sResourceDetector, ProcessResourceDetector};
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Keeps the span exporter alive until [`Telemetry::shutdown`]
#[must_use = "spans are only flushed by Telemetry::shutdown"]
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Flushes pending spans; logs go through `tracing` until the end
    pub fn shutdown(self) {
        if let Some(provider) = self.provider
            && let Err(e) = provider.shutdown()
        {
            tracing::warn!(error = %e, "failed to flush spans");
        }
    }
}

fn resource() -> Resource {
    Resource::builder()
        .with_detector(Box::new(K8sResourceDetector))
        .with_detector(Box::new(ProcessResourceDetector))
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

fn init_provider() -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder().with_tonic().build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

fn is_otel_enabled() -> bool {
    env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
}

fn is_json() -> bool {
    env::var("LOG_FORMAT").is_ok_and(|v| v == "json")
}

/// Installs the global subscriber
///
/// Logs go to stderr, filtered by `LOG_LEVEL` (default `warn`), as JSON when
/// `LOG_FORMAT=json`. Spans are exported over OTLP when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// # Errors
/// Will return `Err` if the exporter or the subscriber cannot be installed
pub fn init() -> anyhow::Result<Telemetry> {
    let logger = if is_json() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .boxed()
    };

    let env_filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("warn"));
    let reg = Registry::default().with(env_filter).with(logger);

    if is_otel_enabled() {
        let provider = init_provider()?;
        let otel = OpenTelemetryLayer::new(provider.tracer("crdform"));
        reg.with(otel).try_init()?;
        Ok(Telemetry {
            provider: Some(provider),
        })
    } else {
        reg.try_init()?;
        Ok(Telemetry { provider: None })
    }
}
