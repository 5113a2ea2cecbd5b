//! Tracing setup: console logging plus optional OpenTelemetry export.
//!
//! Console output always goes through a `fmt` layer filtered by `RUST_LOG` (default `info`).
//! With `enable_otel_export: true` in config, spans are also exported over OTLP/HTTP, configured
//! through the standard environment variables:
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` (default `http://localhost:4318`)
//! - `OTEL_EXPORTER_OTLP_PROTOCOL` (`http/protobuf` or `http/json`)
//! - `OTEL_EXPORTER_OTLP_HEADERS`, comma-separated `key=value` pairs; `%20` decodes to a space
//! - `OTEL_SERVICE_NAME` (default `classctl`)
//!
//! If the exporter cannot be built the service still starts with console logging only.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Kept so pending spans can be flushed on shutdown; the tracing layer only holds a tracer.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

const DEFAULT_SERVICE_NAME: &str = "classctl";

/// Install the global subscriber. Call once, before anything logs.
pub fn init_telemetry(enable_otel_export: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer());

    if !enable_otel_export {
        registry.try_init()?;
        info!("Telemetry initialized (OTLP export disabled)");
        return Ok(());
    }

    match create_otlp_tracer() {
        Ok(tracer) => {
            registry.with(tracing_opentelemetry::layer().with_tracer(tracer)).try_init()?;
            info!("Telemetry initialized with OTLP export enabled");
        }
        Err(e) => {
            registry.try_init()?;
            info!("Telemetry initialized without OTLP export: {}", e);
        }
    }

    Ok(())
}

/// Parse `OTEL_EXPORTER_OTLP_HEADERS`-style `key=value,key2=value2` lists
fn parse_otlp_headers(raw: &str) -> HashMap<String, String> {
    raw.replace("%20", " ")
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn otlp_protocol(raw: Option<&str>) -> Protocol {
    match raw {
        Some("http/json") => Protocol::HttpJson,
        _ => Protocol::HttpBinary,
    }
}

fn create_otlp_tracer() -> anyhow::Result<opentelemetry_sdk::trace::Tracer> {
    let service_name = std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string());
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| "http://localhost:4318".to_string());
    let headers = std::env::var("OTEL_EXPORTER_OTLP_HEADERS")
        .map(|raw| parse_otlp_headers(&raw))
        .unwrap_or_default();
    let protocol = otlp_protocol(std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL").ok().as_deref());

    // The subscriber isn't installed yet, so report to stderr directly
    eprintln!(
        "[OTLP] service={service_name} endpoint={endpoint} custom_headers={}",
        headers.len()
    );

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(&endpoint)
        .with_protocol(protocol)
        .with_headers(headers)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_attribute(KeyValue::new("service.name", service_name.clone()))
                .build(),
        )
        .build();

    let tracer = tracer_provider.tracer(service_name);
    let _ = TRACER_PROVIDER.set(tracer_provider);

    Ok(tracer)
}

/// Flush and stop the OTLP exporter, if one was started
pub fn shutdown_telemetry() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::error!("Failed to shutdown tracer provider: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_otlp_headers() {
        let headers = parse_otlp_headers("Authorization=Basic%20abc, x-team = school ,broken");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["Authorization"], "Basic abc");
        assert_eq!(headers["x-team"], "school");
    }

    #[test]
    fn test_protocol_defaults_to_protobuf() {
        assert!(matches!(otlp_protocol(None), Protocol::HttpBinary));
        assert!(matches!(otlp_protocol(Some("grpc")), Protocol::HttpBinary));
        assert!(matches!(otlp_protocol(Some("http/json")), Protocol::HttpJson));
    }
}
