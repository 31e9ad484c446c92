//! Process-wide log and span setup.
//!
//! [`init_tracing`] installs one `tracing` subscriber for the pipeline:
//! an [`EnvFilter`], a console formatter and, when a collector is
//! configured, an OpenTelemetry layer exporting spans over OTLP/HTTP.
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Filter directives, default `info`. |
//! | `FIELDSENSE_LOG_FORMAT` | `json` for one JSON object per line, anything else for compact text. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | Collector base URL, e.g. `http://localhost:4318`. |
//!
//! ```rust,no_run
//! let _guard = fieldsense_runtime::telemetry::init_tracing("fieldsense");
//! ```

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FORMAT_VAR: &str = "FIELDSENSE_LOG_FORMAT";
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const DEFAULT_FILTER: &str = "info";

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; every other value falls back to text.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }

    fn from_env() -> Self {
        std::env::var(LOG_FORMAT_VAR)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

/// What [`init_tracing_with`] installs.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub service_name: String,
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset or unparsable.
    pub default_filter: String,
    pub otlp_endpoint: Option<String>,
}

impl TelemetryOptions {
    pub fn from_env(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            format: LogFormat::from_env(),
            default_filter: DEFAULT_FILTER.to_string(),
            otlp_endpoint: std::env::var(OTLP_ENDPOINT_VAR).ok().filter(|v| !v.is_empty()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Installation
// ─────────────────────────────────────────────────────────────────────────────

/// [`init_tracing_with`] using options read from the environment.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    init_tracing_with(&TelemetryOptions::from_env(service_name))
}

/// Install the global subscriber described by `options`.
///
/// Only the first call in a process installs anything; later calls log at
/// debug and still hand back a guard for their own exporter, if any.
/// Hold the returned guard until shutdown so buffered spans get flushed.
pub fn init_tracing_with(options: &TelemetryOptions) -> TracerProviderGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.default_filter));
    let provider = options
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(&options.service_name, endpoint));

    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(options.service_name.clone())));
    let (json, compact) = match options.format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Compact => (None, Some(fmt::layer().compact())),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(otel)
        .with(json)
        .with(compact)
        .try_init();
    match installed {
        Ok(()) => tracing::debug!(
            service = %options.service_name,
            format = ?options.format,
            otlp = provider.is_some(),
            "telemetry initialised"
        ),
        Err(e) => tracing::debug!(error = %e, "tracing subscriber already installed"),
    }

    TracerProviderGuard(provider)
}

/// Shuts the span exporter down on drop, flushing what it still holds.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    pub fn exports_spans(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[fieldsense] span exporter shutdown failed: {e}");
            }
        }
    }
}

fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            // The subscriber is not up yet, so this cannot go through tracing.
            eprintln!("[fieldsense] OTLP exporter for {endpoint} unavailable: {e}");
            return None;
        }
    };

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new("service.namespace", "fieldsense"))
        .build();

    // Simple export: the CLI installs this before any tokio runtime exists.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(endpoint: Option<&str>) -> TelemetryOptions {
        TelemetryOptions {
            service_name: "fieldsense-test".into(),
            format: LogFormat::Compact,
            default_filter: "warn".into(),
            otlp_endpoint: endpoint.map(str::to_string),
        }
    }

    #[test]
    fn log_format_accepts_only_json() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Compact);
        assert_eq!(LogFormat::parse(""), LogFormat::Compact);
    }

    #[test]
    fn no_exporter_without_endpoint() {
        let guard = init_tracing_with(&options(None));
        assert!(!guard.exports_spans());
    }

    #[test]
    fn second_initialisation_is_harmless() {
        let first = init_tracing_with(&options(None));
        let second = init_tracing("fieldsense-test");
        drop(second);
        drop(first);
    }
}
