//! Logging initialization: a compact stdout layer filtered by `RUST_LOG`, plus an optional
//! OpenTelemetry exporter.
use std::env;

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variable holding the OTLP collector endpoint.
pub const OTLP_URL_ENVVAR: &str = "RELAY_INDEXER_OTLP_URL";

/// Environment variable holding a label appended to the service name, used to tell apart a
/// primary and a backup instance.
pub const SVC_LABEL_ENVVAR: &str = "RELAY_INDEXER_SVC_LABEL";

/// Set to `1` to include the source file in every event.
pub const LOG_FILE_ENVVAR: &str = "LOG_FILE";

/// Set to `1` to include the source line in every event.
pub const LOG_LINE_NUM_ENVVAR: &str = "LOG_LINE_NUM";

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Identifies this service in logs and traces.
    whoami: String,

    /// The OpenTelemetry URL for exporting traces.
    otel_url: Option<String>,

    with_file: bool,
    with_line_number: bool,
}

impl LoggerConfig {
    /// Creates a config for the service called `base`, labeled from [`SVC_LABEL_ENVVAR`] and
    /// exporting to [`OTLP_URL_ENVVAR`] if they are set.
    pub fn from_env(base: &str) -> Self {
        Self {
            whoami: whoami(base, env::var(SVC_LABEL_ENVVAR).ok()),
            otel_url: env::var(OTLP_URL_ENVVAR).ok(),
            with_file: flag(LOG_FILE_ENVVAR),
            with_line_number: flag(LOG_LINE_NUM_ENVVAR),
        }
    }

    /// Overrides the OTLP endpoint.
    pub fn with_otlp_url(self, url: impl Into<String>) -> Self {
        Self {
            otel_url: Some(url.into()),
            ..self
        }
    }

    /// The name this service reports itself as.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::from_env("relay-indexer")
    }
}

fn flag(var: &str) -> bool {
    env::var(var).is_ok_and(|v| v == "1")
}

fn whoami(base: &str, label: Option<String>) -> String {
    match label {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}

/// Installs the global subscriber.
///
/// # Panics
///
/// If the OTLP exporter cannot be built or a global subscriber was already installed.
pub fn init(config: LoggerConfig) {
    let stdout_sub = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(config.with_file)
                .with_line_number(config.with_line_number),
        )
        .with_filter(tracing_subscriber::EnvFilter::from_default_env());

    match &config.otel_url {
        Some(otel_url) => {
            let resource = Resource::builder()
                .with_attribute(KeyValue::new("service.name", config.whoami.clone()))
                .build();

            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(otel_url)
                .build()
                .expect("must be able to initialize exporter");

            let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                .with_resource(resource)
                .with_batch_exporter(exporter)
                .build();

            let otel_sub =
                tracing_opentelemetry::layer().with_tracer(provider.tracer("relay-indexer"));

            tracing_subscriber::registry()
                .with(stdout_sub)
                .with(otel_sub)
                .init();
        }
        None => tracing_subscriber::registry().with(stdout_sub).init(),
    }

    info!(whoami = %config.whoami, otlp = config.otel_url.is_some(), "logging started");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whoami_carries_label() {
        assert_eq!(whoami("relay-indexer", None), "relay-indexer");
        assert_eq!(
            whoami("relay-indexer", Some("backup".to_string())),
            "relay-indexer%backup"
        );
    }
}
