use crate::config::{LogFormat, TelemetryConfig};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Handles kept alive for the lifetime of one invocation.
pub struct Telemetry {
    metrics: Option<PrometheusHandle>,
}

pub fn init(config: &TelemetryConfig) -> anyhow::Result<Telemetry> {
    // Initialize tracing
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    // A one-shot job is never scraped, so the recorder is rendered at shutdown instead
    let metrics = if config.metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    Ok(Telemetry { metrics })
}

impl Telemetry {
    pub fn shutdown(&self) {
        if let Some(handle) = &self.metrics {
            tracing::info!(metrics = %handle.render(), "Invocation metrics");
        }
        tracing::info!("Shutting down telemetry");
    }
}
