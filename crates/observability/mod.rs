mod alerts;
mod config;
mod layer;
mod webhook;

use anyhow::Result;
use alerts::AlertQueue;
use config::ObservabilityConfig;
use layer::AlertLayer;
use std::sync::Arc;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use webhook::AlertWebhookSink;

/// Installs the fmt subscriber plus the optional alert webhook sink.
/// Must be called from inside a tokio runtime when alerts are configured.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.alert_webhook.as_ref() {
        Some(alert) => {
            let sink = AlertWebhookSink::new(alert.webhook_url.clone())?;
            let queue = AlertQueue::spawn(vec![Arc::new(sink)]);

            Some(
                AlertLayer::new(queue, config.service_context.clone(), alert.min_level).with_filter(
                    tracing_subscriber::filter::LevelFilter::from_level(alert.min_level),
                ),
            )
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "Observability config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        alerts_enabled = config.alert_webhook.is_some(),
        "observability initialized"
    );

    Ok(())
}
