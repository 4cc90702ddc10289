use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct AlertWebhookConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alert_webhook: Option<AlertWebhookConfig>,
    /// Parse problems, logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        let component = component.trim().to_string();

        let service_name = env_string("SERVICE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = env_string("STAGE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let (alert_webhook, warnings) = alert_webhook_from_env();

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            alert_webhook,
            warnings,
        }
    }
}

fn alert_webhook_from_env() -> (Option<AlertWebhookConfig>, Vec<String>) {
    let mut warnings = Vec::new();

    if !env_bool("BILLING_ALERT_ENABLED").unwrap_or(true) {
        return (None, warnings);
    }

    let Some(raw_url) = env_string("BILLING_ALERT_WEBHOOK_URL").filter(|v| !v.is_empty()) else {
        return (None, warnings);
    };

    let webhook_url = match Url::parse(&raw_url) {
        Ok(url) => url,
        Err(err) => {
            // The URL itself embeds a secret, so only the parse error is reported.
            warnings.push(format!(
                "BILLING_ALERT_WEBHOOK_URL is set but invalid; alerts disabled (parse error: {err})"
            ));
            return (None, warnings);
        }
    };

    let min_level = match env_string("BILLING_ALERT_LEVEL") {
        Some(raw) if !raw.trim().is_empty() => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "BILLING_ALERT_LEVEL is invalid (value: {raw}); defaulting to WARN"
            ));
            Level::WARN
        }),
        _ => Level::WARN,
    };

    (
        Some(AlertWebhookConfig {
            webhook_url,
            min_level,
        }),
        warnings,
    )
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
