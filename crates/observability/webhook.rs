use super::alerts::{AlertEvent, AlertSink};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use url::Url;

/// Posts alerts to a chat webhook that accepts `{"content": "..."}`.
pub(crate) struct AlertWebhookSink {
    webhook_url: Url,
    client: Client,
}

impl AlertWebhookSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(3))
            .build()?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn format_content(alert: &AlertEvent) -> String {
    let mut lines = vec![format!(
        "**{}** `{}` `{}` `{}` {}",
        alert.service_name,
        alert.environment,
        alert.component,
        alert.level.as_str(),
        alert.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
    )];

    if !alert.billing_context.is_empty() {
        let context = alert
            .billing_context
            .iter()
            .map(|(key, value)| format!("{key}=`{value}`"))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(context);
    }

    if let Some(message) = alert.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        lines.push(format!("> {message}"));
    }

    let origin = if alert.span_path.is_empty() {
        alert.target.clone()
    } else {
        format!("{} in {}", alert.target, alert.span_path.join(" > "))
    };
    lines.push(format!("from `{origin}`"));

    lines.extend(
        alert
            .fields
            .iter()
            .map(|(key, value)| format!("- `{key}` = `{value}`")),
    );

    if alert.dropped_before > 0 {
        lines.push(format!(
            "_{} earlier alert(s) dropped on a full queue_",
            alert.dropped_before
        ));
    }

    truncate(lines.join("\n"))
}

#[async_trait]
impl AlertSink for AlertWebhookSink {
    async fn deliver(&self, alert: &AlertEvent) -> Result<()> {
        let content = format_content(alert);

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn sink_name(&self) -> &'static str {
        "alert_webhook"
    }
}

fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("alert webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("alert webhook connection failed");
    }
    anyhow!("alert webhook request failed")
}

fn truncate(content: String) -> String {
    const LIMIT: usize = 2000;
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= LIMIT {
        return content;
    }

    let allowed = LIMIT.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}
