use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::Level;
use tracing::warn;

const QUEUE_CAPACITY: usize = 256;

/// Fields lifted out of an event (or its spans) so the alert headline can name the
/// tenant and billing document it concerns.
const BILLING_KEYS: [&str; 4] = ["tenant_id", "invoice_number", "payment_id", "gateway"];

#[derive(Clone, Debug)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) message: Option<String>,
    pub(crate) billing_context: BTreeMap<String, String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) span_path: Vec<String>,
    /// Events dropped on a full queue since the previous delivered alert.
    pub(crate) dropped_before: u64,
}

impl AlertEvent {
    /// Moves billing identifiers out of `fields`; span fields only fill gaps.
    pub(crate) fn lift_billing_context(
        &mut self,
        span_fields: &BTreeMap<String, String>,
    ) {
        for key in BILLING_KEYS {
            if let Some(value) = self.fields.remove(key) {
                self.billing_context.insert(key.to_string(), value);
            } else if let Some(value) = span_fields.get(key) {
                self.billing_context
                    .entry(key.to_string())
                    .or_insert_with(|| value.clone());
            }
        }
    }
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &AlertEvent) -> Result<()>;
    fn sink_name(&self) -> &'static str;
}

/// Bounded hand-off between the tracing layer (sync) and the sinks (async).
#[derive(Clone)]
pub(crate) struct AlertQueue {
    tx: mpsc::Sender<AlertEvent>,
    dropped: Arc<AtomicU64>,
}

impl AlertQueue {
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                for sink in &sinks {
                    if let Err(err) = sink.deliver(&alert).await {
                        warn!(sink = sink.sink_name(), error = %err, "alert sink delivery failed");
                    }
                }
            }
        });

        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn push(&self, mut alert: AlertEvent) {
        alert.dropped_before = self.dropped.swap(0, Ordering::Relaxed);

        if let Err(err) = self.tx.try_send(alert) {
            let pending = match err {
                mpsc::error::TrySendError::Full(alert) | mpsc::error::TrySendError::Closed(alert) => {
                    alert.dropped_before
                }
            };
            self.dropped.fetch_add(pending + 1, Ordering::Relaxed);
        }
    }

    #[cfg(test)]
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) fn sample_alert(message: &str) -> AlertEvent {
    AlertEvent {
        level: Level::WARN,
        timestamp: Utc::now(),
        service_name: "billing".to_string(),
        environment: "staging".to_string(),
        component: "billing-backend".to_string(),
        target: "backend::usecases::webhooks".to_string(),
        message: Some(message.to_string()),
        billing_context: BTreeMap::new(),
        fields: BTreeMap::from([("orphan_webhook".to_string(), "true".to_string())]),
        span_path: vec![],
        dropped_before: 0,
    }
}
