use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    entities::tenants::TenantEntity,
    value_objects::{
        enums::{
            billing_cycles::BillingCycle, gateways::GatewayKind,
            payment_method_types::PaymentMethodType,
        },
        money::Money,
    },
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,
    #[error("gateway transport failure: {0}")]
    Transport(String),
    #[error("gateway rejected request (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("gateway not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return GatewayError::Timeout;
        }
        if error.is_decode() {
            return GatewayError::MalformedResponse(error.to_string());
        }
        // Strip the URL: some gateways carry credentials in query strings.
        GatewayError::Transport(error.without_url().to_string())
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// How a gateway reports the outcome of `process_payment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// The response status is final and interpreted immediately.
    Synchronous,
    /// The charge is confirmed later through the gateway's webhook.
    AwaitingConfirmation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardSummary {
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<i32>,
    pub exp_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPaymentMethod {
    pub id: String,
    pub method_type: PaymentMethodType,
    pub card: Option<CardSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount: Money,
    pub payment_method_id: String,
    /// Invoice number, echoed back by webhooks.
    pub invoice_ref: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeResponse {
    pub id: String,
    pub status: Option<String>,
    pub charge_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentSucceeded,
    PaymentFailed,
    Other,
}

/// Gateway notification after signature verification and normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayWebhookEvent {
    pub event_type: String,
    pub kind: WebhookEventKind,
    pub related_payment_id: Option<String>,
    pub status: Option<String>,
    /// Invoice number (or invoice id) the gateway echoed back in its metadata.
    pub invoice_hint: Option<String>,
    pub failure_message: Option<String>,
    pub raw: Value,
}

/// Uniform surface over an external payment processor. Business logic picks one
/// instance per operation and never inspects which gateway it holds.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    fn capture_mode(&self) -> CaptureMode;

    async fn create_customer(&self, tenant: &TenantEntity) -> GatewayResult<String>;

    async fn create_payment_method(
        &self,
        token: &str,
        customer_id: &str,
    ) -> GatewayResult<RegisteredPaymentMethod>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_ref: &str,
        payment_method_id: &str,
        cycle: BillingCycle,
    ) -> GatewayResult<GatewaySubscription>;

    async fn process_payment(&self, request: ChargeRequest) -> GatewayResult<ChargeResponse>;

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<bool>;

    /// Verifies the signature before anything in the payload is trusted.
    fn handle_webhook(&self, payload: &[u8], signature: &str)
    -> GatewayResult<GatewayWebhookEvent>;
}

/// The configured gateway instances, selected by kind.
#[derive(Clone)]
pub struct PaymentGateways {
    stripe: Arc<dyn PaymentGateway>,
    asaas: Arc<dyn PaymentGateway>,
}

impl PaymentGateways {
    pub fn new(stripe: Arc<dyn PaymentGateway>, asaas: Arc<dyn PaymentGateway>) -> Self {
        Self { stripe, asaas }
    }

    pub fn get(&self, kind: GatewayKind) -> Arc<dyn PaymentGateway> {
        match kind {
            GatewayKind::Stripe => Arc::clone(&self.stripe),
            GatewayKind::Asaas => Arc::clone(&self.asaas),
        }
    }

    /// Card registration goes through the card processor for every country.
    pub fn card_registration(&self) -> Arc<dyn PaymentGateway> {
        Arc::clone(&self.stripe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_selects_by_kind() {
        let mut stripe = MockPaymentGateway::new();
        stripe.expect_kind().return_const(GatewayKind::Stripe);
        let mut asaas = MockPaymentGateway::new();
        asaas.expect_kind().return_const(GatewayKind::Asaas);

        let gateways = PaymentGateways::new(Arc::new(stripe), Arc::new(asaas));

        assert_eq!(gateways.get(GatewayKind::Asaas).kind(), GatewayKind::Asaas);
        assert_eq!(gateways.get(GatewayKind::Stripe).kind(), GatewayKind::Stripe);
        assert_eq!(gateways.card_registration().kind(), GatewayKind::Stripe);
    }
}
