use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    domain::{
        entities::tenants::TenantEntity,
        value_objects::enums::{
            billing_cycles::BillingCycle, gateways::GatewayKind,
            payment_method_types::PaymentMethodType,
        },
    },
    payments::gateway::{
        CaptureMode, CardSummary, ChargeRequest, ChargeResponse, GatewayError, GatewayResult,
        GatewaySubscription, GatewayWebhookEvent, PaymentGateway, RegisteredPaymentMethod,
        WebhookEventKind,
    },
};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub timeout_secs: u64,
    /// Maximum age of a signed webhook timestamp.
    pub webhook_tolerance_secs: i64,
}

/// Card processor client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCard {
    brand: Option<String>,
    last4: Option<String>,
    exp_month: Option<i32>,
    exp_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentMethod {
    id: String,
    #[serde(rename = "type")]
    type_: Option<String>,
    card: Option<StripeCard>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    status: Option<String>,
    latest_charge: Option<Value>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn form_request(&self, path: &str, body: &[(String, String)]) -> reqwest::RequestBuilder {
        self.http
            .post(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
    }

    async fn post_form(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> GatewayResult<reqwest::Response> {
        let resp = self.form_request(path, body).send().await?;
        Self::ensure_success(resp, context).await
    }

    /// Retried or concurrent creates for one tenant collapse into a single Stripe customer.
    fn customer_request(&self, tenant: &TenantEntity) -> reqwest::RequestBuilder {
        // https://stripe.com/docs/api/customers/create
        let body = vec![
            ("email".to_string(), tenant.email.clone()),
            ("name".to_string(), tenant.name.clone()),
            ("metadata[tenant_id]".to_string(), tenant.id.to_string()),
            ("metadata[tenant_slug]".to_string(), tenant.slug.clone()),
        ];

        self.form_request("/v1/customers", &body)
            .header(IDEMPOTENCY_KEY, customer_idempotency_key(tenant.id))
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> GatewayResult<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = resp.text().await.unwrap_or_default();
        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.clone()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.clone()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.clone()),
            context = %context,
            "stripe api request failed"
        );

        let message = details
            .and_then(|d| d.message)
            .unwrap_or_else(|| format!("{context} failed"));

        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Checks the `stripe-signature` header (`t=...,v1=...`) against the raw body.
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> GatewayResult<StripeEvent> {
        verify_signature(
            &self.config.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
            self.config.webhook_tolerance_secs,
        )?;

        serde_json::from_slice(payload)
            .map_err(|err| GatewayError::MalformedResponse(format!("stripe event: {err}")))
    }
}

pub(crate) fn verify_signature(
    webhook_secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
    tolerance_secs: i64,
) -> GatewayResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or(GatewayError::InvalidSignature)?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| GatewayError::InvalidSignature)?;
    if (now - signed_at).abs() > tolerance_secs {
        return Err(GatewayError::InvalidSignature);
    }

    let mut signed_payload = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed_payload.extend_from_slice(timestamp.as_bytes());
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(payload);

    for signature in signatures {
        let Ok(provided) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
            .map_err(|_| GatewayError::NotConfigured("stripe webhook secret".to_string()))?;
        mac.update(&signed_payload);
        // verify_slice compares in constant time.
        if mac.verify_slice(&provided).is_ok() {
            return Ok(());
        }
    }

    Err(GatewayError::InvalidSignature)
}

pub(crate) fn customer_idempotency_key(tenant_id: Uuid) -> String {
    format!("customer-{tenant_id}")
}

pub(crate) fn payment_intent_form(request: &ChargeRequest) -> Vec<(String, String)> {
    let mut body = vec![
        ("amount".to_string(), request.amount.amount_minor.to_string()),
        ("currency".to_string(), request.amount.currency.lowercase()),
        ("payment_method".to_string(), request.payment_method_id.clone()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("confirm".to_string(), "true".to_string()),
    ];

    if let Some(customer_id) = request.customer_id.as_ref() {
        body.push(("customer".to_string(), customer_id.clone()));
    }

    if let Some(invoice_ref) = request.invoice_ref.as_ref() {
        body.push(("metadata[invoice_number]".to_string(), invoice_ref.clone()));
        body.push(("description".to_string(), format!("Invoice {invoice_ref}")));
    }

    body
}

fn metadata_str(object: &Value, key: &str) -> Option<String> {
    object
        .get("metadata")
        .and_then(|metadata| metadata.get(key))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn normalize_event(event: StripeEvent, raw: Value) -> GatewayWebhookEvent {
    let object = &event.data.object;

    let kind = match event.type_.as_str() {
        "payment_intent.succeeded" => WebhookEventKind::PaymentSucceeded,
        "payment_intent.payment_failed" => WebhookEventKind::PaymentFailed,
        _ => WebhookEventKind::Other,
    };

    let invoice_hint =
        metadata_str(object, "invoice_number").or_else(|| metadata_str(object, "invoice_id"));

    let failure_message = object
        .get("last_payment_error")
        .and_then(|err| err.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string);

    GatewayWebhookEvent {
        related_payment_id: object.get("id").and_then(Value::as_str).map(str::to_string),
        status: object
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string),
        event_type: event.type_,
        kind,
        invoice_hint,
        failure_message,
        raw,
    }
}

fn charge_id(latest_charge: Option<Value>) -> Option<String> {
    match latest_charge? {
        Value::String(id) => Some(id),
        Value::Object(object) => object.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Stripe
    }

    fn capture_mode(&self) -> CaptureMode {
        CaptureMode::Synchronous
    }

    async fn create_customer(&self, tenant: &TenantEntity) -> GatewayResult<String> {
        let resp = self.customer_request(tenant).send().await?;
        let resp = Self::ensure_success(resp, "create customer").await?;

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = resp.json().await?;
        info!(tenant_id = %tenant.id, customer_id = %parsed.id, "stripe: customer created");
        Ok(parsed.id)
    }

    async fn create_payment_method(
        &self,
        token: &str,
        customer_id: &str,
    ) -> GatewayResult<RegisteredPaymentMethod> {
        // https://stripe.com/docs/api/payment_methods/attach
        let body = vec![("customer".to_string(), customer_id.to_string())];
        let resp = self
            .post_form(
                &format!("/v1/payment_methods/{token}/attach"),
                &body,
                "attach payment method",
            )
            .await?;

        let parsed: StripePaymentMethod = resp.json().await?;
        let method_type = parsed
            .type_
            .as_deref()
            .and_then(PaymentMethodType::from_str)
            .unwrap_or(PaymentMethodType::Card);

        Ok(RegisteredPaymentMethod {
            id: parsed.id,
            method_type,
            card: parsed.card.map(|card| CardSummary {
                brand: card.brand,
                last4: card.last4,
                exp_month: card.exp_month,
                exp_year: card.exp_year,
            }),
        })
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_ref: &str,
        payment_method_id: &str,
        cycle: BillingCycle,
    ) -> GatewayResult<GatewaySubscription> {
        // https://stripe.com/docs/api/subscriptions/create
        let body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), plan_ref.to_string()),
            (
                "default_payment_method".to_string(),
                payment_method_id.to_string(),
            ),
            ("metadata[billing_cycle]".to_string(), cycle.to_string()),
        ];

        let resp = self
            .post_form("/v1/subscriptions", &body, "create subscription")
            .await?;

        #[derive(Deserialize)]
        struct SubscriptionResp {
            id: String,
            status: Option<String>,
        }

        let parsed: SubscriptionResp = resp.json().await?;
        Ok(GatewaySubscription {
            id: parsed.id,
            status: parsed.status,
        })
    }

    async fn process_payment(&self, request: ChargeRequest) -> GatewayResult<ChargeResponse> {
        // https://stripe.com/docs/api/payment_intents/create
        let body = payment_intent_form(&request);
        let resp = self
            .post_form("/v1/payment_intents", &body, "create payment intent")
            .await?;

        let intent: StripePaymentIntent = resp.json().await?;
        Ok(ChargeResponse {
            id: intent.id,
            status: intent.status,
            charge_id: charge_id(intent.latest_charge),
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<bool> {
        // https://stripe.com/docs/api/subscriptions/cancel#cancel_subscription-at_period_end
        let body = vec![("cancel_at_period_end".to_string(), "true".to_string())];
        self.post_form(
            &format!("/v1/subscriptions/{subscription_id}"),
            &body,
            "cancel subscription",
        )
        .await?;

        Ok(true)
    }

    fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> GatewayResult<GatewayWebhookEvent> {
        let event = self.verify_webhook_signature(payload, signature)?;
        let raw: Value = serde_json::from_slice(payload)
            .map_err(|err| GatewayError::MalformedResponse(format!("stripe event: {err}")))?;
        Ok(normalize_event(event, raw))
    }
}
