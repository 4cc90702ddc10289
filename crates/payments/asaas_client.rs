use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use subtle::ConstantTimeEq;
use tracing::{error, info};

use crate::{
    domain::{
        entities::tenants::TenantEntity,
        value_objects::enums::{
            billing_cycles::BillingCycle, gateways::GatewayKind,
            payment_method_types::PaymentMethodType,
        },
    },
    payments::gateway::{
        CaptureMode, ChargeRequest, ChargeResponse, GatewayError, GatewayResult,
        GatewaySubscription, GatewayWebhookEvent, PaymentGateway, RegisteredPaymentMethod,
        WebhookEventKind,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsaasEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl AsaasEnvironment {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Some(AsaasEnvironment::Sandbox),
            "production" | "prod" => Some(AsaasEnvironment::Production),
            _ => None,
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            AsaasEnvironment::Sandbox => "https://sandbox.asaas.com/api/v3",
            AsaasEnvironment::Production => "https://www.asaas.com/api/v3",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AsaasConfig {
    pub api_key: String,
    pub environment: AsaasEnvironment,
    /// Shared token Asaas sends in the `asaas-access-token` header.
    pub webhook_token: String,
    pub timeout_secs: u64,
}

/// Regional invoicing processor. Card charges are confirmed asynchronously via webhook.
pub struct AsaasClient {
    http: reqwest::Client,
    config: AsaasConfig,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorEnvelope {
    #[serde(default)]
    errors: Vec<AsaasErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorDetail {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsaasResource {
    id: Option<String>,
    status: Option<String>,
}

impl AsaasClient {
    pub fn new(config: AsaasConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.environment.base_url(), path)
    }

    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> GatewayResult<reqwest::Response> {
        let resp = request
            .header("access_token", &self.config.api_key)
            .send()
            .await?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<AsaasErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.errors.into_iter().next());

        error!(
            status = %status,
            asaas_error_code = ?detail.as_ref().and_then(|d| d.code.clone()),
            context = %context,
            "asaas api request failed"
        );

        Err(GatewayError::Api {
            status: status.as_u16(),
            message: detail
                .and_then(|d| d.description)
                .unwrap_or_else(|| format!("{context} failed")),
        })
    }

    async fn post(&self, path: &str, body: Value, context: &str) -> GatewayResult<AsaasResource> {
        let resp = self
            .send_json(self.http.post(self.url(path)).json(&body), context)
            .await?;
        Ok(resp.json::<AsaasResource>().await?)
    }
}

fn require_id(resource: AsaasResource, context: &str) -> GatewayResult<(String, Option<String>)> {
    match resource.id {
        Some(id) if !id.is_empty() => Ok((id, resource.status)),
        _ => Err(GatewayError::MalformedResponse(format!(
            "asaas {context} response has no id"
        ))),
    }
}

pub(crate) fn charge_body(request: &ChargeRequest, customer_id: &str, due_date: &str) -> Value {
    let description = match request.invoice_ref.as_deref() {
        Some(invoice_ref) => format!("Invoice {invoice_ref}"),
        None => "Subscription payment".to_string(),
    };

    json!({
        "customer": customer_id,
        "billingType": "CREDIT_CARD",
        "value": request.amount.amount_minor as f64 / 100.0,
        "dueDate": due_date,
        "description": description,
        "externalReference": request.invoice_ref,
        "creditCardToken": request.payment_method_id,
    })
}

pub(crate) fn normalize_event(raw: Value) -> GatewayWebhookEvent {
    let event_type = raw
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let payment = raw.get("payment").cloned().unwrap_or(Value::Null);
    let field = |key: &str| {
        payment
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let kind = match event_type.as_str() {
        "PAYMENT_CONFIRMED" | "PAYMENT_RECEIVED" => WebhookEventKind::PaymentSucceeded,
        "PAYMENT_OVERDUE" | "PAYMENT_REFUSED" | "PAYMENT_CREDIT_CARD_CAPTURE_REFUSED" => {
            WebhookEventKind::PaymentFailed
        }
        _ => WebhookEventKind::Other,
    };

    let failure_message = match kind {
        WebhookEventKind::PaymentFailed => Some(format!("asaas event {event_type}")),
        _ => None,
    };

    GatewayWebhookEvent {
        related_payment_id: field("id"),
        status: field("status"),
        invoice_hint: field("externalReference"),
        event_type,
        kind,
        failure_message,
        raw,
    }
}

#[async_trait]
impl PaymentGateway for AsaasClient {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Asaas
    }

    fn capture_mode(&self) -> CaptureMode {
        CaptureMode::AwaitingConfirmation
    }

    async fn create_customer(&self, tenant: &TenantEntity) -> GatewayResult<String> {
        let body = json!({
            "name": tenant.name,
            "email": tenant.email,
            "phone": tenant.phone.clone().unwrap_or_default(),
            "externalReference": tenant.id.to_string(),
        });

        let resource = self.post("/customers", body, "create customer").await?;
        let (customer_id, _) = require_id(resource, "customer")?;
        info!(tenant_id = %tenant.id, %customer_id, "asaas: customer created");
        Ok(customer_id)
    }

    async fn create_payment_method(
        &self,
        token: &str,
        _customer_id: &str,
    ) -> GatewayResult<RegisteredPaymentMethod> {
        // Asaas binds card tokens to charges, so the frontend token is the reference.
        Ok(RegisteredPaymentMethod {
            id: token.to_string(),
            method_type: PaymentMethodType::Card,
            card: None,
        })
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_ref: &str,
        payment_method_id: &str,
        cycle: BillingCycle,
    ) -> GatewayResult<GatewaySubscription> {
        let body = json!({
            "customer": customer_id,
            "billingType": "CREDIT_CARD",
            "creditCardToken": payment_method_id,
            "nextDueDate": Utc::now().date_naive().to_string(),
            "cycle": match cycle {
                BillingCycle::Monthly => "MONTHLY",
                BillingCycle::Yearly => "YEARLY",
            },
            "description": format!("Subscription {plan_ref}"),
            "externalReference": plan_ref,
        });

        let resource = self
            .post("/subscriptions", body, "create subscription")
            .await?;
        let (id, status) = require_id(resource, "subscription")?;
        Ok(GatewaySubscription { id, status })
    }

    async fn process_payment(&self, request: ChargeRequest) -> GatewayResult<ChargeResponse> {
        let Some(customer_id) = request.customer_id.as_deref() else {
            return Err(GatewayError::Api {
                status: 400,
                message: "asaas charges require a customer id".to_string(),
            });
        };

        let due_date = Utc::now().date_naive().to_string();
        let body = charge_body(&request, customer_id, &due_date);
        let resource = self.post("/payments", body, "create payment").await?;
        let (id, status) = require_id(resource, "payment")?;

        info!(payment_ref = %id, status = ?status, "asaas: charge created");
        Ok(ChargeResponse {
            id,
            status,
            charge_id: None,
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<bool> {
        let resp = self
            .send_json(
                self.http
                    .delete(self.url(&format!("/subscriptions/{subscription_id}"))),
                "cancel subscription",
            )
            .await?;

        #[derive(Deserialize)]
        struct DeletedResp {
            #[serde(default = "deleted_default")]
            deleted: bool,
        }

        fn deleted_default() -> bool {
            true
        }

        let parsed: DeletedResp = resp.json().await?;
        Ok(parsed.deleted)
    }

    fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> GatewayResult<GatewayWebhookEvent> {
        let expected = self.config.webhook_token.as_bytes();
        if expected.is_empty() || !bool::from(expected.ct_eq(signature.trim().as_bytes())) {
            return Err(GatewayError::InvalidSignature);
        }

        let raw: Value = serde_json::from_slice(payload)
            .map_err(|err| GatewayError::MalformedResponse(format!("asaas event: {err}")))?;
        Ok(normalize_event(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{enums::currencies::Currency, money::Money};

    fn client(webhook_token: &str) -> AsaasClient {
        AsaasClient::new(AsaasConfig {
            api_key: "aact_test".to_string(),
            environment: AsaasEnvironment::Sandbox,
            webhook_token: webhook_token.to_string(),
            timeout_secs: 10,
        })
        .unwrap()
    }

    const CONFIRMED: &str = r#"{
        "event": "PAYMENT_CONFIRMED",
        "payment": { "id": "pay_777", "status": "CONFIRMED", "externalReference": "INV-2026-0010" }
    }"#;

    #[test]
    fn environment_selects_base_url() {
        assert_eq!(
            AsaasEnvironment::from_str("sandbox").unwrap().base_url(),
            "https://sandbox.asaas.com/api/v3"
        );
        assert_eq!(
            AsaasEnvironment::from_str("production").unwrap().base_url(),
            "https://www.asaas.com/api/v3"
        );
        assert_eq!(AsaasEnvironment::from_str("staging"), None);
    }

    #[test]
    fn webhook_requires_matching_token() {
        let client = client("hook-secret");

        let event = client
            .handle_webhook(CONFIRMED.as_bytes(), "hook-secret")
            .unwrap();
        assert_eq!(event.kind, WebhookEventKind::PaymentSucceeded);
        assert_eq!(event.related_payment_id.as_deref(), Some("pay_777"));
        assert_eq!(event.invoice_hint.as_deref(), Some("INV-2026-0010"));

        assert!(matches!(
            client.handle_webhook(CONFIRMED.as_bytes(), "wrong"),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn near_miss_and_prefix_tokens_are_rejected() {
        let client = client("hook-secret");
        for token in ["hook-secreT", "hook-secret-2", "hook", " hook-secre "] {
            assert!(
                matches!(
                    client.handle_webhook(CONFIRMED.as_bytes(), token),
                    Err(GatewayError::InvalidSignature)
                ),
                "token {token:?} was accepted"
            );
        }
        assert!(client.handle_webhook(CONFIRMED.as_bytes(), " hook-secret\n").is_ok());
    }

    #[test]
    fn empty_configured_token_rejects_everything() {
        let client = client("");
        assert!(matches!(
            client.handle_webhook(CONFIRMED.as_bytes(), ""),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn overdue_event_maps_to_failure() {
        let event = normalize_event(serde_json::json!({
            "event": "PAYMENT_OVERDUE",
            "payment": { "id": "pay_1", "status": "OVERDUE" }
        }));
        assert_eq!(event.kind, WebhookEventKind::PaymentFailed);
        assert_eq!(event.invoice_hint, None);
    }

    #[test]
    fn charge_body_carries_decimal_value_and_reference() {
        let body = charge_body(
            &ChargeRequest {
                amount: Money::new(19_700, Currency::Brl),
                payment_method_id: "tok_1".to_string(),
                invoice_ref: Some("INV-2026-0002".to_string()),
                customer_id: Some("cus_1".to_string()),
            },
            "cus_1",
            "2026-10-18",
        );

        assert_eq!(body["value"], serde_json::json!(197.0));
        assert_eq!(body["externalReference"], "INV-2026-0002");
        assert_eq!(body["creditCardToken"], "tok_1");
        assert_eq!(body["billingType"], "CREDIT_CARD");
    }
}
