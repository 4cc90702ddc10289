use std::sync::Arc;

use crates::{
    domain::{
        entities::payments::PaymentEntity,
        repositories::{invoices::InvoiceRepository, payments::PaymentRepository},
        value_objects::enums::gateways::GatewayKind,
    },
    payments::gateway::{GatewayError, GatewayWebhookEvent, PaymentGateways, WebhookEventKind},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    errors::{BillingError, UseCaseResult},
    payments::PaymentProcessor,
};

const DEFAULT_FAILURE_REASON: &str = "gateway reported the payment as failed";

/// Applies verified gateway notifications to local payments. Unmatched events are dropped
/// so the gateway does not keep re-delivering them.
pub struct WebhookReconciler {
    payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
    invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
    payments: Arc<PaymentProcessor>,
    gateways: PaymentGateways,
}

impl WebhookReconciler {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
        invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
        payments: Arc<PaymentProcessor>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            payment_repo,
            invoice_repo,
            payments,
            gateways,
        }
    }

    pub async fn handle_inbound_event(
        &self,
        gateway: GatewayKind,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<()> {
        let event = match self.gateways.get(gateway).handle_webhook(payload, signature) {
            Ok(event) => event,
            Err(GatewayError::InvalidSignature) => {
                warn!(%gateway, "webhooks: signature verification failed");
                return Err(BillingError::InvalidSignature);
            }
            // Only a bad signature fails the delivery.
            Err(err) => {
                warn!(
                    orphan_webhook = true,
                    %gateway,
                    error = %err,
                    payload_bytes = payload.len(),
                    "webhooks: authenticated payload could not be parsed, dropping"
                );
                return Ok(());
            }
        };

        info!(
            %gateway,
            event_type = %event.event_type,
            gateway_payment_id = ?event.related_payment_id,
            "webhooks: event received"
        );

        if event.kind == WebhookEventKind::Other {
            debug!(%gateway, event_type = %event.event_type, "webhooks: event ignored");
            return Ok(());
        }

        let Some(payment) = self.locate_payment(&event).await? else {
            warn!(
                orphan_webhook = true,
                %gateway,
                event_type = %event.event_type,
                gateway_payment_id = ?event.related_payment_id,
                invoice_hint = ?event.invoice_hint,
                "webhooks: no local payment matches event, dropping"
            );
            return Ok(());
        };

        match event.kind {
            WebhookEventKind::PaymentSucceeded => {
                self.payments
                    .mark_payment_succeeded(payment.id, event.related_payment_id, None)
                    .await?;
            }
            WebhookEventKind::PaymentFailed => {
                let reason = event
                    .failure_message
                    .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
                self.payments
                    .mark_payment_failed(payment.id, event.related_payment_id, reason)
                    .await?;
            }
            WebhookEventKind::Other => {}
        }

        Ok(())
    }

    /// Stored gateway payment id first, then the invoice hint echoed in the gateway metadata.
    async fn locate_payment(&self, event: &GatewayWebhookEvent) -> UseCaseResult<Option<PaymentEntity>> {
        if let Some(gateway_payment_id) = event.related_payment_id.as_ref() {
            if let Some(payment) = self
                .payment_repo
                .find_by_gateway_payment_id(gateway_payment_id.clone())
                .await?
            {
                return Ok(Some(payment));
            }
        }

        let Some(hint) = event
            .invoice_hint
            .as_deref()
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
        else {
            return Ok(None);
        };

        let invoice = match Uuid::parse_str(hint) {
            Ok(invoice_id) => self.invoice_repo.find_by_id(invoice_id).await?,
            Err(_) => {
                self.invoice_repo
                    .find_by_invoice_number(hint.to_string())
                    .await?
            }
        };

        let Some(invoice) = invoice else {
            return Ok(None);
        };

        debug!(
            invoice_number = %invoice.invoice_number,
            "webhooks: resolving payment through invoice hint"
        );
        Ok(self.payment_repo.find_latest_for_invoice(invoice.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_fixtures::{sample_invoice, sample_payment};
    use crates::{
        domain::{
            repositories::{
                invoices::MockInvoiceRepository, payment_methods::MockPaymentMethodRepository,
                payments::MockPaymentRepository, subscriptions::MockSubscriptionRepository,
                tenants::MockTenantRepository,
            },
            value_objects::payments::PaymentTransition,
        },
        payments::gateway::MockPaymentGateway,
    };
    use mockall::predicate::eq;
    use serde_json::json;

    fn event(kind: WebhookEventKind, payment_id: Option<&str>, hint: Option<&str>) -> GatewayWebhookEvent {
        GatewayWebhookEvent {
            event_type: "payment_intent.succeeded".to_string(),
            kind,
            related_payment_id: payment_id.map(str::to_string),
            status: Some("succeeded".to_string()),
            invoice_hint: hint.map(str::to_string),
            failure_message: None,
            raw: json!({}),
        }
    }

    fn gateway_emitting(result: Result<GatewayWebhookEvent, GatewayError>) -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        let mut result = Some(result);
        gateway
            .expect_handle_webhook()
            .times(1)
            .returning(move |_, _| result.take().unwrap_or(Err(GatewayError::InvalidSignature)));
        gateway
    }

    fn reconciler(
        payment_repo: MockPaymentRepository,
        invoice_repo: MockInvoiceRepository,
        stripe: MockPaymentGateway,
    ) -> WebhookReconciler {
        let payment_repo: Arc<dyn PaymentRepository + Send + Sync> = Arc::new(payment_repo);
        let invoice_repo: Arc<dyn InvoiceRepository + Send + Sync> = Arc::new(invoice_repo);
        let gateways = PaymentGateways::new(Arc::new(stripe), Arc::new(MockPaymentGateway::new()));
        let payments = Arc::new(PaymentProcessor::new(
            Arc::clone(&payment_repo),
            Arc::new(MockPaymentMethodRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(MockTenantRepository::new()),
            Arc::clone(&invoice_repo),
            gateways.clone(),
        ));
        WebhookReconciler::new(payment_repo, invoice_repo, payments, gateways)
    }

    #[tokio::test]
    async fn invalid_signature_is_surfaced() {
        let result = reconciler(
            MockPaymentRepository::new(),
            MockInvoiceRepository::new(),
            gateway_emitting(Err(GatewayError::InvalidSignature)),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"{}", "t=1,v1=bad")
        .await;

        assert!(matches!(result, Err(BillingError::InvalidSignature)));
    }

    #[tokio::test]
    async fn unparsable_authenticated_payload_is_acknowledged() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_gateway_payment_id().times(0);
        payment_repo.expect_apply_success().times(0);
        payment_repo.expect_apply_failure().times(0);

        let result = reconciler(
            payment_repo,
            MockInvoiceRepository::new(),
            gateway_emitting(Err(GatewayError::MalformedResponse(
                "asaas event: expected value at line 1 column 1".to_string(),
            ))),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"<html>ping</html>", "tok")
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn orphan_event_completes_without_mutation() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_by_gateway_payment_id()
            .with(eq("pi_unknown".to_string()))
            .returning(|_| Ok(None));
        payment_repo.expect_apply_success().times(0);
        payment_repo.expect_apply_failure().times(0);

        let result = reconciler(
            payment_repo,
            MockInvoiceRepository::new(),
            gateway_emitting(Ok(event(
                WebhookEventKind::PaymentSucceeded,
                Some("pi_unknown"),
                None,
            ))),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unresolvable_invoice_hint_is_dropped() {
        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_by_gateway_payment_id()
            .returning(|_| Ok(None));
        payment_repo.expect_apply_success().times(0);

        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_by_invoice_number()
            .with(eq("INV-2026-0999".to_string()))
            .returning(|_| Ok(None));

        let result = reconciler(
            payment_repo,
            invoice_repo,
            gateway_emitting(Ok(event(
                WebhookEventKind::PaymentSucceeded,
                Some("pi_unknown"),
                Some("INV-2026-0999"),
            ))),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn success_is_applied_to_the_matching_payment() {
        let invoice = sample_invoice(Uuid::new_v4(), None);
        let payment = sample_payment(&invoice, "processing");
        let payment_id = payment.id;

        let mut payment_repo = MockPaymentRepository::new();
        let found = payment.clone();
        payment_repo
            .expect_find_by_gateway_payment_id()
            .returning(move |_| Ok(Some(found.clone())));
        payment_repo
            .expect_apply_success()
            .with(eq(payment_id), eq(Some("pi_1".to_string())), eq(None))
            .times(1)
            .returning(move |_, _, _| {
                let mut succeeded = payment.clone();
                succeeded.status = "succeeded".to_string();
                Ok(PaymentTransition::Applied(succeeded))
            });

        reconciler(
            payment_repo,
            MockInvoiceRepository::new(),
            gateway_emitting(Ok(event(WebhookEventKind::PaymentSucceeded, Some("pi_1"), None))),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn invoice_hint_falls_back_to_the_latest_payment() {
        let invoice = sample_invoice(Uuid::new_v4(), None);
        let invoice_id = invoice.id;
        let payment = sample_payment(&invoice, "processing");
        let payment_id = payment.id;

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_by_gateway_payment_id()
            .returning(|_| Ok(None));
        let latest = payment.clone();
        payment_repo
            .expect_find_latest_for_invoice()
            .with(eq(invoice_id))
            .returning(move |_| Ok(Some(latest.clone())));
        payment_repo
            .expect_apply_success()
            .with(eq(payment_id), eq(Some("pay_asaas".to_string())), eq(None))
            .times(1)
            .returning(move |_, _, _| Ok(PaymentTransition::Applied(payment.clone())));

        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_by_invoice_number()
            .with(eq("INV-2026-0007".to_string()))
            .returning(move |_| Ok(Some(invoice.clone())));

        reconciler(
            payment_repo,
            invoice_repo,
            gateway_emitting(Ok(event(
                WebhookEventKind::PaymentSucceeded,
                Some("pay_asaas"),
                Some("INV-2026-0007"),
            ))),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn invoice_id_hint_is_looked_up_by_id() {
        let invoice = sample_invoice(Uuid::new_v4(), None);
        let invoice_id = invoice.id;

        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_by_id()
            .with(eq(invoice_id))
            .returning(move |_| Ok(Some(invoice.clone())));
        invoice_repo.expect_find_by_invoice_number().times(0);

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_latest_for_invoice()
            .returning(|_| Ok(None));

        let hint = invoice_id.to_string();
        reconciler(
            payment_repo,
            invoice_repo,
            gateway_emitting(Ok(event(WebhookEventKind::PaymentSucceeded, None, Some(&hint)))),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn duplicate_delivery_is_absorbed() {
        let invoice = sample_invoice(Uuid::new_v4(), None);
        let payment = sample_payment(&invoice, "succeeded");

        let mut payment_repo = MockPaymentRepository::new();
        let found = payment.clone();
        payment_repo
            .expect_find_by_gateway_payment_id()
            .returning(move |_| Ok(Some(found.clone())));
        payment_repo
            .expect_apply_success()
            .times(1)
            .returning(move |_, _, _| Ok(PaymentTransition::AlreadyTerminal(payment.clone())));

        let result = reconciler(
            payment_repo,
            MockInvoiceRepository::new(),
            gateway_emitting(Ok(event(WebhookEventKind::PaymentSucceeded, Some("pi_1"), None))),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn failure_event_records_the_gateway_message() {
        let invoice = sample_invoice(Uuid::new_v4(), None);
        let payment = sample_payment(&invoice, "processing");
        let payment_id = payment.id;

        let mut failed_event = event(WebhookEventKind::PaymentFailed, Some("pi_2"), None);
        failed_event.failure_message = Some("Your card was declined.".to_string());

        let mut payment_repo = MockPaymentRepository::new();
        let found = payment.clone();
        payment_repo
            .expect_find_by_gateway_payment_id()
            .returning(move |_| Ok(Some(found.clone())));
        payment_repo
            .expect_apply_failure()
            .with(
                eq(payment_id),
                eq(Some("pi_2".to_string())),
                eq("Your card was declined.".to_string()),
            )
            .times(1)
            .returning(move |_, _, _| Ok(PaymentTransition::Applied(payment.clone())));

        reconciler(payment_repo, MockInvoiceRepository::new(), gateway_emitting(Ok(failed_event)))
            .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn late_success_for_a_declined_charge_finds_the_failed_payment() {
        let invoice = sample_invoice(Uuid::new_v4(), None);
        let mut failed = sample_payment(&invoice, "failed");
        failed.gateway_payment_id = Some("pi_456".to_string());
        let failed_id = failed.id;

        let mut payment_repo = MockPaymentRepository::new();
        let found = failed.clone();
        payment_repo
            .expect_find_by_gateway_payment_id()
            .with(eq("pi_456".to_string()))
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        payment_repo.expect_find_latest_for_invoice().times(0);
        payment_repo
            .expect_apply_success()
            .with(eq(failed_id), eq(Some("pi_456".to_string())), eq(None::<String>))
            .times(1)
            .returning(move |_, _, _| Ok(PaymentTransition::AlreadyTerminal(failed.clone())));

        let result = reconciler(
            payment_repo,
            MockInvoiceRepository::new(),
            gateway_emitting(Ok(event(
                WebhookEventKind::PaymentSucceeded,
                Some("pi_456"),
                Some("INV-2026-0007"),
            ))),
        )
        .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unrelated_events_are_acknowledged() {
        let mut other = event(WebhookEventKind::Other, Some("cus_1"), None);
        other.event_type = "customer.created".to_string();

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_find_by_gateway_payment_id().times(0);

        reconciler(payment_repo, MockInvoiceRepository::new(), gateway_emitting(Ok(other)))
            .handle_inbound_event(GatewayKind::Stripe, b"{}", "sig")
            .await
            .unwrap();
    }
}
