use std::sync::Arc;

use crates::{
    domain::{
        entities::{
            invoices::InvoiceEntity,
            payment_methods::PaymentMethodEntity,
            payments::{DEFAULT_MAX_RETRIES, InsertPaymentEntity, PaymentEntity},
            subscriptions::SubscriptionEntity,
            tenants::TenantEntity,
        },
        repositories::{
            invoices::InvoiceRepository, payment_methods::PaymentMethodRepository,
            payments::PaymentRepository, subscriptions::SubscriptionRepository,
            tenants::TenantRepository,
        },
        value_objects::{
            enums::{currencies::Currency, gateways::GatewayKind, payment_statuses::PaymentStatus},
            money::Money,
            payments::{ChargeOutcome, PaymentDto, PaymentTransition},
            subscriptions::GatewayLinkage,
        },
    },
    payments::gateway::{CaptureMode, ChargeRequest, PaymentGateways},
};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::errors::{BillingError, UseCaseResult};

/// Drives one charge attempt per invoice and owns the payment state transitions.
pub struct PaymentProcessor {
    payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
    payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    tenant_repo: Arc<dyn TenantRepository + Send + Sync>,
    invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
    gateways: PaymentGateways,
}

impl PaymentProcessor {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
        payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        tenant_repo: Arc<dyn TenantRepository + Send + Sync>,
        invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            payment_repo,
            payment_method_repo,
            subscription_repo,
            tenant_repo,
            invoice_repo,
            gateways,
        }
    }

    /// Charges `invoice` once. Gateway failures are recorded on the returned payment rather
    /// than raised; only caller mistakes and storage failures come back as errors.
    pub async fn process_payment(
        &self,
        invoice: &InvoiceEntity,
        payment_method_id: Option<Uuid>,
    ) -> UseCaseResult<PaymentEntity> {
        let tenant_id = invoice.tenant_id;
        info!(
            %tenant_id,
            invoice_number = %invoice.invoice_number,
            "payments: processing invoice payment"
        );

        let method = self.resolve_payment_method(tenant_id, payment_method_id).await?;
        let gateway_kind = method.gateway_kind().ok_or_else(|| {
            BillingError::Internal(anyhow::anyhow!(
                "payment method {} has unknown gateway {}",
                method.id,
                method.gateway
            ))
        })?;
        let currency = Currency::from_str(&invoice.currency).ok_or_else(|| {
            BillingError::Internal(anyhow::anyhow!(
                "invoice {} has unknown currency {}",
                invoice.invoice_number,
                invoice.currency
            ))
        })?;

        let tenant = self
            .tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("tenant"))?;

        let payment = self
            .payment_repo
            .create_pending(InsertPaymentEntity {
                invoice_id: invoice.id,
                tenant_id,
                payment_method_id: Some(method.id),
                amount_minor: invoice.total_amount_minor,
                currency: currency.to_string(),
                status: PaymentStatus::Pending.to_string(),
                payment_method_type: method.method_type().as_str().to_string(),
                gateway: gateway_kind.as_str().to_string(),
                max_retries: DEFAULT_MAX_RETRIES,
                metadata: json!({ "invoice_number": invoice.invoice_number }),
            })
            .await
            .map_err(|err| {
                error!(%tenant_id, db_error = ?err, "payments: failed to create pending payment");
                BillingError::Internal(err)
            })?;

        self.reconcile_linkage(invoice, &tenant, gateway_kind, method.id)
            .await?;

        let gateway = self.gateways.get(gateway_kind);
        let request = ChargeRequest {
            amount: Money::new(invoice.total_amount_minor, currency),
            payment_method_id: method.gateway_payment_method_id.clone(),
            invoice_ref: Some(invoice.invoice_number.clone()),
            customer_id: tenant.customer_id_for(gateway_kind).map(str::to_string),
        };

        let response = gateway.process_payment(request).await;

        let payment = match (gateway.capture_mode(), response) {
            (CaptureMode::AwaitingConfirmation, Ok(response)) => {
                info!(
                    payment_id = %payment.id,
                    gateway = %gateway_kind,
                    gateway_payment_id = %response.id,
                    "payments: charge created, awaiting gateway confirmation"
                );
                self.payment_repo
                    .mark_processing(payment.id, Some(response.id))
                    .await?
            }
            (CaptureMode::Synchronous, Ok(response)) => {
                match ChargeOutcome::from_status(response.status.as_deref()) {
                    ChargeOutcome::Succeeded => self
                        .mark_payment_succeeded(payment.id, Some(response.id), response.charge_id)
                        .await?
                        .into_payment(),
                    ChargeOutcome::Failed { reason } => self
                        .mark_payment_failed(payment.id, Some(response.id), reason)
                        .await?
                        .into_payment(),
                }
            }
            (_, Err(gateway_error)) => {
                warn!(
                    payment_id = %payment.id,
                    gateway = %gateway_kind,
                    error = %gateway_error,
                    "payments: gateway call failed"
                );
                self.mark_payment_failed(payment.id, None, gateway_error.to_string())
                    .await?
                    .into_payment()
            }
        };

        Ok(payment)
    }

    async fn resolve_payment_method(
        &self,
        tenant_id: Uuid,
        payment_method_id: Option<Uuid>,
    ) -> UseCaseResult<PaymentMethodEntity> {
        match payment_method_id {
            Some(payment_method_id) => {
                let method = self
                    .payment_method_repo
                    .find_for_tenant(tenant_id, payment_method_id)
                    .await?
                    .ok_or_else(|| BillingError::not_found("payment method"))?;
                if !method.is_active {
                    return Err(BillingError::validation("payment method is not active"));
                }
                Ok(method)
            }
            None => self
                .payment_method_repo
                .find_default_active(tenant_id)
                .await?
                .ok_or_else(|| {
                    warn!(%tenant_id, "payments: no payment method available");
                    BillingError::validation("no payment method available")
                }),
        }
    }

    async fn reconcile_linkage(
        &self,
        invoice: &InvoiceEntity,
        tenant: &TenantEntity,
        gateway: GatewayKind,
        payment_method_id: Uuid,
    ) -> UseCaseResult<()> {
        let Some(subscription_id) = invoice.subscription_id else {
            return Ok(());
        };

        let subscription = self
            .subscription_repo
            .find_by_tenant_id(tenant.id)
            .await?
            .filter(|subscription| subscription.id == subscription_id);

        let Some(subscription) = subscription else {
            return Ok(());
        };

        if let Some(linkage) = linkage_drift(
            &subscription,
            gateway,
            tenant.customer_id_for(gateway),
            payment_method_id,
        ) {
            info!(
                %subscription_id,
                from_gateway = %subscription.gateway,
                to_gateway = %gateway,
                "payments: relinking subscription to payment gateway"
            );
            self.subscription_repo
                .update_gateway_linkage(subscription_id, linkage)
                .await?;
        }

        Ok(())
    }

    /// Idempotent: a payment that already reached a terminal status is returned untouched.
    pub async fn mark_payment_succeeded(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<String>,
        gateway_charge_id: Option<String>,
    ) -> UseCaseResult<PaymentTransition> {
        let transition = self
            .payment_repo
            .apply_success(payment_id, gateway_payment_id, gateway_charge_id)
            .await
            .map_err(|err| {
                error!(%payment_id, db_error = ?err, "payments: failed to apply success");
                BillingError::Internal(err)
            })?;

        if transition.was_applied() {
            info!(
                %payment_id,
                invoice_id = %transition.payment().invoice_id,
                "payments: payment succeeded, invoice paid"
            );
        } else if transition.payment().status == PaymentStatus::Failed.as_str() {
            // Money moved on a payment recorded as failed; the invoice needs manual settlement.
            warn!(
                orphan_webhook = true,
                %payment_id,
                invoice_id = %transition.payment().invoice_id,
                gateway_payment_id = ?transition.payment().gateway_payment_id,
                "payments: success reported for a failed payment, invoice left unpaid"
            );
        } else {
            info!(
                %payment_id,
                status = %transition.payment().status,
                "payments: payment already terminal, success ignored"
            );
        }

        Ok(transition)
    }

    pub async fn mark_payment_failed(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<String>,
        reason: String,
    ) -> UseCaseResult<PaymentTransition> {
        let transition = self
            .payment_repo
            .apply_failure(payment_id, gateway_payment_id, reason.clone())
            .await
            .map_err(|err| {
                error!(%payment_id, db_error = ?err, "payments: failed to apply failure");
                BillingError::Internal(err)
            })?;

        if transition.was_applied() {
            warn!(%payment_id, %reason, "payments: payment failed");
        } else {
            info!(
                %payment_id,
                status = %transition.payment().status,
                "payments: payment already terminal, failure ignored"
            );
        }

        Ok(transition)
    }

    pub async fn pay_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        payment_method_id: Option<Uuid>,
    ) -> UseCaseResult<PaymentDto> {
        let invoice = self
            .invoice_repo
            .find_for_tenant(tenant_id, invoice_id)
            .await?
            .ok_or_else(|| BillingError::not_found("invoice"))?;

        let accepts_payment = invoice
            .status()
            .is_some_and(|status| status.accepts_payment());
        if !accepts_payment {
            return Err(BillingError::validation(format!(
                "invoice {} is {} and cannot be paid",
                invoice.invoice_number, invoice.status
            )));
        }

        self.process_payment(&invoice, payment_method_id)
            .await
            .map(PaymentDto::from)
    }

    pub async fn list_payments(
        &self,
        tenant_id: Uuid,
        status: Option<String>,
    ) -> UseCaseResult<Vec<PaymentDto>> {
        let status = match status.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            None => None,
            Some(value) => Some(
                PaymentStatus::from_str(&value.to_ascii_lowercase()).ok_or_else(|| {
                    BillingError::validation(format!("unknown payment status: {value}"))
                })?,
            ),
        };

        let payments = self
            .payment_repo
            .list_for_tenant(tenant_id, status)
            .await
            .map_err(|err| {
                error!(%tenant_id, db_error = ?err, "payments: failed to list payments");
                BillingError::Internal(err)
            })?;

        Ok(payments.into_iter().map(PaymentDto::from).collect())
    }
}

/// New linkage when the subscription points at another gateway, or at a customer other than
/// the tenant's customer on `gateway`.
pub(crate) fn linkage_drift(
    subscription: &SubscriptionEntity,
    gateway: GatewayKind,
    customer_id: Option<&str>,
    payment_method_id: Uuid,
) -> Option<GatewayLinkage> {
    let gateway_drifted = subscription.gateway_kind() != Some(gateway);
    let customer_drifted =
        customer_id.is_some() && subscription.gateway_customer_id.as_deref() != customer_id;

    if !gateway_drifted && !customer_drifted {
        return None;
    }

    Some(GatewayLinkage {
        gateway,
        gateway_customer_id: customer_id.map(str::to_string),
        payment_method_id: Some(payment_method_id),
    })
}
