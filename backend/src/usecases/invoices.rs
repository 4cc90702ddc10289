use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use crates::domain::{
    entities::{invoices::InvoiceEntity, subscriptions::SubscriptionEntity},
    repositories::{
        invoices::InvoiceRepository, plans::PlanRepository, tenants::TenantRepository,
    },
    value_objects::{
        enums::{billing_cycles::BillingCycle, invoice_statuses::InvoiceStatus},
        invoices::{InvoiceDto, InvoicePdfDto, LineItem, NewInvoiceDraft},
        money::Money,
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    errors::{BillingError, UseCaseResult},
    pricing::price_for,
};

/// Days an adjustment invoice stays open before it is due.
const ADJUSTMENT_DUE_DAYS: i64 = 7;

pub struct InvoiceGenerator {
    invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
    plan_repo: Arc<dyn PlanRepository + Send + Sync>,
    tenant_repo: Arc<dyn TenantRepository + Send + Sync>,
}

impl InvoiceGenerator {
    pub fn new(
        invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
        plan_repo: Arc<dyn PlanRepository + Send + Sync>,
        tenant_repo: Arc<dyn TenantRepository + Send + Sync>,
    ) -> Self {
        Self {
            invoice_repo,
            plan_repo,
            tenant_repo,
        }
    }

    /// Invoices one subscription period. Defaults to the subscription's current period; the
    /// cycle priced is inferred from the period length.
    pub async fn generate_invoice(
        &self,
        subscription: &SubscriptionEntity,
        period: Option<(NaiveDate, NaiveDate)>,
    ) -> UseCaseResult<InvoiceEntity> {
        let (period_start, period_end) = period.unwrap_or((
            subscription.current_period_start,
            subscription.current_period_end,
        ));
        let cycle = BillingCycle::from_period_days((period_end - period_start).num_days());

        let plan = self
            .plan_repo
            .find_by_id(subscription.plan_id)
            .await
            .map_err(|err| {
                error!(
                    plan_id = %subscription.plan_id,
                    db_error = ?err,
                    "invoices: failed to load plan"
                );
                BillingError::Internal(err)
            })?
            .ok_or_else(|| BillingError::not_found("plan"))?;

        let tenant = self
            .tenant_repo
            .find_by_id(subscription.tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("tenant"))?;

        let price = price_for(&plan, tenant.billing_country(), cycle);

        let draft = NewInvoiceDraft {
            tenant_id: subscription.tenant_id,
            subscription_id: Some(subscription.id),
            amount_minor: price.amount_minor,
            tax_amount_minor: 0,
            currency: price.currency,
            status: InvoiceStatus::Open,
            issue_date: Utc::now().date_naive(),
            due_date: period_end,
            line_items: vec![LineItem {
                description: format!("Subscription {} - {}", plan.name, cycle.label()),
                quantity: 1,
                amount_minor: price.amount_minor,
            }],
            notes: None,
        };

        let invoice = self.create(draft).await?;

        info!(
            tenant_id = %invoice.tenant_id,
            subscription_id = %subscription.id,
            invoice_number = %invoice.invoice_number,
            amount_minor = invoice.total_amount_minor,
            currency = %invoice.currency,
            "invoices: period invoice generated"
        );

        Ok(invoice)
    }

    /// Short-dated invoice for a prorated plan change.
    pub async fn generate_adjustment_invoice(
        &self,
        subscription: &SubscriptionEntity,
        amount: Money,
        notes: String,
    ) -> UseCaseResult<InvoiceEntity> {
        let draft = self.adjustment_draft(subscription, amount, notes)?;
        let invoice = self.create(draft).await?;

        info!(
            tenant_id = %invoice.tenant_id,
            subscription_id = %subscription.id,
            invoice_number = %invoice.invoice_number,
            amount_minor = invoice.total_amount_minor,
            "invoices: adjustment invoice generated"
        );

        Ok(invoice)
    }

    /// Unnumbered adjustment invoice, for callers that insert it inside their own transaction.
    pub fn adjustment_draft(
        &self,
        subscription: &SubscriptionEntity,
        amount: Money,
        notes: String,
    ) -> UseCaseResult<NewInvoiceDraft> {
        if !amount.is_positive() {
            return Err(BillingError::validation(
                "adjustment amount must be positive",
            ));
        }

        let today = Utc::now().date_naive();
        Ok(NewInvoiceDraft {
            tenant_id: subscription.tenant_id,
            subscription_id: Some(subscription.id),
            amount_minor: amount.amount_minor,
            tax_amount_minor: 0,
            currency: amount.currency,
            status: InvoiceStatus::Open,
            issue_date: today,
            due_date: today + Duration::days(ADJUSTMENT_DUE_DAYS),
            line_items: vec![LineItem {
                description: "Plan upgrade adjustment".to_string(),
                quantity: 1,
                amount_minor: amount.amount_minor,
            }],
            notes: Some(notes),
        })
    }

    async fn create(&self, draft: NewInvoiceDraft) -> UseCaseResult<InvoiceEntity> {
        let tenant_id = draft.tenant_id;
        self.invoice_repo.create_invoice(draft).await.map_err(|err| {
            error!(%tenant_id, db_error = ?err, "invoices: failed to create invoice");
            BillingError::Internal(err)
        })
    }

    pub async fn list_invoices(
        &self,
        tenant_id: Uuid,
        status: Option<String>,
    ) -> UseCaseResult<Vec<InvoiceDto>> {
        let status = parse_status_filter(status)?;

        let invoices = self
            .invoice_repo
            .list_for_tenant(tenant_id, status)
            .await
            .map_err(|err| {
                error!(%tenant_id, db_error = ?err, "invoices: failed to list invoices");
                BillingError::Internal(err)
            })?;

        Ok(invoices.into_iter().map(InvoiceDto::from).collect())
    }

    pub async fn get_invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> UseCaseResult<InvoiceDto> {
        self.find_for_tenant(tenant_id, invoice_id)
            .await
            .map(InvoiceDto::from)
    }

    pub async fn get_invoice_pdf(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> UseCaseResult<InvoicePdfDto> {
        let invoice = self.find_for_tenant(tenant_id, invoice_id).await?;

        match invoice.gateway_pdf_url {
            Some(pdf_url) => Ok(InvoicePdfDto {
                invoice_number: invoice.invoice_number,
                pdf_url,
            }),
            None => Err(BillingError::not_found("invoice pdf")),
        }
    }

    pub(crate) async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> UseCaseResult<InvoiceEntity> {
        self.invoice_repo
            .find_for_tenant(tenant_id, invoice_id)
            .await?
            .ok_or_else(|| {
                warn!(%tenant_id, %invoice_id, "invoices: invoice not found for tenant");
                BillingError::not_found("invoice")
            })
    }
}

fn parse_status_filter(status: Option<String>) -> UseCaseResult<Option<InvoiceStatus>> {
    match status.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => InvoiceStatus::from_str(&value.to_ascii_lowercase())
            .map(Some)
            .ok_or_else(|| BillingError::validation(format!("unknown invoice status: {value}"))),
    }
}
