use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{invoices::InvoiceEntity, subscriptions::SubscriptionEntity},
    value_objects::{
        enums::{billing_cycles::BillingCycle, gateways::GatewayKind},
        invoices::InvoiceDto,
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscriptionModel {
    pub plan_id: Uuid,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    pub payment_method_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeSubscriptionModel {
    pub plan_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelSubscriptionModel {
    pub reason: Option<String>,
}

/// Result of the create transaction. A concurrent or existing live subscription
/// surfaces as `TenantAlreadySubscribed` instead of a second row.
#[derive(Debug, Clone)]
pub enum CreateSubscriptionOutcome {
    Created(SubscriptionEntity),
    TenantAlreadySubscribed,
}

/// Outcome of a plan change: the swapped subscription plus the adjustment invoice issued
/// in the same transaction, if one was due.
#[derive(Debug, Clone)]
pub struct PlanChange {
    pub subscription: SubscriptionEntity,
    pub adjustment_invoice: Option<InvoiceEntity>,
}

/// Gateway references carried on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayLinkage {
    pub gateway: GatewayKind,
    pub gateway_customer_id: Option<String>,
    pub payment_method_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub billing_cycle: String,
    pub current_period_start: NaiveDate,
    pub current_period_end: NaiveDate,
    pub trial_start: Option<NaiveDate>,
    pub trial_end: Option<NaiveDate>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub gateway: String,
    pub gateway_subscription_id: Option<String>,
    pub payment_method_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            tenant_id: value.tenant_id,
            plan_id: value.plan_id,
            status: value.status,
            billing_cycle: value.billing_cycle,
            current_period_start: value.current_period_start,
            current_period_end: value.current_period_end,
            trial_start: value.trial_start,
            trial_end: value.trial_end,
            cancel_at_period_end: value.cancel_at_period_end,
            canceled_at: value.canceled_at,
            cancellation_reason: value.cancellation_reason,
            gateway: value.gateway,
            gateway_subscription_id: value.gateway_subscription_id,
            payment_method_id: value.payment_method_id,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpgradeSubscriptionDto {
    pub subscription: SubscriptionDto,
    /// Present only when the prorated difference was positive.
    pub adjustment_invoice: Option<InvoiceDto>,
}
