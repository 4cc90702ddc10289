use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        billing_cycles::BillingCycle, gateways::GatewayKind,
        subscription_statuses::SubscriptionStatus,
    },
    infra::db::postgres::schema::subscriptions,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
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
    pub gateway_customer_id: Option<String>,
    pub payment_method_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    pub fn status(&self) -> Option<SubscriptionStatus> {
        SubscriptionStatus::from_str(&self.status)
    }

    pub fn is_live(&self) -> bool {
        self.status().is_some_and(|status| status.is_live())
    }

    pub fn cycle(&self) -> BillingCycle {
        BillingCycle::from_str(&self.billing_cycle).unwrap_or_default()
    }

    pub fn gateway_kind(&self) -> Option<GatewayKind> {
        GatewayKind::from_str(&self.gateway)
    }

    pub fn period_days(&self) -> i64 {
        (self.current_period_end - self.current_period_start).num_days()
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = subscriptions)]
#[diesel(treat_none_as_null = true)]
pub struct InsertSubscriptionEntity {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub billing_cycle: String,
    pub current_period_start: NaiveDate,
    pub current_period_end: NaiveDate,
    pub trial_start: Option<NaiveDate>,
    pub trial_end: Option<NaiveDate>,
    pub gateway: String,
    pub gateway_customer_id: Option<String>,
    pub payment_method_id: Option<Uuid>,
}
