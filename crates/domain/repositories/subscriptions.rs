use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    value_objects::{
        invoices::NewInvoiceDraft,
        plans::TenantPlanLimits,
        subscriptions::{CreateSubscriptionOutcome, GatewayLinkage, PlanChange},
    },
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_tenant_id(&self, tenant_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Inserts the tenant's subscription, or re-initializes a non-live one in place, and
    /// copies the plan limits onto the tenant in the same transaction.
    async fn create_for_tenant(
        &self,
        subscription: InsertSubscriptionEntity,
        limits: TenantPlanLimits,
    ) -> Result<CreateSubscriptionOutcome>;

    /// Swaps the plan, propagates its limits to the tenant and numbers and inserts the
    /// adjustment invoice, all in one transaction. Nothing is written if any step fails.
    async fn change_plan(
        &self,
        subscription_id: Uuid,
        plan_id: Uuid,
        limits: TenantPlanLimits,
        adjustment: Option<NewInvoiceDraft>,
    ) -> Result<PlanChange>;

    /// Moves a non-canceled subscription to `canceled`. Returns `None` when it was already canceled.
    async fn cancel(
        &self,
        subscription_id: Uuid,
        reason: Option<String>,
    ) -> Result<Option<SubscriptionEntity>>;

    async fn update_gateway_linkage(
        &self,
        subscription_id: Uuid,
        linkage: GatewayLinkage,
    ) -> Result<()>;
}
