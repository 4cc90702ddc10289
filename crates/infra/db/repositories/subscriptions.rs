use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    PgConnection, RunQueryDsl, insert_into,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::{
        postgres::{
            postgres_connection::PgPoolSquad,
            schema::{subscriptions, tenants},
        },
        repositories::invoices::insert_numbered_invoice,
    },
};
use domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        invoices::NewInvoiceDraft,
        plans::TenantPlanLimits,
        subscriptions::{CreateSubscriptionOutcome, GatewayLinkage, PlanChange},
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Copies the plan's limits onto the tenant. Always called inside the caller's transaction.
fn propagate_plan_limits(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    limits: &TenantPlanLimits,
) -> QueryResult<()> {
    update(tenants::table.find(tenant_id))
        .set((
            tenants::subscription_plan.eq(Some(limits.plan_slug.clone())),
            tenants::max_projects.eq(limits.max_projects),
            tenants::max_users.eq(limits.max_users),
            tenants::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;

    Ok(())
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_tenant_id(&self, tenant_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = subscriptions::table
            .filter(subscriptions::tenant_id.eq(tenant_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn create_for_tenant(
        &self,
        subscription: InsertSubscriptionEntity,
        limits: TenantPlanLimits,
    ) -> Result<CreateSubscriptionOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<CreateSubscriptionOutcome, DieselError, _>(|conn| {
            let existing = subscriptions::table
                .filter(subscriptions::tenant_id.eq(subscription.tenant_id))
                .select(SubscriptionEntity::as_select())
                .for_update()
                .first::<SubscriptionEntity>(conn)
                .optional()?;

            let created = match existing {
                Some(current) if current.is_live() => {
                    return Ok(CreateSubscriptionOutcome::TenantAlreadySubscribed);
                }
                // The relationship is 1:1, so a lapsed subscription is re-initialized in place.
                Some(current) => update(subscriptions::table.find(current.id))
                    .set((
                        &subscription,
                        subscriptions::cancel_at_period_end.eq(false),
                        subscriptions::canceled_at.eq(None::<DateTime<Utc>>),
                        subscriptions::cancellation_reason.eq(None::<String>),
                        subscriptions::gateway_subscription_id.eq(None::<String>),
                        subscriptions::updated_at.eq(Utc::now()),
                    ))
                    .returning(SubscriptionEntity::as_select())
                    .get_result::<SubscriptionEntity>(conn)?,
                None => insert_into(subscriptions::table)
                    .values(&subscription)
                    .returning(SubscriptionEntity::as_select())
                    .get_result::<SubscriptionEntity>(conn)?,
            };

            propagate_plan_limits(conn, created.tenant_id, &limits)?;

            Ok(CreateSubscriptionOutcome::Created(created))
        });

        match result {
            Ok(outcome) => Ok(outcome),
            // A concurrent create for the same tenant won the unique index.
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Ok(CreateSubscriptionOutcome::TenantAlreadySubscribed)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn change_plan(
        &self,
        subscription_id: Uuid,
        plan_id: Uuid,
        limits: TenantPlanLimits,
        adjustment: Option<NewInvoiceDraft>,
    ) -> Result<PlanChange> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plan_change = conn.transaction::<PlanChange, DieselError, _>(|conn| {
            let updated = update(subscriptions::table.find(subscription_id))
                .set((
                    subscriptions::plan_id.eq(plan_id),
                    subscriptions::updated_at.eq(Utc::now()),
                ))
                .returning(SubscriptionEntity::as_select())
                .get_result::<SubscriptionEntity>(conn)?;

            propagate_plan_limits(conn, updated.tenant_id, &limits)?;

            let adjustment_invoice = adjustment
                .as_ref()
                .map(|draft| insert_numbered_invoice(conn, draft))
                .transpose()?;

            Ok(PlanChange {
                subscription: updated,
                adjustment_invoice,
            })
        })?;

        Ok(plan_change)
    }

    async fn cancel(
        &self,
        subscription_id: Uuid,
        reason: Option<String>,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let canceled = update(subscriptions::table.find(subscription_id))
            .filter(subscriptions::status.ne(SubscriptionStatus::Canceled.as_str()))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Canceled.as_str()),
                subscriptions::cancel_at_period_end.eq(true),
                subscriptions::canceled_at.eq(Some(now)),
                subscriptions::cancellation_reason.eq(reason),
                subscriptions::updated_at.eq(now),
            ))
            .returning(SubscriptionEntity::as_select())
            .get_result::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(canceled)
    }

    async fn update_gateway_linkage(
        &self,
        subscription_id: Uuid,
        linkage: GatewayLinkage,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscriptions::table.find(subscription_id))
            .set((
                subscriptions::gateway.eq(linkage.gateway.as_str()),
                subscriptions::gateway_customer_id.eq(linkage.gateway_customer_id),
                subscriptions::payment_method_id.eq(linkage.payment_method_id),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
