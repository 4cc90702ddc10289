use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    PgConnection, RunQueryDsl, insert_into, prelude::*, result::Error as DieselError, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{invoices, payments, subscriptions},
    },
};
use domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity},
    repositories::payments::PaymentRepository,
    value_objects::{
        enums::{
            invoice_statuses::InvoiceStatus, payment_statuses::PaymentStatus,
            subscription_statuses::SubscriptionStatus,
        },
        payments::PaymentTransition,
    },
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn lock_payment(conn: &mut PgConnection, payment_id: Uuid) -> QueryResult<PaymentEntity> {
    payments::table
        .find(payment_id)
        .select(PaymentEntity::as_select())
        .for_update()
        .first::<PaymentEntity>(conn)
}

fn subscription_of_invoice(conn: &mut PgConnection, invoice_id: Uuid) -> QueryResult<Option<Uuid>> {
    invoices::table
        .find(invoice_id)
        .select(invoices::subscription_id)
        .first::<Option<Uuid>>(conn)
}

fn status_values(statuses: &[SubscriptionStatus]) -> Vec<&'static str> {
    statuses.iter().map(SubscriptionStatus::as_str).collect()
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn create_pending(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = insert_into(payments::table)
            .values(&payment)
            .returning(PaymentEntity::as_select())
            .get_result::<PaymentEntity>(&mut conn)?;

        Ok(created)
    }

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .find(payment_id)
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn find_by_gateway_payment_id(
        &self,
        gateway_payment_id: String,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::gateway_payment_id.eq(gateway_payment_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn find_latest_for_invoice(&self, invoice_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::invoice_id.eq(invoice_id))
            .order(payments::created_at.desc())
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = payments::table
            .filter(payments::tenant_id.eq(tenant_id))
            .select(PaymentEntity::as_select())
            .order(payments::created_at.desc())
            .into_boxed();

        if let Some(status) = status {
            query = query.filter(payments::status.eq(status.as_str()));
        }

        Ok(query.load::<PaymentEntity>(&mut conn)?)
    }

    async fn mark_processing(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<String>,
    ) -> Result<PaymentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(payments::table.find(payment_id))
            .filter(payments::status.ne_all(PaymentStatus::terminal_values()))
            .set((
                payments::status.eq(PaymentStatus::Processing.as_str()),
                payments::gateway_payment_id.eq(gateway_payment_id),
                payments::updated_at.eq(Utc::now()),
            ))
            .returning(PaymentEntity::as_select())
            .get_result::<PaymentEntity>(&mut conn)
            .optional()?;

        match updated {
            Some(payment) => Ok(payment),
            // A webhook already settled it; report the stored state.
            None => self
                .find_by_id(payment_id)
                .await?
                .ok_or_else(|| anyhow!("payment {payment_id} not found")),
        }
    }

    async fn apply_success(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<String>,
        gateway_charge_id: Option<String>,
    ) -> Result<PaymentTransition> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transition = conn.transaction::<PaymentTransition, DieselError, _>(|conn| {
            let current = lock_payment(conn, payment_id)?;
            if current.is_terminal() {
                return Ok(PaymentTransition::AlreadyTerminal(current));
            }

            let now = Utc::now();
            let gateway_payment_id = gateway_payment_id.or(current.gateway_payment_id.clone());
            let gateway_charge_id = gateway_charge_id.or(current.gateway_charge_id.clone());

            let payment = update(payments::table.find(payment_id))
                .set((
                    payments::status.eq(PaymentStatus::Succeeded.as_str()),
                    payments::gateway_payment_id.eq(gateway_payment_id),
                    payments::gateway_charge_id.eq(gateway_charge_id),
                    payments::failure_reason.eq(None::<String>),
                    payments::updated_at.eq(now),
                ))
                .returning(PaymentEntity::as_select())
                .get_result::<PaymentEntity>(conn)?;

            // Guarded on status so paid_at is only ever written once.
            update(invoices::table.find(payment.invoice_id))
                .filter(invoices::status.ne(InvoiceStatus::Paid.as_str()))
                .set((
                    invoices::status.eq(InvoiceStatus::Paid.as_str()),
                    invoices::paid_at.eq(Some(now)),
                    invoices::updated_at.eq(now),
                ))
                .execute(conn)?;

            if let Some(subscription_id) = subscription_of_invoice(conn, payment.invoice_id)? {
                update(subscriptions::table.find(subscription_id))
                    .filter(subscriptions::status.eq_any(status_values(
                        &SubscriptionStatus::promoted_by_payment(),
                    )))
                    .set((
                        subscriptions::status.eq(SubscriptionStatus::Active.as_str()),
                        subscriptions::updated_at.eq(now),
                    ))
                    .execute(conn)?;
            }

            Ok(PaymentTransition::Applied(payment))
        })?;

        Ok(transition)
    }

    async fn apply_failure(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<String>,
        reason: String,
    ) -> Result<PaymentTransition> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transition = conn.transaction::<PaymentTransition, DieselError, _>(|conn| {
            let current = lock_payment(conn, payment_id)?;
            if current.is_terminal() {
                return Ok(PaymentTransition::AlreadyTerminal(current));
            }

            let now = Utc::now();
            let gateway_payment_id = gateway_payment_id.or(current.gateway_payment_id.clone());
            let payment = update(payments::table.find(payment_id))
                .set((
                    payments::status.eq(PaymentStatus::Failed.as_str()),
                    payments::gateway_payment_id.eq(gateway_payment_id),
                    payments::failure_reason.eq(Some(reason)),
                    payments::retry_count.eq(payments::retry_count + 1),
                    payments::updated_at.eq(now),
                ))
                .returning(PaymentEntity::as_select())
                .get_result::<PaymentEntity>(conn)?;

            if let Some(subscription_id) = subscription_of_invoice(conn, payment.invoice_id)? {
                update(subscriptions::table.find(subscription_id))
                    .filter(subscriptions::status.eq_any(status_values(
                        &SubscriptionStatus::demoted_by_failure(),
                    )))
                    .set((
                        subscriptions::status.eq(SubscriptionStatus::PastDue.as_str()),
                        subscriptions::updated_at.eq(now),
                    ))
                    .execute(conn)?;
            }

            Ok(PaymentTransition::Applied(payment))
        })?;

        Ok(transition)
    }
}
