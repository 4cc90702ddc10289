use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    PgConnection, RunQueryDsl, delete, dsl::count_star, insert_into, prelude::*,
    result::Error as DieselError, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_methods},
};
use domain::{
    entities::payment_methods::{InsertPaymentMethodEntity, PaymentMethodEntity},
    repositories::payment_methods::PaymentMethodRepository,
};

pub struct PaymentMethodPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentMethodPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Clears the tenant's current default. Must run in the same transaction that sets the new one.
fn clear_default(conn: &mut PgConnection, tenant_id: Uuid) -> QueryResult<usize> {
    update(payment_methods::table)
        .filter(payment_methods::tenant_id.eq(tenant_id))
        .filter(payment_methods::is_default.eq(true))
        .set((
            payment_methods::is_default.eq(false),
            payment_methods::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

#[async_trait]
impl PaymentMethodRepository for PaymentMethodPostgres {
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let methods = payment_methods::table
            .filter(payment_methods::tenant_id.eq(tenant_id))
            .filter(payment_methods::is_active.eq(true))
            .order((
                payment_methods::is_default.desc(),
                payment_methods::created_at.desc(),
            ))
            .select(PaymentMethodEntity::as_select())
            .load::<PaymentMethodEntity>(&mut conn)?;

        Ok(methods)
    }

    async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        payment_method_id: Uuid,
    ) -> Result<Option<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let method = payment_methods::table
            .filter(payment_methods::id.eq(payment_method_id))
            .filter(payment_methods::tenant_id.eq(tenant_id))
            .select(PaymentMethodEntity::as_select())
            .first::<PaymentMethodEntity>(&mut conn)
            .optional()?;

        Ok(method)
    }

    async fn find_default_active(&self, tenant_id: Uuid) -> Result<Option<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let method = payment_methods::table
            .filter(payment_methods::tenant_id.eq(tenant_id))
            .filter(payment_methods::is_default.eq(true))
            .filter(payment_methods::is_active.eq(true))
            .select(PaymentMethodEntity::as_select())
            .first::<PaymentMethodEntity>(&mut conn)
            .optional()?;

        Ok(method)
    }

    async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let count = payment_methods::table
            .filter(payment_methods::tenant_id.eq(tenant_id))
            .filter(payment_methods::is_active.eq(true))
            .select(count_star())
            .first::<i64>(&mut conn)?;

        Ok(count)
    }

    async fn create(
        &self,
        payment_method: InsertPaymentMethodEntity,
    ) -> Result<PaymentMethodEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = conn.transaction::<PaymentMethodEntity, DieselError, _>(|conn| {
            if payment_method.is_default {
                clear_default(conn, payment_method.tenant_id)?;
            }

            insert_into(payment_methods::table)
                .values(&payment_method)
                .returning(PaymentMethodEntity::as_select())
                .get_result::<PaymentMethodEntity>(conn)
        })?;

        Ok(created)
    }

    async fn set_default(
        &self,
        tenant_id: Uuid,
        payment_method_id: Uuid,
    ) -> Result<Option<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = conn.transaction::<Option<PaymentMethodEntity>, DieselError, _>(|conn| {
            let exists = payment_methods::table
                .filter(payment_methods::id.eq(payment_method_id))
                .filter(payment_methods::tenant_id.eq(tenant_id))
                .select(payment_methods::id)
                .for_update()
                .first::<Uuid>(conn)
                .optional()?;

            if exists.is_none() {
                return Ok(None);
            }

            clear_default(conn, tenant_id)?;

            let method = update(payment_methods::table.find(payment_method_id))
                .set((
                    payment_methods::is_default.eq(true),
                    payment_methods::updated_at.eq(Utc::now()),
                ))
                .returning(PaymentMethodEntity::as_select())
                .get_result::<PaymentMethodEntity>(conn)?;

            Ok(Some(method))
        })?;

        Ok(updated)
    }

    async fn delete(&self, tenant_id: Uuid, payment_method_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(
            payment_methods::table
                .filter(payment_methods::id.eq(payment_method_id))
                .filter(payment_methods::tenant_id.eq(tenant_id)),
        )
        .execute(&mut conn)?;

        Ok(deleted > 0)
    }
}
