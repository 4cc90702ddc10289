use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::tenants},
};
use domain::{
    entities::tenants::TenantEntity, repositories::tenants::TenantRepository,
    value_objects::enums::gateways::GatewayKind,
};

pub struct TenantPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TenantPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TenantRepository for TenantPostgres {
    async fn find_by_id(&self, tenant_id: Uuid) -> Result<Option<TenantEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let tenant = tenants::table
            .find(tenant_id)
            .select(TenantEntity::as_select())
            .first::<TenantEntity>(&mut conn)
            .optional()?;

        Ok(tenant)
    }

    async fn update_gateway_customer_id(
        &self,
        tenant_id: Uuid,
        gateway: GatewayKind,
        customer_id: String,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let target = update(tenants::table.find(tenant_id));

        match gateway {
            GatewayKind::Stripe => target
                .set((
                    tenants::stripe_customer_id.eq(Some(customer_id)),
                    tenants::updated_at.eq(Utc::now()),
                ))
                .execute(&mut conn)?,
            GatewayKind::Asaas => target
                .set((
                    tenants::asaas_customer_id.eq(Some(customer_id)),
                    tenants::updated_at.eq(Utc::now()),
                ))
                .execute(&mut conn)?,
        };

        Ok(())
    }
}
