use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::tenants::TenantEntity, value_objects::enums::gateways::GatewayKind,
};

#[automock]
#[async_trait]
pub trait TenantRepository {
    async fn find_by_id(&self, tenant_id: Uuid) -> Result<Option<TenantEntity>>;

    /// Stores the gateway-assigned customer id on the tenant, verbatim.
    async fn update_gateway_customer_id(
        &self,
        tenant_id: Uuid,
        gateway: GatewayKind,
        customer_id: String,
    ) -> Result<()>;
}
