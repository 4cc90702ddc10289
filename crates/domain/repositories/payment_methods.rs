use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_methods::{
    InsertPaymentMethodEntity, PaymentMethodEntity,
};

#[automock]
#[async_trait]
pub trait PaymentMethodRepository {
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<PaymentMethodEntity>>;
    async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        payment_method_id: Uuid,
    ) -> Result<Option<PaymentMethodEntity>>;
    async fn find_default_active(&self, tenant_id: Uuid) -> Result<Option<PaymentMethodEntity>>;
    async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<i64>;

    /// Inserts the method; when it is the default, the previous default is cleared atomically.
    async fn create(&self, payment_method: InsertPaymentMethodEntity)
    -> Result<PaymentMethodEntity>;

    async fn set_default(
        &self,
        tenant_id: Uuid,
        payment_method_id: Uuid,
    ) -> Result<Option<PaymentMethodEntity>>;

    async fn delete(&self, tenant_id: Uuid, payment_method_id: Uuid) -> Result<bool>;
}
