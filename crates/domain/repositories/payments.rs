use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity},
    value_objects::{enums::payment_statuses::PaymentStatus, payments::PaymentTransition},
};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn create_pending(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity>;
    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>>;
    async fn find_by_gateway_payment_id(
        &self,
        gateway_payment_id: String,
    ) -> Result<Option<PaymentEntity>>;
    async fn find_latest_for_invoice(&self, invoice_id: Uuid) -> Result<Option<PaymentEntity>>;
    async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentEntity>>;

    /// Leaves a non-terminal payment in `processing` awaiting external confirmation.
    async fn mark_processing(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<String>,
    ) -> Result<PaymentEntity>;

    /// Payment `succeeded`, invoice `paid` and subscription promotion in one transaction.
    /// A payment that is already terminal is left untouched.
    async fn apply_success(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<String>,
        gateway_charge_id: Option<String>,
    ) -> Result<PaymentTransition>;

    /// Payment `failed`, retry counter bump and subscription demotion in one transaction.
    /// The gateway id is kept so a late success notification can still find the row.
    async fn apply_failure(
        &self,
        payment_id: Uuid,
        gateway_payment_id: Option<String>,
        reason: String,
    ) -> Result<PaymentTransition>;
}
