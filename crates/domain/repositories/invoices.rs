use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::invoices::InvoiceEntity,
    value_objects::{enums::invoice_statuses::InvoiceStatus, invoices::NewInvoiceDraft},
};

#[automock]
#[async_trait]
pub trait InvoiceRepository {
    /// Assigns the next number for the current year and inserts in one serialized transaction.
    async fn create_invoice(&self, draft: NewInvoiceDraft) -> Result<InvoiceEntity>;
    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<InvoiceEntity>>;
    async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceEntity>>;
    async fn find_by_invoice_number(&self, invoice_number: String)
    -> Result<Option<InvoiceEntity>>;
    async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<InvoiceEntity>>;
}
