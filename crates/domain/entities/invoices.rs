use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::invoice_statuses::InvoiceStatus, invoices::LineItem,
    },
    infra::db::postgres::schema::invoices,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = invoices)]
pub struct InvoiceEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub invoice_number: String,
    pub invoice_year: i32,
    pub invoice_sequence: i32,
    pub amount_minor: i64,
    pub tax_amount_minor: i64,
    pub total_amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_invoice_id: Option<String>,
    pub gateway_pdf_url: Option<String>,
    pub line_items: serde_json::Value,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceEntity {
    pub fn status(&self) -> Option<InvoiceStatus> {
        InvoiceStatus::from_str(&self.status)
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        serde_json::from_value(self.line_items.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = invoices)]
pub struct InsertInvoiceEntity {
    pub tenant_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub invoice_number: String,
    pub invoice_year: i32,
    pub invoice_sequence: i32,
    pub amount_minor: i64,
    pub tax_amount_minor: i64,
    pub total_amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub line_items: serde_json::Value,
    pub notes: Option<String>,
}
