use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::invoices::InvoiceEntity,
    value_objects::{
        enums::{currencies::Currency, invoice_statuses::InvoiceStatus},
        money::format_minor,
    },
};

/// Human-readable invoice number, `INV-<year>-<4-digit sequence>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InvoiceNumber {
    pub year: i32,
    pub sequence: i32,
}

impl InvoiceNumber {
    /// Number following the highest sequence already issued in `year`.
    pub fn next_after(year: i32, max_sequence: Option<i32>) -> Self {
        Self {
            year,
            sequence: max_sequence.unwrap_or(0) + 1,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("INV-")?;
        let (year, sequence) = rest.split_once('-')?;
        if year.len() != 4 || sequence.len() < 4 {
            return None;
        }
        Some(Self {
            year: year.parse().ok()?,
            sequence: sequence.parse().ok()?,
        })
    }
}

impl Display for InvoiceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "INV-{}-{:04}", self.year, self.sequence)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub description: String,
    pub quantity: i32,
    pub amount_minor: i64,
}

/// Everything an invoice needs except its number, which is assigned at insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceDraft {
    pub tenant_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount_minor: i64,
    pub tax_amount_minor: i64,
    pub currency: Currency,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub line_items: Vec<LineItem>,
    pub notes: Option<String>,
}

impl NewInvoiceDraft {
    pub fn total_amount_minor(&self) -> i64 {
        self.amount_minor + self.tax_amount_minor
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemDto {
    pub description: String,
    pub quantity: i32,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct InvoiceDto {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub invoice_number: String,
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub currency: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_invoice_id: Option<String>,
    pub gateway_pdf_url: Option<String>,
    pub line_items: Vec<LineItemDto>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceEntity> for InvoiceDto {
    fn from(value: InvoiceEntity) -> Self {
        let line_items = value
            .line_items()
            .into_iter()
            .map(|item| LineItemDto {
                description: item.description,
                quantity: item.quantity,
                amount: format_minor(item.amount_minor),
            })
            .collect();

        Self {
            id: value.id,
            tenant_id: value.tenant_id,
            subscription_id: value.subscription_id,
            invoice_number: value.invoice_number,
            amount: format_minor(value.amount_minor),
            tax_amount: format_minor(value.tax_amount_minor),
            total_amount: format_minor(value.total_amount_minor),
            currency: value.currency,
            status: value.status,
            issue_date: value.issue_date,
            due_date: value.due_date,
            paid_at: value.paid_at,
            gateway_invoice_id: value.gateway_invoice_id,
            gateway_pdf_url: value.gateway_pdf_url,
            line_items,
            notes: value.notes,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoicePdfDto {
    pub invoice_number: String,
    pub pdf_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusFilterQuery {
    pub status: Option<String>,
}
