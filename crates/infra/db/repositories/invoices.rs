use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use diesel::{
    PgConnection, RunQueryDsl, dsl::max, insert_into, prelude::*, result::Error as DieselError,
    sql_query, sql_types::Integer,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::invoices},
};
use domain::{
    entities::invoices::{InsertInvoiceEntity, InvoiceEntity},
    repositories::invoices::InvoiceRepository,
    value_objects::{
        enums::invoice_statuses::InvoiceStatus,
        invoices::{InvoiceNumber, NewInvoiceDraft},
    },
};

/// First key of the advisory lock pair guarding invoice numbering; the second key is the year.
const INVOICE_NUMBER_LOCK_NAMESPACE: i32 = 0x0049_4E56;

pub struct InvoicePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl InvoicePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Serializes numbering for `year` until the surrounding transaction ends, then reads the
/// highest issued sequence.
fn next_invoice_number(conn: &mut PgConnection, year: i32) -> QueryResult<InvoiceNumber> {
    sql_query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind::<Integer, _>(INVOICE_NUMBER_LOCK_NAMESPACE)
        .bind::<Integer, _>(year)
        .execute(conn)?;

    let max_sequence = invoices::table
        .filter(invoices::invoice_year.eq(year))
        .select(max(invoices::invoice_sequence))
        .first::<Option<i32>>(conn)?;

    Ok(InvoiceNumber::next_after(year, max_sequence))
}

/// Numbers and inserts `draft`. Must run inside a transaction so the advisory lock is
/// held until the row is committed.
pub(crate) fn insert_numbered_invoice(
    conn: &mut PgConnection,
    draft: &NewInvoiceDraft,
) -> QueryResult<InvoiceEntity> {
    let line_items = serde_json::to_value(&draft.line_items)
        .map_err(|err| DieselError::SerializationError(Box::new(err)))?;
    let number = next_invoice_number(conn, Utc::now().year())?;

    let insert_entity = InsertInvoiceEntity {
        tenant_id: draft.tenant_id,
        subscription_id: draft.subscription_id,
        invoice_number: number.to_string(),
        invoice_year: number.year,
        invoice_sequence: number.sequence,
        amount_minor: draft.amount_minor,
        tax_amount_minor: draft.tax_amount_minor,
        total_amount_minor: draft.total_amount_minor(),
        currency: draft.currency.to_string(),
        status: draft.status.to_string(),
        issue_date: draft.issue_date,
        due_date: draft.due_date,
        line_items,
        notes: draft.notes.clone(),
    };

    insert_into(invoices::table)
        .values(&insert_entity)
        .returning(InvoiceEntity::as_select())
        .get_result::<InvoiceEntity>(conn)
}

#[async_trait]
impl InvoiceRepository for InvoicePostgres {
    async fn create_invoice(&self, draft: NewInvoiceDraft) -> Result<InvoiceEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = conn.transaction::<InvoiceEntity, DieselError, _>(|conn| {
            insert_numbered_invoice(conn, &draft)
        })?;

        Ok(invoice)
    }

    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = invoices::table
            .find(invoice_id)
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(invoice)
    }

    async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = invoices::table
            .filter(invoices::id.eq(invoice_id))
            .filter(invoices::tenant_id.eq(tenant_id))
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(invoice)
    }

    async fn find_by_invoice_number(
        &self,
        invoice_number: String,
    ) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = invoices::table
            .filter(invoices::invoice_number.eq(invoice_number))
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(invoice)
    }

    async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = invoices::table
            .filter(invoices::tenant_id.eq(tenant_id))
            .select(InvoiceEntity::as_select())
            .order((invoices::issue_date.desc(), invoices::invoice_sequence.desc()))
            .into_boxed();

        if let Some(status) = status {
            query = query.filter(invoices::status.eq(status.as_str()));
        }

        Ok(query.load::<InvoiceEntity>(&mut conn)?)
    }
}
