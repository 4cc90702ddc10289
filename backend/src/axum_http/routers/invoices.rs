use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::value_objects::{invoices::StatusFilterQuery, payments::PayInvoiceModel};
use uuid::Uuid;

use crate::{
    auth::AuthTenant,
    usecases::{invoices::InvoiceGenerator, payments::PaymentProcessor},
};

#[derive(Clone)]
pub struct InvoicesState {
    pub invoices: Arc<InvoiceGenerator>,
    pub payments: Arc<PaymentProcessor>,
}

pub fn routes(invoices: Arc<InvoiceGenerator>, payments: Arc<PaymentProcessor>) -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/:invoice_id", get(get_invoice))
        .route("/:invoice_id/pdf", get(get_invoice_pdf))
        .route("/:invoice_id/pay", post(pay_invoice))
        .with_state(InvoicesState { invoices, payments })
}

pub async fn list_invoices(
    State(state): State<InvoicesState>,
    auth: AuthTenant,
    Query(filter): Query<StatusFilterQuery>,
) -> impl IntoResponse {
    match state.invoices.list_invoices(auth.tenant_id, filter.status).await {
        Ok(invoices) => (StatusCode::OK, Json(invoices)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_invoice(
    State(state): State<InvoicesState>,
    auth: AuthTenant,
    Path(invoice_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.invoices.get_invoice(auth.tenant_id, invoice_id).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_invoice_pdf(
    State(state): State<InvoicesState>,
    auth: AuthTenant,
    Path(invoice_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.invoices.get_invoice_pdf(auth.tenant_id, invoice_id).await {
        Ok(pdf) => (StatusCode::OK, Json(pdf)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn pay_invoice(
    State(state): State<InvoicesState>,
    auth: AuthTenant,
    Path(invoice_id): Path<Uuid>,
    pay_invoice_model: Option<Json<PayInvoiceModel>>,
) -> impl IntoResponse {
    let model = pay_invoice_model.map(|Json(model)| model).unwrap_or_default();

    match state
        .payments
        .pay_invoice(auth.tenant_id, invoice_id, model.payment_method_id)
        .await
    {
        Ok(payment) => (StatusCode::CREATED, Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}
