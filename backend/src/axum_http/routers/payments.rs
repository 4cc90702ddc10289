use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::domain::value_objects::invoices::StatusFilterQuery;

use crate::{auth::AuthTenant, usecases::payments::PaymentProcessor};

pub fn routes(payments_usecase: Arc<PaymentProcessor>) -> Router {
    Router::new()
        .route("/", get(list_payments))
        .with_state(payments_usecase)
}

pub async fn list_payments(
    State(payments_usecase): State<Arc<PaymentProcessor>>,
    auth: AuthTenant,
    Query(filter): Query<StatusFilterQuery>,
) -> impl IntoResponse {
    match payments_usecase
        .list_payments(auth.tenant_id, filter.status)
        .await
    {
        Ok(payments) => (StatusCode::OK, Json(payments)).into_response(),
        Err(err) => err.into_response(),
    }
}
