use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch},
};
use crates::domain::value_objects::payment_methods::CreatePaymentMethodModel;
use uuid::Uuid;

use crate::{auth::AuthTenant, usecases::payment_methods::PaymentMethodUseCase};

pub fn routes(payment_methods_usecase: Arc<PaymentMethodUseCase>) -> Router {
    Router::new()
        .route(
            "/",
            get(list_payment_methods).post(create_payment_method),
        )
        .route("/:payment_method_id", delete(delete_payment_method))
        .route("/:payment_method_id/set-default", patch(set_default_payment_method))
        .with_state(payment_methods_usecase)
}

pub async fn list_payment_methods(
    State(payment_methods_usecase): State<Arc<PaymentMethodUseCase>>,
    auth: AuthTenant,
) -> impl IntoResponse {
    match payment_methods_usecase
        .list_payment_methods(auth.tenant_id)
        .await
    {
        Ok(methods) => (StatusCode::OK, Json(methods)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn create_payment_method(
    State(payment_methods_usecase): State<Arc<PaymentMethodUseCase>>,
    auth: AuthTenant,
    Json(create_payment_method_model): Json<CreatePaymentMethodModel>,
) -> impl IntoResponse {
    match payment_methods_usecase
        .create_payment_method(auth.tenant_id, create_payment_method_model)
        .await
    {
        Ok(method) => (StatusCode::CREATED, Json(method)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn delete_payment_method(
    State(payment_methods_usecase): State<Arc<PaymentMethodUseCase>>,
    auth: AuthTenant,
    Path(payment_method_id): Path<Uuid>,
) -> impl IntoResponse {
    match payment_methods_usecase
        .delete_payment_method(auth.tenant_id, payment_method_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn set_default_payment_method(
    State(payment_methods_usecase): State<Arc<PaymentMethodUseCase>>,
    auth: AuthTenant,
    Path(payment_method_id): Path<Uuid>,
) -> impl IntoResponse {
    match payment_methods_usecase
        .set_default_payment_method(auth.tenant_id, payment_method_id)
        .await
    {
        Ok(method) => (StatusCode::OK, Json(method)).into_response(),
        Err(err) => err.into_response(),
    }
}
