use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::{auth::AuthTenant, usecases::subscriptions::SubscriptionLifecycle};

pub fn routes(subscriptions_usecase: Arc<SubscriptionLifecycle>) -> Router {
    Router::new()
        .route("/", get(list_plans))
        .with_state(subscriptions_usecase)
}

pub async fn list_plans(
    State(subscriptions_usecase): State<Arc<SubscriptionLifecycle>>,
    auth: AuthTenant,
) -> impl IntoResponse {
    match subscriptions_usecase.list_plans(auth.tenant_id).await {
        Ok(plans) => (StatusCode::OK, Json(plans)).into_response(),
        Err(err) => err.into_response(),
    }
}
