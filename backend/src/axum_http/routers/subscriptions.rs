use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use crates::domain::value_objects::subscriptions::{
    CancelSubscriptionModel, CreateSubscriptionModel, UpgradeSubscriptionModel,
};

use crate::{auth::AuthTenant, usecases::subscriptions::SubscriptionLifecycle};

pub fn routes(subscriptions_usecase: Arc<SubscriptionLifecycle>) -> Router {
    Router::new()
        .route("/", post(create_subscription))
        .route("/me", get(current_subscription))
        .route("/upgrade", patch(upgrade_subscription))
        .route("/cancel", patch(cancel_subscription))
        .with_state(subscriptions_usecase)
}

pub async fn current_subscription(
    State(subscriptions_usecase): State<Arc<SubscriptionLifecycle>>,
    auth: AuthTenant,
) -> impl IntoResponse {
    match subscriptions_usecase
        .get_current_subscription(auth.tenant_id)
        .await
    {
        Ok(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn create_subscription(
    State(subscriptions_usecase): State<Arc<SubscriptionLifecycle>>,
    auth: AuthTenant,
    Json(create_subscription_model): Json<CreateSubscriptionModel>,
) -> impl IntoResponse {
    match subscriptions_usecase
        .create_subscription(auth.tenant_id, create_subscription_model)
        .await
    {
        Ok(subscription) => (StatusCode::CREATED, Json(subscription)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn upgrade_subscription(
    State(subscriptions_usecase): State<Arc<SubscriptionLifecycle>>,
    auth: AuthTenant,
    Json(upgrade_subscription_model): Json<UpgradeSubscriptionModel>,
) -> impl IntoResponse {
    match subscriptions_usecase
        .upgrade_subscription(auth.tenant_id, upgrade_subscription_model)
        .await
    {
        Ok(upgraded) => (StatusCode::OK, Json(upgraded)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn cancel_subscription(
    State(subscriptions_usecase): State<Arc<SubscriptionLifecycle>>,
    auth: AuthTenant,
    cancel_subscription_model: Option<Json<CancelSubscriptionModel>>,
) -> impl IntoResponse {
    let model = cancel_subscription_model
        .map(|Json(model)| model)
        .unwrap_or_default();

    match subscriptions_usecase
        .cancel_subscription(auth.tenant_id, model)
        .await
    {
        Ok(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
        Err(err) => err.into_response(),
    }
}
