use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use crates::domain::value_objects::enums::gateways::GatewayKind;
use serde_json::json;

use crate::usecases::webhooks::WebhookReconciler;

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
const ASAAS_TOKEN_HEADER: &str = "asaas-access-token";

/// Unauthenticated at the transport layer; each gateway's signature is checked inside the
/// reconciler.
pub fn routes(webhooks_usecase: Arc<WebhookReconciler>) -> Router {
    Router::new()
        .route("/stripe", post(stripe_webhook))
        .route("/asaas", post(asaas_webhook))
        .with_state(webhooks_usecase)
}

pub async fn stripe_webhook(
    State(webhooks_usecase): State<Arc<WebhookReconciler>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    receive(webhooks_usecase, GatewayKind::Stripe, &headers, STRIPE_SIGNATURE_HEADER, body).await
}

pub async fn asaas_webhook(
    State(webhooks_usecase): State<Arc<WebhookReconciler>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    receive(webhooks_usecase, GatewayKind::Asaas, &headers, ASAAS_TOKEN_HEADER, body).await
}

async fn receive(
    webhooks_usecase: Arc<WebhookReconciler>,
    gateway: GatewayKind,
    headers: &HeaderMap,
    signature_header: &str,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers
        .get(signature_header)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match webhooks_usecase
        .handle_inbound_event(gateway, &body, signature)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(err) => err.into_response(),
    }
}
