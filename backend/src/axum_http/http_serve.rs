use crate::{
    axum_http::{
        default_routers,
        routers::{self, BillingUseCases},
    },
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::infra::db::postgres::postgres_connection::PgPoolSquad;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub fn billing_router(usecases: BillingUseCases) -> Router {
    Router::new()
        .nest(
            "/plans",
            routers::plans::routes(Arc::clone(&usecases.subscriptions)),
        )
        .nest(
            "/subscriptions",
            routers::subscriptions::routes(Arc::clone(&usecases.subscriptions)),
        )
        .nest(
            "/invoices",
            routers::invoices::routes(
                Arc::clone(&usecases.invoices),
                Arc::clone(&usecases.payments),
            ),
        )
        .nest(
            "/payments",
            routers::payments::routes(Arc::clone(&usecases.payments)),
        )
        .nest(
            "/payment-methods",
            routers::payment_methods::routes(Arc::clone(&usecases.payment_methods)),
        )
        .nest(
            "/webhooks",
            routers::webhooks::routes(Arc::clone(&usecases.webhooks)),
        )
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let usecases = BillingUseCases::build(&config, db_pool)?;

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1/billing", billing_router(usecases))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        port = config.backend_server.port,
        stage = %config.stage,
        "billing backend is listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
