#![allow(dead_code, unused)]
use anyhow::Context;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Extension;
use axum::Router;
use dotenvy::dotenv;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod utils;
mod workflow;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::notification::NotificationDoc;
use crate::db::queries::outbox::OutboxDoc;
use crate::db::queries::policy::PolicyDoc;
use crate::db::queries::requests::RequestDoc;
use crate::db::queries::routing_rule::RoutingRuleDoc;
use crate::db::queries::team::TeamDoc;
use crate::db::queries::user::UserDoc;
use crate::middleware::auth::{create_permission_cache, jwt_middleware, rbac_middleware};
use crate::utils::mailer::Mailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").context("Failed to create logs directory")?;
    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(true)
        .with_writer(non_blocking)
        .init();

    let permission_cache = create_permission_cache();
    let pool = db::pool::get_db_pool().await;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let merged_doc = AuthDoc::openapi()
        .merge_from(RequestDoc::openapi())
        .merge_from(RoutingRuleDoc::openapi())
        .merge_from(PolicyDoc::openapi())
        .merge_from(TeamDoc::openapi())
        .merge_from(UserDoc::openapi())
        .merge_from(NotificationDoc::openapi())
        .merge_from(OutboxDoc::openapi());

    // Public routes (health, auth, tokenized email approval)
    let public_routes = Router::new()
        .merge(api::auth::auth_routes())
        .merge(api::email_approval::email_approval_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::requests::request_routes())
        .merge(api::routing_rules::routing_routes())
        .merge(api::team::team_routes())
        .merge(api::user::user_routes())
        .merge(api::notification::notification_routes())
        .merge(api::notification::outbox_routes())
        .merge(api::auth::secure_auth_routes())
        .route_layer(from_fn_with_state(pool.clone(), rbac_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(permission_cache.clone()))
        .layer(Extension(Mailer::new()))
        .with_state(pool.clone());

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let is_running = Arc::new(AtomicBool::new(true));

    let server_task = tokio::spawn(run_server(
        app,
        shutdown_tx.clone(),
        pool.clone(),
        is_running.clone(),
    ));

    tokio::select! {
        _ = server_task => println!("Server task finished."),
        _ = shutdown_signal(shutdown_tx.subscribe(), pool.clone(), is_running.clone()) => (),
    }
    println!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal(
    mut shutdown_rx: broadcast::Receiver<()>,
    pool: PgPool,
    is_running: Arc<AtomicBool>,
) {
    tokio::select! {
        _ = signal::ctrl_c() => println!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => println!("Received shutdown signal."),
    }
    println!("🛠️ Closing database pool...");
    pool.close().await;
    println!("✅ Database pool closed. Server shutting down.");
    is_running.store(false, Ordering::Relaxed);
}

async fn run_server(
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
    pool: PgPool,
    is_running: Arc<AtomicBool>,
) {
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("Server running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    let shutdown_signal = shutdown_signal(shutdown_tx.subscribe(), pool.clone(), is_running.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .expect("Server encountered an error");
}
