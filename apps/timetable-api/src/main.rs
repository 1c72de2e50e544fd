use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetable_api::config::Config;
use timetable_api::db::kv::{KeyValueStore, MemoryStore};
use timetable_api::notify::mailer::mailer_from_config;
use timetable_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let db = timetable_api::db::pool::connect(&config.database_url, config.db_pool_size).await;

    // Access tokens and verification codes are process-local.
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let mailer = mailer_from_config(&config);

    tracing::info!(
        send_delay_ms = config.notify_send_delay.as_millis() as u64,
        "timetable-api configured"
    );

    let state = AppState::new(db, kv, config, mailer);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(timetable_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "timetable-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
