use legal_entities_api::config::Config;
use legal_entities_api::dadata_client::DaDataClient;
use legal_entities_api::db::Database;
use legal_entities_api::db_storage::PgClientStore;
use legal_entities_api::handlers::AppState;
use legal_entities_api::router::build_rate_limited_router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is not set.
fn default_log_filter() -> &'static str {
    let debug = std::env::var("DEBUG")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false);
    if debug {
        "legal_entities_api=debug,tower_http=debug"
    } else {
        "legal_entities_api=info,tower_http=info"
    }
}

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection and schema bootstrap.
/// - The DaData lookup client.
/// - HTTP routes and middleware (Host check, CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connection pool established");
    db.ensure_schema().await?;

    let store = Arc::new(PgClientStore::new(db.pool.clone()));
    let lookup = Arc::new(DaDataClient::new(&config)?);
    tracing::info!("DaData client initialized: {}", config.dadata_base_url);

    let addr = format!("0.0.0.0:{}", config.port);
    let (per_second, burst) = (config.rate_limit_per_second, config.rate_limit_burst);
    let app_state = Arc::new(AppState::new(config, store, lookup));

    // Rate limiting applies to /api routes only; /health stays open for probes
    let app = build_rate_limited_router(app_state, per_second, burst)?;

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
