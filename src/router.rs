use crate::errors::attach_error_detail;
use crate::handlers::{self, enforce_allowed_hosts, AppState, CLIENTS_PATH, DATA_SOURCES_PATH};
use crate::openapi::{serve_openapi_spec, serve_swagger_ui, OPENAPI_PATH};
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Request size limit: 1MB max payload
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            CLIENTS_PATH,
            get(handlers::list_clients).post(handlers::create_client),
        )
        .route(
            "/api/clients/:id/",
            get(handlers::get_client)
                .put(handlers::update_client)
                .patch(handlers::patch_client)
                .delete(handlers::delete_client),
        )
        .route(
            DATA_SOURCES_PATH,
            get(handlers::list_data_sources).post(handlers::create_data_source),
        )
        .route(
            "/api/data-sources/:id/",
            get(handlers::get_data_source).delete(handlers::delete_data_source),
        )
}

/// Builds the application router.
///
/// `/health` bypasses the Host allow-list so load balancers can probe the
/// service by IP. Internal error details are exposed only in debug mode.
pub fn build_router(state: Arc<AppState>) -> Router {
    assemble(api_routes(), state)
}

/// Same as [`build_router`], with per-IP rate limiting on the API routes.
///
/// The limiter needs the peer address, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_rate_limited_router(
    state: Arc<AppState>,
    per_second: u64,
    burst: u32,
) -> anyhow::Result<Router> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(per_second)
            .burst_size(burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );

    let api = api_routes().layer(GovernorLayer {
        config: governor_conf,
    });
    Ok(assemble(api, state))
}

fn assemble(api: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    let debug = state.config.debug;

    let guarded = Router::new()
        .route("/docs", get(serve_swagger_ui))
        .route(OPENAPI_PATH, get(serve_openapi_spec))
        .merge(api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_allowed_hosts,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(guarded)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state);

    let app = if debug {
        app.layer(middleware::map_response(attach_error_detail))
    } else {
        app
    };

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}
