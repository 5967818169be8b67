use crate::config::Config;
use crate::db_storage::ClientStore;
use crate::enrichment::CompanyLookup;
use crate::errors::AppError;
use crate::models::*;
use crate::services::{ClientService, DataSourceService};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;

pub const CLIENTS_PATH: &str = "/api/clients/";
pub const DATA_SOURCES_PATH: &str = "/api/data-sources/";

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    pub clients: ClientService,
    pub data_sources: DataSourceService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ClientStore>,
        lookup: Arc<dyn CompanyLookup>,
    ) -> Self {
        let page_size = config.page_size;
        Self {
            clients: ClientService::new(store.clone(), lookup, page_size),
            data_sources: DataSourceService::new(store, page_size),
            config,
        }
    }
}

/// Path ids that are not integers address nothing.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::NotFound(format!("no record with id {:?}", raw)))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Rejects requests whose Host header is not in `ALLOWED_HOSTS`.
pub async fn enforce_allowed_hosts(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_string();

    if !state.config.is_host_allowed(&host) {
        return Err(AppError::InvalidHost(host));
    }
    Ok(next.run(request).await)
}

/// Health check endpoint.
///
/// Returns the service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "legal-entities-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/clients/
///
/// Lists clients newest first. Without `?page=` every record is returned.
#[utoipa::path(
    get,
    path = "/api/clients/",
    tag = "clients",
    params(ListParams),
    responses(
        (status = 200, description = "Clients", body = ClientList),
        (status = 404, description = "Page out of range")
    )
)]
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<Client>>, AppError> {
    tracing::info!("GET {} - page: {:?}", CLIENTS_PATH, params.page);
    let list = state
        .clients
        .list(params.page.as_deref(), CLIENTS_PATH)
        .await?;
    Ok(Json(list))
}

/// POST /api/clients/
///
/// Creates a client, enriching it from the company directory when the
/// referenced data source asks for it.
///
/// # Returns
///
/// * `201 Created` with the stored record, `400` on validation errors or an
///   unknown INN, `502` when the directory cannot be reached.
#[utoipa::path(
    post,
    path = "/api/clients/",
    tag = "clients",
    request_body = ClientPayload,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 400, description = "Validation failed or INN unknown to the directory"),
        (status = 502, description = "Company directory unavailable")
    )
)]
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClientPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let payload = json_body(payload)?;
    tracing::info!("POST {} - data_source: {:?}", CLIENTS_PATH, payload.data_source);

    let client = state.clients.create(payload).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}/",
    tag = "clients",
    params(("id" = i64, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client", body = Client),
        (status = 404, description = "No such client")
    )
)]
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Client>, AppError> {
    tracing::info!("GET {}{}/", CLIENTS_PATH, id);
    let client = state.clients.get(parse_id(&id)?).await?;
    Ok(Json(client))
}

/// PUT /api/clients/{id}/
///
/// Full update; fields left out of the body are cleared.
#[utoipa::path(
    put,
    path = "/api/clients/{id}/",
    tag = "clients",
    params(("id" = i64, Path, description = "Client id")),
    request_body = ClientPayload,
    responses(
        (status = 200, description = "Client updated", body = Client),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No such client")
    )
)]
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ClientPayload>, JsonRejection>,
) -> Result<Json<Client>, AppError> {
    tracing::info!("PUT {}{}/", CLIENTS_PATH, id);
    let id = parse_id(&id)?;
    let payload = json_body(payload)?;
    let client = state.clients.update(id, payload).await?;
    Ok(Json(client))
}

/// PATCH /api/clients/{id}/
///
/// Partial update; only fields present in the body change.
#[utoipa::path(
    patch,
    path = "/api/clients/{id}/",
    tag = "clients",
    params(("id" = i64, Path, description = "Client id")),
    request_body = ClientPayload,
    responses(
        (status = 200, description = "Client updated", body = Client),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No such client")
    )
)]
pub async fn patch_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ClientPayload>, JsonRejection>,
) -> Result<Json<Client>, AppError> {
    tracing::info!("PATCH {}{}/", CLIENTS_PATH, id);
    let id = parse_id(&id)?;
    let payload = json_body(payload)?;
    let client = state.clients.patch(id, payload).await?;
    Ok(Json(client))
}

#[utoipa::path(
    delete,
    path = "/api/clients/{id}/",
    tag = "clients",
    params(("id" = i64, Path, description = "Client id")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 404, description = "No such client")
    )
)]
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE {}{}/", CLIENTS_PATH, id);
    state.clients.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/data-sources/",
    tag = "data-sources",
    params(ListParams),
    responses(
        (status = 200, description = "Data sources", body = DataSourceList),
        (status = 404, description = "Page out of range")
    )
)]
pub async fn list_data_sources(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<DataSource>>, AppError> {
    tracing::info!("GET {} - page: {:?}", DATA_SOURCES_PATH, params.page);
    let list = state
        .data_sources
        .list(params.page.as_deref(), DATA_SOURCES_PATH)
        .await?;
    Ok(Json(list))
}

/// POST /api/data-sources/
///
/// Registers a data source. A source named `DaData` turns on enrichment for
/// clients created against it.
#[utoipa::path(
    post,
    path = "/api/data-sources/",
    tag = "data-sources",
    request_body = DataSourcePayload,
    responses(
        (status = 201, description = "Data source created", body = DataSource),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_data_source(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DataSourcePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<DataSource>), AppError> {
    let payload = json_body(payload)?;
    tracing::info!("POST {} - name: {:?}", DATA_SOURCES_PATH, payload.name);

    let source = state.data_sources.create(payload).await?;
    Ok((StatusCode::CREATED, Json(source)))
}

#[utoipa::path(
    get,
    path = "/api/data-sources/{id}/",
    tag = "data-sources",
    params(("id" = i64, Path, description = "Data source id")),
    responses(
        (status = 200, description = "Data source", body = DataSource),
        (status = 404, description = "No such data source")
    )
)]
pub async fn get_data_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DataSource>, AppError> {
    tracing::info!("GET {}{}/", DATA_SOURCES_PATH, id);
    let source = state.data_sources.get(parse_id(&id)?).await?;
    Ok(Json(source))
}

/// DELETE /api/data-sources/{id}/
///
/// Fails with `409 Conflict` while clients still reference the source.
#[utoipa::path(
    delete,
    path = "/api/data-sources/{id}/",
    tag = "data-sources",
    params(("id" = i64, Path, description = "Data source id")),
    responses(
        (status = 204, description = "Data source deleted"),
        (status = 404, description = "No such data source"),
        (status = 409, description = "Data source still in use")
    )
)]
pub async fn delete_data_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE {}{}/", DATA_SOURCES_PATH, id);
    state.data_sources.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
