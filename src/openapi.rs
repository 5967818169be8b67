use crate::handlers;
use crate::models::*;
use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use utoipa::OpenApi;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Legal Entities API",
        description = "CRUD over legal-entity client records with optional enrichment by INN"
    ),
    paths(
        handlers::health,
        handlers::list_clients,
        handlers::create_client,
        handlers::get_client,
        handlers::update_client,
        handlers::patch_client,
        handlers::delete_client,
        handlers::list_data_sources,
        handlers::create_data_source,
        handlers::get_data_source,
        handlers::delete_data_source,
    ),
    components(schemas(
        Client,
        ClientStatus,
        ClientPayload,
        ClientList,
        DataSource,
        DataSourcePayload,
        DataSourceList,
        HealthResponse,
    )),
    tags(
        (name = "clients", description = "Legal-entity records"),
        (name = "data-sources", description = "Origins of client data"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// Serves the generated OpenAPI document.
pub async fn serve_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Serves the Swagger UI HTML page.
///
/// The page loads its assets from unpkg and renders the document served by
/// [`serve_openapi_spec`].
pub async fn serve_swagger_ui() -> impl IntoResponse {
    let html = format!(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Legal Entities API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body {{ margin: 0; padding: 0; }}
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {{
            window.ui = SwaggerUIBundle({{
                url: "{OPENAPI_PATH}",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            }});
        }};
    </script>
</body>
</html>
"#
    );
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/clients/",
            "/api/clients/{id}/",
            "/api/data-sources/",
            "/api/data-sources/{id}/",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("Client"));
        assert!(schemas.contains_key("ClientList"));
    }
}
