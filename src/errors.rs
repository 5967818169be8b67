use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// Field-level validation messages, keyed by the JSON field name.
///
/// Serializes as `{"inn": ["..."], "kpp": ["..."]}` so API consumers can
/// attach messages to form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Messages recorded for `field`, empty if none.
    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Failure modes of the external company lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    /// No API key configured for the provider.
    NotConfigured,
    /// The provider did not answer within the configured timeout.
    Timeout,
    /// Connection-level failure.
    Transport(String),
    /// The provider answered with a non-success status code.
    Status(u16),
    /// The provider answered with a body we could not decode.
    Decode(String),
    /// The provider has no record for the given tax id.
    NoMatch(String),
}

impl fmt::Display for EnrichmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentError::NotConfigured => write!(f, "company lookup is not configured"),
            EnrichmentError::Timeout => write!(f, "company lookup timed out"),
            EnrichmentError::Transport(msg) => write!(f, "company lookup request failed: {}", msg),
            EnrichmentError::Status(code) => {
                write!(f, "company lookup returned status {}", code)
            }
            EnrichmentError::Decode(msg) => {
                write!(f, "company lookup returned an unreadable response: {}", msg)
            }
            EnrichmentError::NoMatch(inn) => write!(f, "no company found for inn {}", inn),
        }
    }
}

impl std::error::Error for EnrichmentError {}

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found error.
    NotFound(String),
    /// One or more fields failed validation.
    Validation(FieldErrors),
    /// Bad request error (unreadable input).
    BadRequest(String),
    /// The request conflicts with existing data.
    Conflict(String),
    /// External company lookup failed; the triggering write was aborted.
    Enrichment(EnrichmentError),
    /// The Host header is not in the allow-list.
    InvalidHost(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Validation(errors) => write!(f, "Validation failed: {}", errors),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Enrichment(e) => write!(f, "Enrichment error: {}", e),
            AppError::InvalidHost(host) => write!(f, "Invalid Host header: {}", host),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::InvalidHost(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Enrichment(EnrichmentError::NoMatch(_)) => StatusCode::BAD_REQUEST,
            AppError::Enrichment(_) => StatusCode::BAD_GATEWAY,
            AppError::WithContext { source, .. } => source.status_code(),
        }
    }
}

/// Internal failure detail carried in response extensions.
///
/// Only surfaced to callers when [`attach_error_detail`] is layered onto the
/// router, which happens in debug mode.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub error: &'static str,
    pub detail: String,
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (body, detail) = match self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                let error = "Database error";
                let detail = ErrorDetail {
                    error,
                    detail: e.to_string(),
                };
                (json!({ "error": error }), Some(detail))
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                let error = "Internal server error";
                let detail = ErrorDetail { error, detail: msg };
                (json!({ "error": error }), Some(detail))
            }
            AppError::NotFound(msg) => {
                tracing::debug!("Not found: {}", msg);
                (json!({ "detail": "Not found." }), None)
            }
            AppError::Validation(errors) => {
                tracing::info!("Validation failed: {}", errors);
                return (status, Json(errors)).into_response();
            }
            AppError::BadRequest(msg) => (json!({ "error": msg }), None),
            AppError::Conflict(msg) => (json!({ "error": msg }), None),
            AppError::Enrichment(e) => {
                tracing::warn!("Enrichment failed: {}", e);
                let body = json!({ "error": "enrichment_failed", "detail": e.to_string() });
                (body, None)
            }
            AppError::InvalidHost(host) => {
                tracing::warn!("Rejected request for host {:?}", host);
                (json!({ "error": "Invalid Host header" }), None)
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.into_response();
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(detail);
        }
        response
    }
}

/// Rewrites server-error bodies to include the internal failure detail.
pub async fn attach_error_detail(mut response: Response) -> Response {
    match response.extensions_mut().remove::<ErrorDetail>() {
        Some(ErrorDetail { error, detail }) => {
            let status = response.status();
            (status, Json(json!({ "error": error, "detail": detail }))).into_response()
        }
        None => response,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<EnrichmentError> for AppError {
    fn from(err: EnrichmentError) -> Self {
        AppError::Enrichment(err)
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}
