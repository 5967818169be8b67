use crate::db_storage::{ClientStore, DeleteOutcome};
use crate::enrichment::{discard_invalid, fill_missing, should_enrich, CompanyLookup};
use crate::errors::{AppError, FieldErrors};
use crate::models::*;
use crate::validation::{
    build_fields, validate_data_source_name, WriteMode, NOT_NULL, REQUIRED,
};
use chrono::Utc;
use std::sync::Arc;

/// A resolved `?page=` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageRequest {
    number: i64,
    last: i64,
    window: PageWindow,
}

/// Page-number pagination over a collection of `count` records.
///
/// `None` means no page was asked for and the whole collection is returned.
/// `"last"` selects the final page; anything else that is not a page number
/// in range is reported as not found.
fn page_request(
    page: Option<&str>,
    count: i64,
    page_size: usize,
) -> Result<Option<PageRequest>, AppError> {
    let Some(raw) = page else {
        return Ok(None);
    };
    let size = page_size.max(1) as i64;
    let last = ((count + size - 1) / size).max(1);

    let number = if raw.trim() == "last" {
        last
    } else {
        raw.trim()
            .parse::<i64>()
            .map_err(|_| AppError::NotFound(format!("invalid page {:?}", raw)))?
    };
    if number < 1 || number > last {
        return Err(AppError::NotFound(format!("page {} out of range", number)));
    }

    Ok(Some(PageRequest {
        number,
        last,
        window: PageWindow {
            offset: (number - 1) * size,
            limit: size,
        },
    }))
}

fn envelope<T>(
    request: Option<PageRequest>,
    count: i64,
    results: Vec<T>,
    base_path: &str,
) -> ListResponse<T> {
    let (next, previous) = match request {
        None => (None, None),
        Some(r) => {
            let next = (r.number < r.last).then(|| format!("{}?page={}", base_path, r.number + 1));
            let previous = match r.number {
                1 => None,
                2 => Some(base_path.to_string()),
                n => Some(format!("{}?page={}", base_path, n - 1)),
            };
            (next, previous)
        }
    };
    ListResponse {
        count,
        next,
        previous,
        results,
    }
}

fn invalid_pk(id: i64) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

pub struct ClientService {
    store: Arc<dyn ClientStore>,
    lookup: Arc<dyn CompanyLookup>,
    page_size: usize,
}

impl ClientService {
    pub fn new(
        store: Arc<dyn ClientStore>,
        lookup: Arc<dyn CompanyLookup>,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            lookup,
            page_size,
        }
    }

    /// Lists clients newest first, optionally one page at a time.
    pub async fn list(
        &self,
        page: Option<&str>,
        base_path: &str,
    ) -> Result<ListResponse<Client>, AppError> {
        let count = self.store.count_clients().await?;
        let request = page_request(page, count, self.page_size)?;
        let results = self.store.list_clients(request.map(|r| r.window)).await?;
        Ok(envelope(request, count, results, base_path))
    }

    pub async fn get(&self, id: i64) -> Result<Client, AppError> {
        self.store
            .get_client(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("client {}", id)))
    }

    /// Validates and stores a new client.
    ///
    /// When the referenced data source is marked for enrichment and the
    /// payload carries an INN but leaves descriptive fields unset, the
    /// company directory is consulted first. A failed lookup aborts the
    /// create before anything is written.
    pub async fn create(&self, mut payload: ClientPayload) -> Result<Client, AppError> {
        let mut errors = FieldErrors::new();
        let source = self
            .resolve_source(&payload, true, &mut errors)
            .await?;
        let source_id = source.as_ref().map_or(0, |s| s.id);

        let built = build_fields(&payload, ClientFields::new(source_id), WriteMode::Create);
        let (source, mut fields) = match (source, built) {
            (Some(source), Ok(fields)) => (source, fields),
            (_, built) => {
                if let Err(field_errors) = built {
                    errors.merge(field_errors);
                }
                return Err(AppError::Validation(errors));
            }
        };

        if let Some(inn) = should_enrich(&payload, &source).map(str::to_string) {
            tracing::info!("Enriching new client with INN {} from {}", inn, source.name);
            let mut record = self.lookup.find_by_inn(&inn).await?;

            let dropped = discard_invalid(&mut record);
            if !dropped.is_empty() {
                tracing::warn!(
                    "Ignoring directory values for INN {} that fail validation: {:?}",
                    inn,
                    dropped
                );
            }

            fill_missing(&mut payload, &record);
            fields = build_fields(&payload, ClientFields::new(source.id), WriteMode::Create)?;
            fields.last_checked_at = Some(Utc::now());
        }

        let client = self.store.insert_client(&fields).await?;
        tracing::info!("Created client {}", client.id);
        Ok(client)
    }

    /// Full update: fields missing from the payload are cleared.
    pub async fn update(&self, id: i64, payload: ClientPayload) -> Result<Client, AppError> {
        let existing = self.get(id).await?;

        let mut errors = FieldErrors::new();
        let source = self
            .resolve_source(&payload, true, &mut errors)
            .await?;
        let base = ClientFields {
            last_checked_at: existing.last_checked_at,
            ..ClientFields::new(source.as_ref().map_or(existing.data_source, |s| s.id))
        };

        let fields = match build_fields(&payload, base, WriteMode::Replace) {
            Ok(fields) if errors.is_empty() => fields,
            Ok(_) => return Err(AppError::Validation(errors)),
            Err(field_errors) => {
                errors.merge(field_errors);
                return Err(AppError::Validation(errors));
            }
        };

        self.save(id, &fields).await
    }

    /// Partial update: fields missing from the payload keep their values.
    pub async fn patch(&self, id: i64, payload: ClientPayload) -> Result<Client, AppError> {
        let existing = self.get(id).await?;

        let mut errors = FieldErrors::new();
        let mut base = ClientFields::from(&existing);
        if let Some(source) = self
            .resolve_source(&payload, false, &mut errors)
            .await?
        {
            base.data_source = source.id;
        }

        let fields = match build_fields(&payload, base, WriteMode::Patch) {
            Ok(fields) if errors.is_empty() => fields,
            Ok(_) => return Err(AppError::Validation(errors)),
            Err(field_errors) => {
                errors.merge(field_errors);
                return Err(AppError::Validation(errors));
            }
        };

        self.save(id, &fields).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        if !self.store.delete_client(id).await? {
            return Err(AppError::NotFound(format!("client {}", id)));
        }
        tracing::info!("Deleted client {}", id);
        Ok(())
    }

    async fn save(&self, id: i64, fields: &ClientFields) -> Result<Client, AppError> {
        let client = self
            .store
            .update_client(id, fields)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("client {}", id)))?;
        tracing::info!("Updated client {}", id);
        Ok(client)
    }

    /// Looks up the referenced data source, recording field errors instead of failing.
    ///
    /// An unreadable `data_source` value is already reported by `build_fields`.
    async fn resolve_source(
        &self,
        payload: &ClientPayload,
        required: bool,
        errors: &mut FieldErrors,
    ) -> Result<Option<DataSource>, AppError> {
        let id = match payload.data_source {
            Some(Some(id)) => id,
            Some(None) => {
                errors.add("data_source", NOT_NULL);
                return Ok(None);
            }
            None => {
                if required && !payload.type_errors.contains("data_source") {
                    errors.add("data_source", REQUIRED);
                }
                return Ok(None);
            }
        };
        let source = self.store.get_data_source(id).await?;
        if source.is_none() {
            errors.add("data_source", invalid_pk(id));
        }
        Ok(source)
    }
}

pub struct DataSourceService {
    store: Arc<dyn ClientStore>,
    page_size: usize,
}

impl DataSourceService {
    pub fn new(store: Arc<dyn ClientStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }

    pub async fn list(
        &self,
        page: Option<&str>,
        base_path: &str,
    ) -> Result<ListResponse<DataSource>, AppError> {
        let count = self.store.count_data_sources().await?;
        let request = page_request(page, count, self.page_size)?;
        let results = self
            .store
            .list_data_sources(request.map(|r| r.window))
            .await?;
        Ok(envelope(request, count, results, base_path))
    }

    pub async fn get(&self, id: i64) -> Result<DataSource, AppError> {
        self.store
            .get_data_source(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("data source {}", id)))
    }

    pub async fn create(&self, payload: DataSourcePayload) -> Result<DataSource, AppError> {
        let mut errors = FieldErrors::new();
        let name = match payload.name {
            None => {
                errors.add("name", REQUIRED);
                String::new()
            }
            Some(name) => {
                if let Err(message) = validate_data_source_name(&name) {
                    errors.add("name", message);
                }
                name.trim().to_string()
            }
        };
        errors.into_result()?;

        let source = self.store.insert_data_source(&name).await?;
        tracing::info!("Created data source {} ({})", source.id, source.name);
        Ok(source)
    }

    /// Deletes an unused data source; sources still referenced by clients are kept.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        match self.store.delete_data_source(id).await? {
            DeleteOutcome::Deleted => {
                tracing::info!("Deleted data source {}", id);
                Ok(())
            }
            DeleteOutcome::NotFound => Err(AppError::NotFound(format!("data source {}", id))),
            DeleteOutcome::InUse => Err(AppError::Conflict(format!(
                "Data source {} is referenced by existing clients",
                id
            ))),
        }
    }
}
