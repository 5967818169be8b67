//! In-process [`ClientStore`] used by tests and database-less local runs.

use crate::db_storage::{ClientStore, DeleteOutcome};
use crate::errors::AppError;
use crate::models::{Client, ClientFields, DataSource, PageWindow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_client_id: i64,
    next_source_id: i64,
    clients: BTreeMap<i64, Client>,
    sources: BTreeMap<i64, DataSource>,
}

/// [`ClientStore`] keeping everything in memory behind a single lock.
#[derive(Default)]
pub struct MemoryClientStore {
    state: RwLock<State>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_window<T: Clone>(items: Vec<T>, window: Option<PageWindow>) -> Vec<T> {
    match window {
        None => items,
        Some(w) => items
            .into_iter()
            .skip(w.offset.max(0) as usize)
            .take(w.limit.max(0) as usize)
            .collect(),
    }
}

fn client_from_fields(
    id: i64,
    fields: &ClientFields,
    source: &DataSource,
    created_at: chrono::DateTime<Utc>,
) -> Client {
    Client {
        id,
        full_name: fields.full_name.clone(),
        short_name: fields.short_name.clone(),
        inn: fields.inn.clone(),
        kpp: fields.kpp.clone(),
        ogrn: fields.ogrn.clone(),
        address: fields.address.clone(),
        okved: fields.okved.clone(),
        reg_date: fields.reg_date,
        authorized_capital: fields.authorized_capital.clone(),
        status: fields.status,
        data_source: source.id,
        data_source_name: source.name.clone(),
        last_checked_at: fields.last_checked_at,
        created_at,
        updated_at: Utc::now(),
    }
}

fn missing_source(id: i64) -> AppError {
    AppError::InternalError(format!("data source {} does not exist", id))
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn count_clients(&self) -> Result<i64, AppError> {
        Ok(self.state.read().await.clients.len() as i64)
    }

    async fn list_clients(&self, window: Option<PageWindow>) -> Result<Vec<Client>, AppError> {
        let state = self.state.read().await;
        let mut clients: Vec<Client> = state.clients.values().cloned().collect();
        clients.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(apply_window(clients, window))
    }

    async fn get_client(&self, id: i64) -> Result<Option<Client>, AppError> {
        Ok(self.state.read().await.clients.get(&id).cloned())
    }

    async fn insert_client(&self, fields: &ClientFields) -> Result<Client, AppError> {
        let mut state = self.state.write().await;
        let source = state
            .sources
            .get(&fields.data_source)
            .cloned()
            .ok_or_else(|| missing_source(fields.data_source))?;

        state.next_client_id += 1;
        let id = state.next_client_id;
        let now = Utc::now();
        let mut client = client_from_fields(id, fields, &source, now);
        client.updated_at = now;
        state.clients.insert(id, client.clone());
        Ok(client)
    }

    async fn update_client(
        &self,
        id: i64,
        fields: &ClientFields,
    ) -> Result<Option<Client>, AppError> {
        let mut state = self.state.write().await;
        let Some(created_at) = state.clients.get(&id).map(|c| c.created_at) else {
            return Ok(None);
        };
        let source = state
            .sources
            .get(&fields.data_source)
            .cloned()
            .ok_or_else(|| missing_source(fields.data_source))?;

        let client = client_from_fields(id, fields, &source, created_at);
        state.clients.insert(id, client.clone());
        Ok(Some(client))
    }

    async fn delete_client(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state.write().await.clients.remove(&id).is_some())
    }

    async fn count_data_sources(&self) -> Result<i64, AppError> {
        Ok(self.state.read().await.sources.len() as i64)
    }

    async fn list_data_sources(
        &self,
        window: Option<PageWindow>,
    ) -> Result<Vec<DataSource>, AppError> {
        let state = self.state.read().await;
        let mut sources: Vec<DataSource> = state.sources.values().cloned().collect();
        sources.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(apply_window(sources, window))
    }

    async fn get_data_source(&self, id: i64) -> Result<Option<DataSource>, AppError> {
        Ok(self.state.read().await.sources.get(&id).cloned())
    }

    async fn insert_data_source(&self, name: &str) -> Result<DataSource, AppError> {
        let mut state = self.state.write().await;
        state.next_source_id += 1;
        let now = Utc::now();
        let source = DataSource {
            id: state.next_source_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn delete_data_source(&self, id: i64) -> Result<DeleteOutcome, AppError> {
        let mut state = self.state.write().await;
        if !state.sources.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        if state.clients.values().any(|c| c.data_source == id) {
            return Ok(DeleteOutcome::InUse);
        }
        state.sources.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }
}
