use crate::errors::{AppError, ResultExt};
use crate::models::{Client, ClientFields, DataSource, PageWindow};
use async_trait::async_trait;
use sqlx::PgPool;

/// Outcome of deleting a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Clients still reference the row.
    InUse,
}

/// Persistence of clients and data sources.
///
/// Every method is a single statement against the backing store; callers
/// never compose them into transactions. Lists are ordered newest first.
#[async_trait]
pub trait ClientStore: Send + Sync {
    // ── Clients ──

    async fn count_clients(&self) -> Result<i64, AppError>;
    async fn list_clients(&self, window: Option<PageWindow>) -> Result<Vec<Client>, AppError>;
    async fn get_client(&self, id: i64) -> Result<Option<Client>, AppError>;
    async fn insert_client(&self, fields: &ClientFields) -> Result<Client, AppError>;
    /// Overwrites every writable column and bumps `updated_at`.
    /// Returns `None` when the row does not exist.
    async fn update_client(&self, id: i64, fields: &ClientFields)
        -> Result<Option<Client>, AppError>;
    /// Returns whether a row was removed.
    async fn delete_client(&self, id: i64) -> Result<bool, AppError>;

    // ── Data sources ──

    async fn count_data_sources(&self) -> Result<i64, AppError>;
    async fn list_data_sources(
        &self,
        window: Option<PageWindow>,
    ) -> Result<Vec<DataSource>, AppError>;
    async fn get_data_source(&self, id: i64) -> Result<Option<DataSource>, AppError>;
    async fn insert_data_source(&self, name: &str) -> Result<DataSource, AppError>;
    async fn delete_data_source(&self, id: i64) -> Result<DeleteOutcome, AppError>;
}

const CLIENT_COLUMNS: &str = r#"
    c.id, c.full_name, c.short_name, c.inn, c.kpp, c.ogrn, c.address, c.okved,
    c.reg_date, c.authorized_capital, c.status, c.data_source_id AS data_source,
    d.name AS data_source_name, c.last_checked_at, c.created_at, c.updated_at
"#;

/// Postgres-backed [`ClientStore`].
#[derive(Clone)]
pub struct PgClientStore {
    pool: PgPool,
}

impl PgClientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientStore for PgClientStore {
    async fn count_clients(&self) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients")
            .fetch_one(&self.pool)
            .await
            .context("counting clients")
    }

    async fn list_clients(&self, window: Option<PageWindow>) -> Result<Vec<Client>, AppError> {
        let (limit, offset) = match window {
            Some(w) => (Some(w.limit), w.offset),
            None => (None, 0),
        };
        let sql = format!(
            "SELECT {CLIENT_COLUMNS}
             FROM clients c JOIN data_sources d ON d.id = c.data_source_id
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT $1 OFFSET $2"
        );
        // LIMIT NULL means no limit in Postgres
        sqlx::query_as::<_, Client>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("listing clients")
    }

    async fn get_client(&self, id: i64) -> Result<Option<Client>, AppError> {
        let sql = format!(
            "SELECT {CLIENT_COLUMNS}
             FROM clients c JOIN data_sources d ON d.id = c.data_source_id
             WHERE c.id = $1"
        );
        sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("loading client {}", id))
    }

    async fn insert_client(&self, fields: &ClientFields) -> Result<Client, AppError> {
        let sql = format!(
            "WITH c AS (
                INSERT INTO clients (
                    full_name, short_name, inn, kpp, ogrn, address, okved, reg_date,
                    authorized_capital, status, data_source_id, last_checked_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING *
             )
             SELECT {CLIENT_COLUMNS}
             FROM c JOIN data_sources d ON d.id = c.data_source_id"
        );
        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(&fields.full_name)
            .bind(&fields.short_name)
            .bind(&fields.inn)
            .bind(&fields.kpp)
            .bind(&fields.ogrn)
            .bind(&fields.address)
            .bind(&fields.okved)
            .bind(fields.reg_date)
            .bind(&fields.authorized_capital)
            .bind(fields.status.as_str())
            .bind(fields.data_source)
            .bind(fields.last_checked_at)
            .fetch_one(&self.pool)
            .await
            .context("inserting client")?;

        tracing::debug!("Inserted client {}", client.id);
        Ok(client)
    }

    async fn update_client(
        &self,
        id: i64,
        fields: &ClientFields,
    ) -> Result<Option<Client>, AppError> {
        let sql = format!(
            "WITH c AS (
                UPDATE clients SET
                    full_name = $2, short_name = $3, inn = $4, kpp = $5, ogrn = $6,
                    address = $7, okved = $8, reg_date = $9, authorized_capital = $10,
                    status = $11, data_source_id = $12, last_checked_at = $13,
                    updated_at = now()
                WHERE id = $1
                RETURNING *
             )
             SELECT {CLIENT_COLUMNS}
             FROM c JOIN data_sources d ON d.id = c.data_source_id"
        );
        sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .bind(&fields.full_name)
            .bind(&fields.short_name)
            .bind(&fields.inn)
            .bind(&fields.kpp)
            .bind(&fields.ogrn)
            .bind(&fields.address)
            .bind(&fields.okved)
            .bind(fields.reg_date)
            .bind(&fields.authorized_capital)
            .bind(fields.status.as_str())
            .bind(fields.data_source)
            .bind(fields.last_checked_at)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("updating client {}", id))
    }

    async fn delete_client(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("deleting client {}", id))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_data_sources(&self) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM data_sources")
            .fetch_one(&self.pool)
            .await
            .context("counting data sources")
    }

    async fn list_data_sources(
        &self,
        window: Option<PageWindow>,
    ) -> Result<Vec<DataSource>, AppError> {
        let (limit, offset) = match window {
            Some(w) => (Some(w.limit), w.offset),
            None => (None, 0),
        };
        sqlx::query_as::<_, DataSource>(
            "SELECT id, name, created_at, updated_at FROM data_sources
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("listing data sources")
    }

    async fn get_data_source(&self, id: i64) -> Result<Option<DataSource>, AppError> {
        sqlx::query_as::<_, DataSource>(
            "SELECT id, name, created_at, updated_at FROM data_sources WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading data source {}", id))
    }

    async fn insert_data_source(&self, name: &str) -> Result<DataSource, AppError> {
        sqlx::query_as::<_, DataSource>(
            "INSERT INTO data_sources (name) VALUES ($1)
             RETURNING id, name, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .context("inserting data source")
    }

    async fn delete_data_source(&self, id: i64) -> Result<DeleteOutcome, AppError> {
        let result = sqlx::query("DELETE FROM data_sources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => Ok(DeleteOutcome::Deleted),
            Ok(_) => Ok(DeleteOutcome::NotFound),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Ok(DeleteOutcome::InUse)
            }
            Err(e) => Err(e).with_context(|| format!("deleting data source {}", id)),
        }
    }
}
