use sqlx::{postgres::PgPoolOptions, PgPool};

/// Idempotent schema bootstrap, executed statement by statement.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS data_sources (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        id BIGSERIAL PRIMARY KEY,
        full_name VARCHAR(500),
        short_name VARCHAR(255),
        inn VARCHAR(12),
        kpp VARCHAR(9),
        ogrn VARCHAR(15),
        address TEXT,
        okved VARCHAR(100),
        reg_date DATE,
        authorized_capital NUMERIC(20, 2),
        status VARCHAR(20) NOT NULL DEFAULT 'active'
            CHECK (status IN ('active', 'liquidated', 'reorganized')),
        data_source_id BIGINT NOT NULL REFERENCES data_sources (id) ON DELETE RESTRICT,
        last_checked_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS clients_inn_idx ON clients (inn)",
    "CREATE INDEX IF NOT EXISTS clients_status_idx ON clients (status)",
    "CREATE INDEX IF NOT EXISTS clients_data_source_idx ON clients (data_source_id)",
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates the `data_sources` and `clients` tables when missing.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema verified");
        Ok(())
    }
}
