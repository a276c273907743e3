use crate::config::DatabaseConfig;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

/// One row of the tenant->host mapping as stored in the backing store.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct TenantRow {
    pub tenant_id: String,
    pub host: String,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Backing store seam for the registry. A refresh consumes the full
/// result set; incremental loading is intentionally not part of the
/// contract.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn load_tenants(&self) -> Result<Vec<TenantRow>, StoreError>;
}

/// Postgres-backed tenant store. The pool is owned here with an explicit
/// lifecycle: connected at startup, closed on shutdown.
pub struct PostgresTenantStore {
    pool: PgPool,
    query: String,
}

impl PostgresTenantStore {
    /// Connects to Postgres and verifies the connection by acquiring once.
    /// Startup treats a failure here as fatal; there is no degraded
    /// serve-without-registry mode.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name);

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        pool.acquire().await?;

        Ok(PostgresTenantStore {
            pool,
            query: format!("SELECT tenant_id, host FROM {}", config.table),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TenantStore for PostgresTenantStore {
    async fn load_tenants(&self) -> Result<Vec<TenantRow>, StoreError> {
        let rows = sqlx::query_as::<_, TenantRow>(&self.query)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

/// Fixed in-memory mapping, used in tests and local runs where no
/// Postgres instance is available.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTenantStore {
    rows: Vec<TenantRow>,
}

impl InMemoryTenantStore {
    pub fn new(rows: Vec<TenantRow>) -> Self {
        InMemoryTenantStore { rows }
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn load_tenants(&self) -> Result<Vec<TenantRow>, StoreError> {
        Ok(self.rows.clone())
    }
}
