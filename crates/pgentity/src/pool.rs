//! The pool contract and its PostgreSQL implementations.

use crate::driver::{JsonParam, decode_row};
use crate::error::{OrmError, OrmResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// Anything that can run one parameterized statement.
///
/// The engine never opens, closes or pins connections; every statement is a
/// single `query` call. Each returned row is a JSON object keyed by result
/// column name (or `null` for an absent row).
#[async_trait]
pub trait Pool: Send + Sync {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Value>>;
}

/// Shared handle to a pool, as stored by repositories and builders.
pub type PoolRef = Arc<dyn Pool>;

async fn run_query(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> OrmResult<Vec<Value>> {
    let bound: Vec<JsonParam<'_>> = params.iter().map(JsonParam).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    let rows = client
        .query(sql, &refs)
        .await
        .map_err(OrmError::from_db_error)?;
    rows.iter().map(decode_row).collect()
}

#[async_trait]
impl Pool for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Value>> {
        run_query(self, sql, params).await
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl Pool for deadpool_postgres::Pool {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Value>> {
        let client = self.get().await?;
        run_query(&client, sql, params).await
    }
}

#[async_trait]
impl<P: Pool + ?Sized> Pool for Arc<P> {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Value>> {
        (**self).query(sql, params).await
    }
}

#[cfg(feature = "pool")]
pub use self::deadpool::{create_pool, create_pool_with_config, create_pool_with_manager_config};

#[cfg(feature = "pool")]
mod deadpool {
    use crate::error::{OrmError, OrmResult};
    use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
    use tokio_postgres::Socket;
    use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

    /// Create a deadpool-postgres pool from a database URL (`NoTls`, 16 connections).
    ///
    /// ```ignore
    /// let pool = pgentity::create_pool(&std::env::var("DATABASE_URL")?)?;
    /// let orm = Orm::initialize(registry, OrmConfig::new(Arc::new(pool)))?;
    /// ```
    pub fn create_pool(database_url: &str) -> OrmResult<Pool> {
        create_pool_with_config(database_url, 16)
    }

    /// Create a pool with a custom maximum size.
    pub fn create_pool_with_config(database_url: &str, max_size: usize) -> OrmResult<Pool> {
        create_pool_with_manager_config(
            database_url,
            tokio_postgres::NoTls,
            default_manager_config(),
            |builder| builder.max_size(max_size),
        )
    }

    /// Create a pool with an explicit TLS connector, manager config and pool tuning.
    pub fn create_pool_with_manager_config<T>(
        database_url: &str,
        tls: T,
        manager_config: ManagerConfig,
        configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
    ) -> OrmResult<Pool>
    where
        T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
        T::Stream: Sync + Send,
        T::TlsConnect: Sync + Send,
        <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
    {
        let pg_config: tokio_postgres::Config = database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| OrmError::configuration(e.to_string()))?;

        let mgr = Manager::from_config(pg_config, tls, manager_config);
        configure_pool(Pool::builder(mgr))
            .build()
            .map_err(|e| OrmError::Pool(e.to_string()))
    }

    fn default_manager_config() -> ManagerConfig {
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        }
    }
}
