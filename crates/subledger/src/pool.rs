//! Connection pool construction.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult, UNSCOPED};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

/// Create a pool of at most `max_size` plain-TCP connections.
///
/// Connections are opened lazily, so an unreachable server surfaces on first use.
pub fn create_pool(database_url: &str, max_size: usize) -> StoreResult<Pool> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| StoreError::Config(format!("database url: {e}")))?;

    let mgr = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(mgr)
        .max_size(max_size)
        .build()
        .map_err(|e| StoreError::storage(UNSCOPED, format!("pool: {e}")))
}

/// Create a pool sized by `config`.
pub fn create_pool_from_config(config: &StoreConfig) -> StoreResult<Pool> {
    config.validate()?;
    create_pool(&config.database.url, config.database.max_connections)
}
