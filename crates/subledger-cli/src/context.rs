use crate::cli::ConnArgs;
use anyhow::Context;
use subledger::{PgStore, StoreConfig};

/// Resolve the store configuration.
///
/// `--database` wins over `database.url` in the config file; without a config file
/// `DATABASE_URL` is used.
pub fn resolve_config(conn: &ConnArgs) -> anyhow::Result<StoreConfig> {
    let config = if conn.config.exists() {
        Some(
            StoreConfig::load(&conn.config)
                .with_context(|| format!("failed to load {}", conn.config.display()))?,
        )
    } else {
        None
    };

    match (config, conn.database.as_deref()) {
        (Some(cfg), Some(url)) => Ok(cfg.with_database_url(url)),
        (Some(cfg), None) => Ok(cfg),
        (None, Some(url)) => Ok(StoreConfig::from_url(url)),
        (None, None) => match std::env::var("DATABASE_URL") {
            Ok(url) => Ok(StoreConfig::from_url(url)),
            Err(_) => anyhow::bail!(
                "database URL is required: pass --database, set DATABASE_URL or provide {}",
                conn.config.display()
            ),
        },
    }
}

pub fn open_store(conn: &ConnArgs) -> anyhow::Result<PgStore> {
    let config = resolve_config(conn)?;
    PgStore::from_config(&config).context("failed to create connection pool")
}

pub async fn connect(database_url: &str) -> anyhow::Result<tokio_postgres::Client> {
    let (client, connection) = tokio_postgres::connect(database_url, tokio_postgres::NoTls)
        .await
        .context("failed to connect to database")?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            eprintln!("connection error: {err}");
        }
    });

    Ok(client)
}
