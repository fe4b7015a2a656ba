//! # subledger
//!
//! A subscription ledger over PostgreSQL.
//!
//! ## Features
//!
//! - **Sparse filters**: every filter field is independently present or absent; the
//!   rendered `WHERE` clause binds exactly the present ones, numbered `$1..$n`
//! - **Partial updates**: change price and/or end date for all records of a user
//! - **Idempotent inserts**: re-reporting a period overwrites price and end date
//! - **Server-side totals**: `filter_sum` aggregates in the database and never returns NULL
//! - **Swappable backends**: [`SubscriptionStore`] over a pool ([`PgStore`]) or memory
//!   ([`MemoryStore`])
//! - **Bounded calls**: per-call deadline and cancellation abort the in-flight statement
//!
//! ```ignore
//! use subledger::{FilterSpec, PgStore, StoreConfig, Subscription, SubscriptionStore};
//!
//! let store = PgStore::from_config(&StoreConfig::load("subledger.toml")?)?;
//! store.insert(&Subscription::new(user, "Netflix", 999, start)).await?;
//! let total = store
//!     .filter_sum(&FilterSpec::new().user_id(user).from(jan_15).to(jan_20))
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod qb;
pub mod row;
pub mod store;
pub mod transaction;

pub use client::GenericClient;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use model::{Column, Subscription};
pub use qb::{BuiltQuery, FilterSpec, PatchSpec, UpsertPolicy};
pub use row::{FromRow, RowExt};
pub use store::{CallScope, CancelHandle, CancelSignal, MemoryStore, SubscriptionStore, cancel_pair};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_from_config};

#[cfg(feature = "pool")]
pub use store::PgStore;

#[cfg(feature = "migrate")]
pub mod migrate;

// Re-export tokio_postgres for convenience
pub use tokio_postgres;

#[cfg(feature = "pool")]
pub use deadpool_postgres;
