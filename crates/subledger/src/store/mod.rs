//! The record store: one trait, a PostgreSQL backend and an in-memory backend.
//!
//! Both backends share the same validation, ordering, conflict policy and error taxonomy,
//! so callers (and tests) can swap one for the other.

mod memory;
pub mod ops;
#[cfg(feature = "pool")]
mod pg;
mod scope;

pub use memory::MemoryStore;
#[cfg(feature = "pool")]
pub use pg::PgStore;
pub use scope::{CallScope, CancelHandle, CancelSignal, cancel_pair};

use crate::error::StoreResult;
use crate::model::Subscription;
use crate::qb::{FilterSpec, PatchSpec};
use std::future::Future;
use uuid::Uuid;

/// Persistence of subscription records.
///
/// Every method is safe to call concurrently; implementations hold no per-call state.
pub trait SubscriptionStore: Send + Sync {
    /// Insert a record. A record with the same `(user_id, service_name, start_date)` gets
    /// its price and end date overwritten instead.
    ///
    /// Fails with `BadInput` before any I/O when the record is invalid.
    fn insert(&self, sub: &Subscription) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete all records of a user. `NotFound` when the user has none.
    fn delete_by_user(&self, user_id: Uuid) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Apply the present fields of `patch` to all records of a user.
    ///
    /// `BadInput` for an empty patch, `NotFound` when the user has no records.
    fn update_by_user(
        &self,
        user_id: Uuid,
        patch: &PatchSpec,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// All records ordered by user, service, start date.
    fn list_all(&self) -> impl Future<Output = StoreResult<Vec<Subscription>>> + Send;

    /// Records of one user ordered by service, start date. Empty for an unknown user.
    fn list_by_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = StoreResult<Vec<Subscription>>> + Send;

    /// Total price over the records matching `filter`; 0 when none match.
    fn filter_sum(&self, filter: &FilterSpec) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Check that the backend is reachable.
    fn ping(&self) -> impl Future<Output = StoreResult<()>> + Send;
}

#[cfg(test)]
mod tests;
