use super::SubscriptionStore;
use super::ops::{self, require_user};
use crate::error::{StoreError, StoreResult};
use crate::model::Subscription;
use crate::qb::{FilterSpec, PatchSpec, UpsertPolicy};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const OP_LEN: &str = "len";

/// [`SubscriptionStore`] held in process memory.
///
/// Applies the same validation, conflict policy, ordering and error kinds as the
/// PostgreSQL backend. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<Subscription>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with `records`, merged through the upsert policy.
    pub fn with_records(records: impl IntoIterator<Item = Subscription>) -> StoreResult<Self> {
        let store = Self::new();
        {
            let mut guard = store.lock(ops::OP_INSERT)?;
            for sub in records {
                sub.validate(ops::OP_INSERT)?;
                upsert(&mut guard, sub);
            }
        }
        Ok(store)
    }

    /// Number of stored records. A poisoned lock is a storage failure, as for every call.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock(OP_LEN)?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self, op: &'static str) -> StoreResult<MutexGuard<'_, Vec<Subscription>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::storage(op, "record lock poisoned"))
    }
}

fn upsert(records: &mut Vec<Subscription>, sub: Subscription) {
    match records.iter_mut().find(|r| UpsertPolicy::same_key(r, &sub)) {
        Some(existing) => UpsertPolicy::merge(existing, &sub),
        None => records.push(sub),
    }
}

impl SubscriptionStore for MemoryStore {
    async fn insert(&self, sub: &Subscription) -> StoreResult<()> {
        sub.validate(ops::OP_INSERT)?;
        let mut records = self.lock(ops::OP_INSERT)?;
        upsert(&mut records, sub.clone());
        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> StoreResult<u64> {
        require_user(ops::OP_DELETE_BY_USER, user_id)?;
        let mut records = self.lock(ops::OP_DELETE_BY_USER)?;
        let before = records.len();
        records.retain(|r| r.user_id != user_id);
        let removed = (before - records.len()) as u64;
        if removed == 0 {
            return Err(StoreError::not_found(
                ops::OP_DELETE_BY_USER,
                format!("no subscriptions for user {user_id}"),
            ));
        }
        Ok(removed)
    }

    async fn update_by_user(&self, user_id: Uuid, patch: &PatchSpec) -> StoreResult<u64> {
        require_user(ops::OP_UPDATE_BY_USER, user_id)?;
        patch.validate(ops::OP_UPDATE_BY_USER)?;
        let mut records = self.lock(ops::OP_UPDATE_BY_USER)?;
        let mut updated = 0u64;
        for sub in records.iter_mut().filter(|r| r.user_id == user_id) {
            patch.apply(sub);
            updated += 1;
        }
        if updated == 0 {
            return Err(StoreError::not_found(
                ops::OP_UPDATE_BY_USER,
                format!("no subscriptions for user {user_id}"),
            ));
        }
        Ok(updated)
    }

    async fn list_all(&self) -> StoreResult<Vec<Subscription>> {
        let mut out = self.lock(ops::OP_LIST_ALL)?.clone();
        out.sort_by(|a, b| {
            (a.user_id, &a.service_name, a.start_date).cmp(&(
                b.user_id,
                &b.service_name,
                b.start_date,
            ))
        });
        Ok(out)
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Subscription>> {
        require_user(ops::OP_LIST_BY_USER, user_id)?;
        let mut out: Vec<Subscription> = self
            .lock(ops::OP_LIST_BY_USER)?
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (&a.service_name, a.start_date).cmp(&(&b.service_name, b.start_date))
        });
        Ok(out)
    }

    async fn filter_sum(&self, filter: &FilterSpec) -> StoreResult<i64> {
        let records = self.lock(ops::OP_FILTER_SUM)?;
        records
            .iter()
            .filter(|r| filter.matches(r))
            .try_fold(0i64, |acc, r| acc.checked_add(r.price))
            .ok_or_else(|| StoreError::storage(ops::OP_FILTER_SUM, "bigint out of range"))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock(ops::OP_PING).map(|_| ())
    }
}
