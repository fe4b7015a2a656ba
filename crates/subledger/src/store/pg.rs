use super::SubscriptionStore;
use super::ops;
use super::scope::{ActiveCall, CallScope};
use crate::client::GenericClient;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::model::Subscription;
use crate::pool::create_pool_from_config;
use crate::qb::{FilterSpec, PatchSpec};
use deadpool_postgres::Pool;
use uuid::Uuid;

/// [`SubscriptionStore`] over a deadpool-postgres pool.
///
/// Cloning is cheap and shares the pool. Each call checks out one connection, so
/// concurrent calls run on separate connections up to the pool size.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    scope: CallScope,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("pool", &self.pool.status())
            .field("scope", &self.scope)
            .finish()
    }
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            scope: CallScope::default(),
        }
    }

    /// Build the pool from `config` and apply its query timeout.
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        let pool = create_pool_from_config(config)?;
        let mut scope = CallScope::new();
        if let Some(timeout) = config.query_timeout() {
            scope = scope.with_timeout(timeout);
        }
        Ok(Self { pool, scope })
    }

    /// A handle sharing this pool whose calls are bounded by `scope`.
    pub fn scoped(&self, scope: CallScope) -> Self {
        Self {
            pool: self.pool.clone(),
            scope,
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check out a connection, e.g. to run [`ops`] inside a transaction.
    pub async fn client(&self) -> StoreResult<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    /// Stop handing out connections and drop the idle ones.
    ///
    /// Calls made afterwards fail with a storage failure.
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn acquire(
        &self,
        call: &mut ActiveCall,
        op: &'static str,
    ) -> StoreResult<deadpool_postgres::Client> {
        call.run(op, None, async {
            self.pool.get().await.map_err(StoreError::from)
        })
        .await
    }
}

impl SubscriptionStore for PgStore {
    async fn insert(&self, sub: &Subscription) -> StoreResult<()> {
        sub.validate(ops::OP_INSERT)?;
        let mut call = self.scope.start();
        let client = self.acquire(&mut call, ops::OP_INSERT).await?;
        let token = GenericClient::cancel_token(&client);
        call.run(ops::OP_INSERT, token, ops::insert(&client, sub))
            .await
    }

    async fn delete_by_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut call = self.scope.start();
        let client = self.acquire(&mut call, ops::OP_DELETE_BY_USER).await?;
        let token = GenericClient::cancel_token(&client);
        call.run(
            ops::OP_DELETE_BY_USER,
            token,
            ops::delete_by_user(&client, user_id),
        )
        .await
    }

    async fn update_by_user(&self, user_id: Uuid, patch: &PatchSpec) -> StoreResult<u64> {
        patch.validate(ops::OP_UPDATE_BY_USER)?;
        let mut call = self.scope.start();
        let client = self.acquire(&mut call, ops::OP_UPDATE_BY_USER).await?;
        let token = GenericClient::cancel_token(&client);
        call.run(
            ops::OP_UPDATE_BY_USER,
            token,
            ops::update_by_user(&client, user_id, patch),
        )
        .await
    }

    async fn list_all(&self) -> StoreResult<Vec<Subscription>> {
        let mut call = self.scope.start();
        let client = self.acquire(&mut call, ops::OP_LIST_ALL).await?;
        let token = GenericClient::cancel_token(&client);
        call.run(ops::OP_LIST_ALL, token, ops::list_all(&client))
            .await
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Subscription>> {
        let mut call = self.scope.start();
        let client = self.acquire(&mut call, ops::OP_LIST_BY_USER).await?;
        let token = GenericClient::cancel_token(&client);
        call.run(
            ops::OP_LIST_BY_USER,
            token,
            ops::list_by_user(&client, user_id),
        )
        .await
    }

    async fn filter_sum(&self, filter: &FilterSpec) -> StoreResult<i64> {
        let mut call = self.scope.start();
        let client = self.acquire(&mut call, ops::OP_FILTER_SUM).await?;
        let token = GenericClient::cancel_token(&client);
        call.run(ops::OP_FILTER_SUM, token, ops::filter_sum(&client, filter))
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut call = self.scope.start();
        let client = self.acquire(&mut call, ops::OP_PING).await?;
        let token = GenericClient::cancel_token(&client);
        call.run(ops::OP_PING, token, ops::ping(&client)).await
    }
}
