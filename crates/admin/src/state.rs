//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use sqlx::PgPool;

use crate::config::AdminConfig;
use crate::db::LedgerRepository;
use crate::services::inventory::{LedgerView, PrivilegedLedger, StockLedger};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: Option<PgPool>,
    ledger: Arc<dyn StockLedger>,
    privileged: Arc<dyn PrivilegedLedger>,
    view: LedgerView,
    api_key: Option<SecretString>,
}

impl AppState {
    /// Build state backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: &AdminConfig, pool: PgPool) -> Self {
        let repository = Arc::new(LedgerRepository::new(pool.clone()));
        Self::build(
            Some(pool),
            repository.clone(),
            repository,
            config.ledger_api_key.clone(),
            config.cache_ttl,
        )
    }

    /// Build state over arbitrary stores, without a database pool.
    #[must_use]
    pub fn with_stores(
        ledger: Arc<dyn StockLedger>,
        privileged: Arc<dyn PrivilegedLedger>,
        api_key: Option<SecretString>,
        cache_ttl: Duration,
    ) -> Self {
        Self::build(None, ledger, privileged, api_key, cache_ttl)
    }

    fn build(
        pool: Option<PgPool>,
        ledger: Arc<dyn StockLedger>,
        privileged: Arc<dyn PrivilegedLedger>,
        api_key: Option<SecretString>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pool,
                view: LedgerView::new(Arc::clone(&ledger), cache_ttl),
                ledger,
                privileged,
                api_key,
            }),
        }
    }

    /// Database pool, when backed by `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn ledger(&self) -> &dyn StockLedger {
        self.inner.ledger.as_ref()
    }

    #[must_use]
    pub fn privileged(&self) -> &dyn PrivilegedLedger {
        self.inner.privileged.as_ref()
    }

    #[must_use]
    pub fn view(&self) -> &LedgerView {
        &self.inner.view
    }

    /// Key required on the ledger endpoints; `None` disables them.
    #[must_use]
    pub fn api_key(&self) -> Option<&SecretString> {
        self.inner.api_key.as_ref()
    }
}
