//! Repository implementations for the sessions domain

pub mod results;
pub mod sessions;
pub mod transactions;

use std::time::Duration;

use skillgate_access::{EntitlementRepository, TestTypeRepository};
use skillgate_audit::AuditRepository;
use skillgate_common::{begin_bounded, DEFAULT_STATEMENT_TIMEOUT};
use sqlx::{PgPool, Postgres, Transaction};

pub use results::{ResultFilter, ResultRepository};
pub use sessions::SessionRepository;
pub use transactions::{
    delete_session_tx, find_active_session_tx, get_session_for_update_tx, insert_result_tx,
    insert_session_tx, result_exists_tx, update_session_tx,
};

/// Combined repository access for the sessions domain
#[derive(Clone)]
pub struct SessionsRepositories {
    pool: PgPool,
    statement_timeout: Duration,
    pub sessions: SessionRepository,
    pub results: ResultRepository,
    pub test_types: TestTypeRepository,
    pub entitlements: EntitlementRepository,
    pub audit: AuditRepository,
}

impl SessionsRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            sessions: SessionRepository::new(pool.clone()),
            results: ResultRepository::new(pool.clone()),
            test_types: TestTypeRepository::new(pool.clone()),
            entitlements: EntitlementRepository::new(pool.clone()),
            audit: AuditRepository::new(pool.clone()),
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
            pool,
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub async fn begin(&self) -> std::result::Result<Transaction<'static, Postgres>, sqlx::Error> {
        begin_bounded(&self.pool, self.statement_timeout).await
    }
}
