//! Repository implementations for the access domain

pub mod codes;
pub mod entitlements;
pub mod requests;
pub mod test_types;
pub mod transactions;

use std::time::Duration;

use skillgate_audit::AuditRepository;
use skillgate_common::{begin_bounded, DEFAULT_STATEMENT_TIMEOUT};
use sqlx::{PgPool, Postgres, Transaction};

pub use codes::{CodeFilter, CodeRepository};
pub use entitlements::EntitlementRepository;
pub use requests::RequestRepository;
pub use test_types::TestTypeRepository;
pub use transactions::{
    code_attached_to_session_tx, consume_code_tx, create_request_tx, deactivate_code_tx,
    delete_code_tx, downgrade_if_one_time_tx, get_code_by_id_for_update_tx,
    get_code_for_update_tx, get_request_for_update_tx, get_test_type_tx,
    has_pending_request_tx, insert_codes_tx, lock_entitlement_tx, lock_request_for_review_tx,
    raise_entitlement_tx, review_request_tx, set_entitlement_level_tx, EntitlementChange, TxCodeAvailability,
};

/// Combined repository access for the access domain
#[derive(Clone)]
pub struct AccessRepositories {
    pool: PgPool,
    statement_timeout: Duration,
    pub test_types: TestTypeRepository,
    pub entitlements: EntitlementRepository,
    pub codes: CodeRepository,
    pub requests: RequestRepository,
    pub audit: AuditRepository,
}

impl AccessRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            test_types: TestTypeRepository::new(pool.clone()),
            entitlements: EntitlementRepository::new(pool.clone()),
            codes: CodeRepository::new(pool.clone()),
            requests: RequestRepository::new(pool.clone()),
            audit: AuditRepository::new(pool.clone()),
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
            pool,
        }
    }

    /// Bound every statement issued inside transactions from `begin`
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Begin a new database transaction.
    pub async fn begin(&self) -> std::result::Result<Transaction<'static, Postgres>, sqlx::Error> {
        begin_bounded(&self.pool, self.statement_timeout).await
    }
}
