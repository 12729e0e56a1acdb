//! Access domain: who may take which test
//!
//! Owns the test-type catalogue, per-user entitlements, single-use
//! redemption codes and the request/approval workflow. Every path that
//! changes an entitlement goes through `set_entitlement_level_tx`.

pub mod api;
pub mod domain;
pub mod repository;

// Re-export domain types at the crate root for convenience
pub use domain::codes::{
    generate_unique_codes, normalize_code, CodeAvailability, CodeGenerationError,
    CODE_ALPHABET, CODE_LENGTH, MAX_ATTEMPTS_PER_CODE, MAX_CODES_PER_BATCH,
};
pub use domain::entities::*;
pub use domain::error::AccessError;
pub use domain::state::{RequestEvent, RequestReviewStateMachine, RequestStatus};

// Re-export repository types
pub use repository::{
    code_attached_to_session_tx, consume_code_tx, create_request_tx, deactivate_code_tx,
    delete_code_tx, downgrade_if_one_time_tx, get_code_by_id_for_update_tx,
    get_code_for_update_tx, get_request_for_update_tx, get_test_type_tx,
    has_pending_request_tx, insert_codes_tx, lock_entitlement_tx, lock_request_for_review_tx,
    raise_entitlement_tx, review_request_tx, set_entitlement_level_tx, AccessRepositories, CodeFilter,
    CodeRepository, EntitlementChange, EntitlementRepository, RequestRepository,
    TestTypeRepository, TxCodeAvailability,
};

// Re-export API types
pub use api::routes;
pub use api::AccessState;
