//! Sessions domain: one attempt at a test, from start to result
//!
//! Owns the session lifecycle and its state machine, the scoring engine and
//! the immutable results of scored attempts. Starting a scored attempt
//! consults and consumes access held by the access domain in the same
//! transaction.

pub mod api;
pub mod domain;
pub mod repository;

// Re-export domain types at the crate root for convenience
pub use domain::entities::*;
pub use domain::error::SessionError;
pub use domain::scoring::{ScoreSummary, SpeedMetric};
pub use domain::state::{SessionEvent, SessionStateMachine};

// Re-export repository types
pub use repository::{
    delete_session_tx, find_active_session_tx, get_session_for_update_tx, insert_result_tx,
    insert_session_tx, result_exists_tx, update_session_tx, ResultFilter, ResultRepository,
    SessionRepository, SessionsRepositories,
};

// Re-export API types
pub use api::routes;
pub use api::SessionsState;
