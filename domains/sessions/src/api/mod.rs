//! API layer for the sessions domain
//!
//! Contains HTTP handlers, routes, and domain state definition.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use middleware::SessionsState;
pub use routes::routes;
