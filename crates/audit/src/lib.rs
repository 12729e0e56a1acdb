//! Audit log for administrative actions
//!
//! Every mutating admin operation appends one record inside the same
//! transaction as the change it describes. Detail payloads are a tagged enum
//! so each action kind has a fixed, queryable schema.

pub mod entities;
pub mod repository;

pub use entities::{AuditDetail, AuditLevel, AuditLogEntry, AuditSessionStatus};
pub use repository::{append_audit_tx, AuditRepository};
