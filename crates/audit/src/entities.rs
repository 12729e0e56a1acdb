//! Audit record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Access level as recorded in audit payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditLevel {
    None,
    PracticeOnly,
    OneTime,
    Unlimited,
}

/// Test session status as recorded in audit payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSessionStatus {
    Started,
    Paused,
    Completed,
    Cancelled,
}

/// Structured payload of an audit record, one variant per action kind.
///
/// Serialized with an `action` tag, e.g.
/// `{"action":"request_approved","user_id":"…","test_type_id":"…","access_level":"UNLIMITED"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditDetail {
    CodesGenerated {
        test_type_id: Uuid,
        count: u32,
        expires_at: Option<DateTime<Utc>>,
        codes: Vec<String>,
    },
    CodeDeactivated {
        code: String,
        test_type_id: Uuid,
    },
    CodeDeleted {
        code: String,
        test_type_id: Uuid,
    },
    RequestApproved {
        user_id: Uuid,
        test_type_id: Uuid,
        access_level: AuditLevel,
        response: Option<String>,
    },
    RequestDenied {
        user_id: Uuid,
        test_type_id: Uuid,
        reason: Option<String>,
    },
    EntitlementSet {
        user_id: Uuid,
        test_type_id: Uuid,
        previous_level: AuditLevel,
        new_level: AuditLevel,
    },
    TestCancelled {
        user_id: Uuid,
        test_type_id: Uuid,
        previous_status: AuditSessionStatus,
        reason: Option<String>,
    },
    TestDeleted {
        user_id: Uuid,
        test_type_id: Uuid,
        status: AuditSessionStatus,
        had_result: bool,
    },
}

impl AuditDetail {
    /// The action kind, stored in its own column for filtering
    pub fn action(&self) -> &'static str {
        match self {
            Self::CodesGenerated { .. } => "codes_generated",
            Self::CodeDeactivated { .. } => "code_deactivated",
            Self::CodeDeleted { .. } => "code_deleted",
            Self::RequestApproved { .. } => "request_approved",
            Self::RequestDenied { .. } => "request_denied",
            Self::EntitlementSet { .. } => "entitlement_set",
            Self::TestCancelled { .. } => "test_cancelled",
            Self::TestDeleted { .. } => "test_deleted",
        }
    }
}

/// A persisted audit record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub target_id: Uuid,
    pub detail: Json<AuditDetail>,
    pub created_at: DateTime<Utc>,
}
