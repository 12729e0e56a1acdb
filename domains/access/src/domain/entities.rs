//! Domain entities for the Skillgate access domain
//!
//! Test types, entitlements, one-time codes and access requests. Each entity
//! carries the rules that decide whether an operation may proceed; the
//! handlers only sequence them inside transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillgate_audit::AuditLevel;
use skillgate_common::StateError;
use uuid::Uuid;

use crate::domain::error::AccessError;
pub use crate::domain::state::RequestStatus;
use crate::domain::state::{RequestEvent, RequestReviewStateMachine};

/// Seconds allowed for a typing test
pub const TYPING_TIME_LIMIT_SECS: i32 = 60;

/// Seconds allowed per digital literacy question
pub const SECONDS_PER_LITERACY_QUESTION: i32 = 60;

/// Maximum length of a request reason or review response
pub const MAX_REASON_LENGTH: u64 = 1000;

// ============================================================================
// Test types
// ============================================================================

/// What a test measures; decides time limit and scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "test_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    TypingKeyboard,
    TypingTenKey,
    DigitalLiteracy,
    BasicMath,
    English,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypingKeyboard => "typing_keyboard",
            Self::TypingTenKey => "typing_ten_key",
            Self::DigitalLiteracy => "digital_literacy",
            Self::BasicMath => "basic_math",
            Self::English => "english",
        }
    }

    /// Typing kinds are scored by comparing typed text to a passage
    pub fn is_typing(&self) -> bool {
        matches!(self, Self::TypingKeyboard | Self::TypingTenKey)
    }
}

impl std::fmt::Display for TestKind {
    #[mutants::skip] // Delegates to as_str()
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TestType {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub kind: TestKind,
    pub question_count: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TestType {
    /// Fixed per-kind time policy. `None` means untimed.
    pub fn time_limit_seconds(&self) -> Option<i32> {
        match self.kind {
            TestKind::TypingKeyboard | TestKind::TypingTenKey => Some(TYPING_TIME_LIMIT_SECS),
            TestKind::DigitalLiteracy => self
                .question_count
                .map(|count| count.max(1) * SECONDS_PER_LITERACY_QUESTION),
            TestKind::BasicMath | TestKind::English => None,
        }
    }
}

/// A test type reference as callers send it: UUID or slug
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestTypeKey {
    Id(Uuid),
    Slug(String),
}

impl TestTypeKey {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match Uuid::parse_str(raw) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(raw.to_lowercase()),
        }
    }
}

impl std::fmt::Display for TestTypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Slug(slug) => f.write_str(slug),
        }
    }
}

// ============================================================================
// Entitlements
// ============================================================================

/// Access level held for one test type, ordered from least to most access
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "access_level", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    None,
    PracticeOnly,
    OneTime,
    Unlimited,
}

impl AccessLevel {
    /// Whether this level allows starting a scored (non-practice) session
    pub fn permits_scored_attempt(&self) -> bool {
        matches!(self, Self::OneTime | Self::Unlimited)
    }

    /// Whether this level is anything better than no access
    pub fn is_granted(&self) -> bool {
        *self > Self::None
    }

    /// Levels an admin may pick when approving a request
    pub fn is_approvable(&self) -> bool {
        self.permits_scored_attempt()
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::PracticeOnly => write!(f, "PRACTICE_ONLY"),
            Self::OneTime => write!(f, "ONE_TIME"),
            Self::Unlimited => write!(f, "UNLIMITED"),
        }
    }
}

impl From<AccessLevel> for AuditLevel {
    fn from(level: AccessLevel) -> Self {
        match level {
            AccessLevel::None => Self::None,
            AccessLevel::PracticeOnly => Self::PracticeOnly,
            AccessLevel::OneTime => Self::OneTime,
            AccessLevel::Unlimited => Self::Unlimited,
        }
    }
}

/// How an entitlement was last written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entitlement_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntitlementSource {
    Admin,
    Approval,
    Code,
}

/// Stored entitlement. Absence of a record is equivalent to `NONE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entitlement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_type_id: Uuid,
    pub access_level: AccessLevel,
    pub is_active: bool,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub source: EntitlementSource,
    pub source_code_id: Option<Uuid>,
}

impl Entitlement {
    /// Level that access checks should honour
    pub fn effective_level(&self) -> AccessLevel {
        if self.is_active {
            self.access_level
        } else {
            AccessLevel::None
        }
    }
}

/// Effective level of an optional record
pub fn effective_level(entitlement: Option<&Entitlement>) -> AccessLevel {
    entitlement
        .map(Entitlement::effective_level)
        .unwrap_or(AccessLevel::None)
}

// ============================================================================
// One-time codes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OneTimeCode {
    pub id: Uuid,
    pub code: String,
    pub test_type_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub used_by: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
}

impl OneTimeCode {
    pub fn new(
        code: String,
        test_type_id: Uuid,
        created_by: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            test_type_id,
            created_by,
            created_at: Utc::now(),
            expires_at,
            is_active: true,
            used_by: None,
            used_at: None,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_by.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// `is_active ∧ unused ∧ not expired`
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_used() && !self.is_expired(now)
    }

    /// Redemption precondition. Used or deactivated codes report
    /// `ALREADY_USED` ahead of expiry.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), AccessError> {
        if self.is_used() || !self.is_active {
            return Err(AccessError::AlreadyUsed);
        }
        if self.is_expired(now) {
            return Err(AccessError::Expired);
        }
        Ok(())
    }

    pub fn check_deactivatable(&self) -> Result<(), AccessError> {
        if self.is_used() {
            return Err(AccessError::AlreadyUsed);
        }
        if !self.is_active {
            return Err(AccessError::CodeInactive);
        }
        Ok(())
    }

    /// Deletion also requires the code never backed a session; callers
    /// check that separately against the session store.
    pub fn check_deletable(&self) -> Result<(), AccessError> {
        if self.is_used() {
            return Err(AccessError::CodeInUse);
        }
        Ok(())
    }
}

// ============================================================================
// Access requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TestRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_type_id: Uuid,
    pub reason: String,
    pub status: RequestStatus,
    /// Level granted on approval
    pub access_level: Option<AccessLevel>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TestRequest {
    pub fn new(user_id: Uuid, test_type_id: Uuid, reason: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            test_type_id,
            reason,
            status: RequestStatus::Pending,
            access_level: None,
            reviewed_by: None,
            reviewed_at: None,
            response: None,
            created_at: Utc::now(),
        }
    }

    fn apply_transition(&mut self, event: RequestEvent) -> Result<(), AccessError> {
        let next = RequestReviewStateMachine::transition(self.status, event).map_err(
            |_: StateError| AccessError::AlreadyProcessed {
                status: self.status,
            },
        )?;
        self.status = next;
        Ok(())
    }

    pub fn approve(
        &mut self,
        reviewer: Uuid,
        level: AccessLevel,
        response: Option<String>,
    ) -> Result<(), AccessError> {
        self.apply_transition(RequestEvent::Approve)?;
        self.access_level = Some(level);
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(Utc::now());
        self.response = response;
        Ok(())
    }

    pub fn deny(&mut self, reviewer: Uuid, reason: Option<String>) -> Result<(), AccessError> {
        self.apply_transition(RequestEvent::Deny)?;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(Utc::now());
        self.response = reason;
        Ok(())
    }
}
