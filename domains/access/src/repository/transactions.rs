//! Transactional free functions for the access domain
//!
//! Every entitlement write funnels through `set_entitlement_level_tx`.
//! Callers hold the transaction; these functions never commit.

use chrono::Utc;
use skillgate_common::RepositoryError;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::codes::CodeAvailability;
use crate::domain::entities::{
    effective_level, AccessLevel, Entitlement, EntitlementSource, OneTimeCode, TestRequest,
    TestType,
};

/// Outcome of an entitlement write
#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementChange {
    /// Effective level before the write
    pub previous: AccessLevel,
    /// Stored record after the write; `None` means NONE
    pub current: Option<Entitlement>,
    /// Pending requests for the pair approved as a side effect
    pub auto_approved: u64,
}

impl EntitlementChange {
    pub fn level(&self) -> AccessLevel {
        effective_level(self.current.as_ref())
    }
}

/// Serialize writers on one (user, test type) pair for the rest of the
/// transaction, then read the entitlement row with `FOR UPDATE`.
///
/// The advisory lock covers the case where no row exists yet, which a
/// row lock alone cannot.
pub async fn lock_entitlement_tx(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    test_type_id: Uuid,
) -> std::result::Result<Option<Entitlement>, sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("entitlement:{}:{}", user_id, test_type_id))
        .execute(&mut **transaction)
        .await?;

    let row = sqlx::query_as::<_, Entitlement>(
        r#"
        SELECT id, user_id, test_type_id, access_level, is_active,
               granted_by, granted_at, source, source_code_id
        FROM entitlements
        WHERE user_id = $1 AND test_type_id = $2
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .bind(test_type_id)
    .fetch_optional(&mut **transaction)
    .await?;

    Ok(row)
}

/// Idempotent upsert of a user's level for a test type.
///
/// `NONE` removes the record. Any level above `NONE` also approves the
/// pair's pending requests with `reviewed_by = actor`.
pub async fn set_entitlement_level_tx(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    test_type_id: Uuid,
    level: AccessLevel,
    actor: Uuid,
    source: EntitlementSource,
    source_code_id: Option<Uuid>,
) -> std::result::Result<EntitlementChange, sqlx::Error> {
    let existing = lock_entitlement_tx(transaction, user_id, test_type_id).await?;
    let previous = effective_level(existing.as_ref());

    if level == AccessLevel::None {
        sqlx::query("DELETE FROM entitlements WHERE user_id = $1 AND test_type_id = $2")
            .bind(user_id)
            .bind(test_type_id)
            .execute(&mut **transaction)
            .await?;

        tracing::info!(
            user_id = %user_id,
            test_type_id = %test_type_id,
            previous = %previous,
            actor = %actor,
            "Entitlement removed"
        );

        return Ok(EntitlementChange {
            previous,
            current: None,
            auto_approved: 0,
        });
    }

    let stored = sqlx::query_as::<_, Entitlement>(
        r#"
        INSERT INTO entitlements
            (id, user_id, test_type_id, access_level, is_active, granted_by, granted_at,
             source, source_code_id)
        VALUES ($1, $2, $3, $4, TRUE, $5, NOW(), $6, $7)
        ON CONFLICT (user_id, test_type_id) DO UPDATE SET
            access_level = EXCLUDED.access_level,
            is_active = TRUE,
            granted_by = EXCLUDED.granted_by,
            granted_at = EXCLUDED.granted_at,
            source = EXCLUDED.source,
            source_code_id = EXCLUDED.source_code_id
        RETURNING id, user_id, test_type_id, access_level, is_active,
                  granted_by, granted_at, source, source_code_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(test_type_id)
    .bind(level)
    .bind(actor)
    .bind(source)
    .bind(source_code_id)
    .fetch_one(&mut **transaction)
    .await?;

    let approved = sqlx::query(
        r#"
        UPDATE test_requests SET
            status = 'APPROVED',
            access_level = $3,
            reviewed_by = $4,
            reviewed_at = NOW(),
            response = COALESCE(response, 'Access granted directly')
        WHERE user_id = $1 AND test_type_id = $2 AND status = 'PENDING'
        "#,
    )
    .bind(user_id)
    .bind(test_type_id)
    .bind(level)
    .bind(actor)
    .execute(&mut **transaction)
    .await?;

    tracing::info!(
        user_id = %user_id,
        test_type_id = %test_type_id,
        previous = %previous,
        level = %level,
        source = ?source,
        auto_approved = approved.rows_affected(),
        "Entitlement set"
    );

    Ok(EntitlementChange {
        previous,
        current: Some(stored),
        auto_approved: approved.rows_affected(),
    })
}

/// Write `level` unless the pair already holds something at least as good
pub async fn raise_entitlement_tx(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    test_type_id: Uuid,
    level: AccessLevel,
    actor: Uuid,
    source: EntitlementSource,
    source_code_id: Option<Uuid>,
) -> std::result::Result<EntitlementChange, sqlx::Error> {
    let existing = lock_entitlement_tx(transaction, user_id, test_type_id).await?;
    let previous = effective_level(existing.as_ref());

    if previous >= level {
        return Ok(EntitlementChange {
            previous,
            current: existing,
            auto_approved: 0,
        });
    }

    set_entitlement_level_tx(
        transaction,
        user_id,
        test_type_id,
        level,
        actor,
        source,
        source_code_id,
    )
    .await
}

/// Consume a ONE_TIME grant: the record is removed (NONE) and returned.
///
/// Returns `None` when the pair holds anything else, so UNLIMITED is
/// never consumed. Must run after `lock_entitlement_tx` in the same
/// transaction so exactly one concurrent caller observes the grant.
pub async fn downgrade_if_one_time_tx(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    test_type_id: Uuid,
) -> std::result::Result<Option<Entitlement>, sqlx::Error> {
    let consumed = sqlx::query_as::<_, Entitlement>(
        r#"
        DELETE FROM entitlements
        WHERE user_id = $1 AND test_type_id = $2
          AND access_level = 'ONE_TIME' AND is_active
        RETURNING id, user_id, test_type_id, access_level, is_active,
                  granted_by, granted_at, source, source_code_id
        "#,
    )
    .bind(user_id)
    .bind(test_type_id)
    .fetch_optional(&mut **transaction)
    .await?;

    if consumed.is_some() {
        tracing::info!(
            user_id = %user_id,
            test_type_id = %test_type_id,
            "One-time entitlement consumed"
        );
    }

    Ok(consumed)
}

pub async fn get_test_type_tx(
    transaction: &mut Transaction<'_, Postgres>,
    test_type_id: Uuid,
) -> std::result::Result<Option<TestType>, sqlx::Error> {
    sqlx::query_as::<_, TestType>(
        r#"
        SELECT id, slug, name, kind, question_count, is_active, created_at
        FROM test_types
        WHERE id = $1
        "#,
    )
    .bind(test_type_id)
    .fetch_optional(&mut **transaction)
    .await
}

// ============================================================================
// One-time codes
// ============================================================================

/// Code uniqueness checks against the batch's own transaction
pub struct TxCodeAvailability<'a, 'c> {
    transaction: &'a mut Transaction<'c, Postgres>,
}

impl<'a, 'c> TxCodeAvailability<'a, 'c> {
    pub fn new(transaction: &'a mut Transaction<'c, Postgres>) -> Self {
        Self { transaction }
    }
}

#[async_trait::async_trait]
impl CodeAvailability for TxCodeAvailability<'_, '_> {
    async fn is_taken(&mut self, code: &str) -> std::result::Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM one_time_codes WHERE code = $1)",
        )
        .bind(code)
        .fetch_one(&mut **self.transaction)
        .await
    }
}

pub async fn insert_codes_tx(
    transaction: &mut Transaction<'_, Postgres>,
    codes: &[OneTimeCode],
) -> std::result::Result<Vec<OneTimeCode>, sqlx::Error> {
    let mut created = Vec::with_capacity(codes.len());
    for code in codes {
        let row = sqlx::query_as::<_, OneTimeCode>(
            r#"
            INSERT INTO one_time_codes
                (id, code, test_type_id, created_by, created_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            RETURNING id, code, test_type_id, created_by, created_at, expires_at,
                      is_active, used_by, used_at
            "#,
        )
        .bind(code.id)
        .bind(&code.code)
        .bind(code.test_type_id)
        .bind(code.created_by)
        .bind(code.created_at)
        .bind(code.expires_at)
        .fetch_one(&mut **transaction)
        .await?;
        created.push(row);
    }
    Ok(created)
}

/// Lock a code by its exact text
pub async fn get_code_for_update_tx(
    transaction: &mut Transaction<'_, Postgres>,
    code: &str,
) -> std::result::Result<Option<OneTimeCode>, sqlx::Error> {
    sqlx::query_as::<_, OneTimeCode>(
        r#"
        SELECT id, code, test_type_id, created_by, created_at, expires_at,
               is_active, used_by, used_at
        FROM one_time_codes
        WHERE code = $1
        FOR UPDATE
        "#,
    )
    .bind(code)
    .fetch_optional(&mut **transaction)
    .await
}

pub async fn get_code_by_id_for_update_tx(
    transaction: &mut Transaction<'_, Postgres>,
    code_id: Uuid,
) -> std::result::Result<Option<OneTimeCode>, sqlx::Error> {
    sqlx::query_as::<_, OneTimeCode>(
        r#"
        SELECT id, code, test_type_id, created_by, created_at, expires_at,
               is_active, used_by, used_at
        FROM one_time_codes
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(code_id)
    .fetch_optional(&mut **transaction)
    .await
}

/// Mark a code spent by `user_id`.
///
/// The `used_by IS NULL AND is_active` predicate re-verifies redeemability
/// at write time; `RepositoryError::NotFound` means another caller won.
pub async fn consume_code_tx(
    transaction: &mut Transaction<'_, Postgres>,
    code_id: Uuid,
    user_id: Uuid,
) -> std::result::Result<OneTimeCode, RepositoryError> {
    let row = sqlx::query_as::<_, OneTimeCode>(
        r#"
        UPDATE one_time_codes SET
            used_by = $2,
            used_at = $3,
            is_active = FALSE
        WHERE id = $1 AND used_by IS NULL AND is_active
        RETURNING id, code, test_type_id, created_by, created_at, expires_at,
                  is_active, used_by, used_at
        "#,
    )
    .bind(code_id)
    .bind(user_id)
    .bind(Utc::now())
    .fetch_optional(&mut **transaction)
    .await?;

    row.ok_or(RepositoryError::NotFound)
}

pub async fn deactivate_code_tx(
    transaction: &mut Transaction<'_, Postgres>,
    code_id: Uuid,
) -> std::result::Result<OneTimeCode, RepositoryError> {
    let row = sqlx::query_as::<_, OneTimeCode>(
        r#"
        UPDATE one_time_codes SET is_active = FALSE
        WHERE id = $1 AND used_by IS NULL AND is_active
        RETURNING id, code, test_type_id, created_by, created_at, expires_at,
                  is_active, used_by, used_at
        "#,
    )
    .bind(code_id)
    .fetch_optional(&mut **transaction)
    .await?;

    row.ok_or(RepositoryError::NotFound)
}

pub async fn delete_code_tx(
    transaction: &mut Transaction<'_, Postgres>,
    code_id: Uuid,
) -> std::result::Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM one_time_codes WHERE id = $1 AND used_by IS NULL")
        .bind(code_id)
        .execute(&mut **transaction)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Whether any test session was started on a grant from this code
pub async fn code_attached_to_session_tx(
    transaction: &mut Transaction<'_, Postgres>,
    code_id: Uuid,
) -> std::result::Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM test_sessions WHERE code_id = $1)")
        .bind(code_id)
        .fetch_one(&mut **transaction)
        .await
}

// ============================================================================
// Access requests
// ============================================================================

pub async fn has_pending_request_tx(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    test_type_id: Uuid,
) -> std::result::Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM test_requests
            WHERE user_id = $1 AND test_type_id = $2 AND status = 'PENDING'
        )
        "#,
    )
    .bind(user_id)
    .bind(test_type_id)
    .fetch_one(&mut **transaction)
    .await
}

pub async fn create_request_tx(
    transaction: &mut Transaction<'_, Postgres>,
    request: &TestRequest,
) -> std::result::Result<TestRequest, sqlx::Error> {
    sqlx::query_as::<_, TestRequest>(
        r#"
        INSERT INTO test_requests (id, user_id, test_type_id, reason, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, test_type_id, reason, status, access_level,
                  reviewed_by, reviewed_at, response, created_at
        "#,
    )
    .bind(request.id)
    .bind(request.user_id)
    .bind(request.test_type_id)
    .bind(&request.reason)
    .bind(request.status)
    .bind(request.created_at)
    .fetch_one(&mut **transaction)
    .await
}

pub async fn get_request_for_update_tx(
    transaction: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
) -> std::result::Result<Option<TestRequest>, sqlx::Error> {
    sqlx::query_as::<_, TestRequest>(
        r#"
        SELECT id, user_id, test_type_id, reason, status, access_level,
               reviewed_by, reviewed_at, response, created_at
        FROM test_requests
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(request_id)
    .fetch_optional(&mut **transaction)
    .await
}

/// Lock a request for review.
///
/// Entitlement writes take the pair lock before touching pending requests,
/// so review takes the same order: unlocked read for the (user, test type)
/// pair, pair lock, then the request row. Both columns are immutable after
/// insert, so the unlocked read cannot go stale.
pub async fn lock_request_for_review_tx(
    transaction: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
) -> std::result::Result<Option<TestRequest>, sqlx::Error> {
    let pair = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT user_id, test_type_id FROM test_requests WHERE id = $1",
    )
    .bind(request_id)
    .fetch_optional(&mut **transaction)
    .await?;

    let Some((user_id, test_type_id)) = pair else {
        return Ok(None);
    };

    lock_entitlement_tx(transaction, user_id, test_type_id).await?;
    get_request_for_update_tx(transaction, request_id).await
}

/// Persist a review decision.
///
/// Only a still-PENDING row is updated; `RepositoryError::NotFound`
/// means it was reviewed concurrently.
pub async fn review_request_tx(
    transaction: &mut Transaction<'_, Postgres>,
    request: &TestRequest,
) -> std::result::Result<TestRequest, RepositoryError> {
    let row = sqlx::query_as::<_, TestRequest>(
        r#"
        UPDATE test_requests SET
            status = $2,
            access_level = $3,
            reviewed_by = $4,
            reviewed_at = $5,
            response = $6
        WHERE id = $1 AND status = 'PENDING'
        RETURNING id, user_id, test_type_id, reason, status, access_level,
                  reviewed_by, reviewed_at, response, created_at
        "#,
    )
    .bind(request.id)
    .bind(request.status)
    .bind(request.access_level)
    .bind(request.reviewed_by)
    .bind(request.reviewed_at)
    .bind(&request.response)
    .fetch_optional(&mut **transaction)
    .await?;

    row.ok_or(RepositoryError::NotFound)
}
