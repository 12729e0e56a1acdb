//! Test result read repository

use crate::domain::entities::TestResult;
use serde::Deserialize;
use skillgate_common::{Pagination, Result};
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) const RESULT_COLUMNS: &str = "id, test_id, user_id, test_type_id, score, accuracy, \
    raw_speed, weighted_speed, time_to_complete, questions_total, questions_correct, \
    detailed_results, created_at";

/// Optional narrowing for result listings
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResultFilter {
    #[serde(default)]
    pub test_type_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ResultRepository {
    pool: PgPool,
}

impl ResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_for_session(&self, test_id: Uuid) -> Result<Option<TestResult>> {
        let query = format!("SELECT {} FROM test_results WHERE test_id = $1", RESULT_COLUMNS);
        let row = sqlx::query_as::<_, TestResult>(&query)
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// A user's results, newest first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: ResultFilter,
        pagination: Pagination,
    ) -> Result<Vec<TestResult>> {
        let query = format!(
            "SELECT {} FROM test_results \
             WHERE user_id = $1 AND ($2::uuid IS NULL OR test_type_id = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            RESULT_COLUMNS
        );
        let rows = sqlx::query_as::<_, TestResult>(&query)
            .bind(user_id)
            .bind(filter.test_type_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
