//! Test type catalogue repository

use crate::domain::entities::{TestType, TestTypeKey};
use skillgate_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct TestTypeRepository {
    pool: PgPool,
}

impl TestTypeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<TestType>> {
        let rows = sqlx::query_as::<_, TestType>(
            r#"
            SELECT id, slug, name, kind, question_count, is_active, created_at
            FROM test_types
            WHERE is_active OR $1
            ORDER BY name
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<TestType>> {
        let row = sqlx::query_as::<_, TestType>(
            r#"
            SELECT id, slug, name, kind, question_count, is_active, created_at
            FROM test_types
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<TestType>> {
        let row = sqlx::query_as::<_, TestType>(
            r#"
            SELECT id, slug, name, kind, question_count, is_active, created_at
            FROM test_types
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Look up by UUID or slug
    pub async fn resolve(&self, key: &TestTypeKey) -> Result<Option<TestType>> {
        match key {
            TestTypeKey::Id(id) => self.get_by_id(*id).await,
            TestTypeKey::Slug(slug) => self.get_by_slug(slug).await,
        }
    }
}
