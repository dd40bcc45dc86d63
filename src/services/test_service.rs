use crate::dto::session_dto::{CreateMaterialsPayload, CreateTestPayload};
use crate::error::{Error, Result};
use crate::models::test::{Test, TestMaterials};
use sqlx::PgPool;
use uuid::Uuid;

pub const DEFAULT_LISTENING_MINUTES: i32 = 40;
pub const DEFAULT_READING_MINUTES: i32 = 60;
pub const DEFAULT_WRITING_MINUTES: i32 = 60;

#[derive(Clone)]
pub struct TestService {
    pool: PgPool,
}

impl TestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_test(&self, payload: CreateTestPayload) -> Result<Test> {
        let test = sqlx::query_as::<_, Test>(
            r#"
            INSERT INTO tests (name, description, listening_minutes, reading_minutes, writing_minutes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(payload.name.trim())
        .bind(payload.description)
        .bind(payload.listening_minutes.unwrap_or(DEFAULT_LISTENING_MINUTES))
        .bind(payload.reading_minutes.unwrap_or(DEFAULT_READING_MINUTES))
        .bind(payload.writing_minutes.unwrap_or(DEFAULT_WRITING_MINUTES))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(test_id = %test.id, name = %test.name, "test created");
        Ok(test)
    }

    pub async fn get_test_by_id(&self, test_id: Uuid) -> Result<Test> {
        sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1")
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".into()))
    }

    pub async fn list_tests(&self) -> Result<Vec<Test>> {
        let tests = sqlx::query_as::<_, Test>("SELECT * FROM tests ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(tests)
    }

    pub async fn create_materials(&self, payload: CreateMaterialsPayload) -> Result<TestMaterials> {
        self.get_test_by_id(payload.test_id).await?;

        let materials = sqlx::query_as::<_, TestMaterials>(
            r#"
            INSERT INTO test_materials (test_id, name)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(payload.test_id)
        .bind(payload.name.trim())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            test_id = %materials.test_id,
            test_materials_id = %materials.id,
            "test materials created"
        );
        Ok(materials)
    }

    pub async fn list_materials(&self, test_id: Option<Uuid>) -> Result<Vec<TestMaterials>> {
        let rows = sqlx::query_as::<_, TestMaterials>(
            r#"
            SELECT * FROM test_materials
            WHERE ($1::uuid IS NULL OR test_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
