use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::result::{ResultListItem, StudentStats};
use crate::services::session_service::SessionScope;

const RESULT_SELECT: &str = r#"
    SELECT r.id, r.student_id, u.full_name AS student_name, u.phone_number,
           r.test_id, t.name AS test_name, r.session_id,
           r.listening_score, r.reading_score, r.writing_score, r.speaking_score,
           r.overall_score, r.created_at, r.updated_at
    FROM results r
    JOIN tests t ON t.id = r.test_id
    JOIN users u ON u.id = r.student_id
"#;

const RECENT_RESULTS: i64 = 5;

#[derive(Clone)]
pub struct ResultService {
    pool: PgPool,
}

impl ResultService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest first.
    pub async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<ResultListItem>> {
        let rows = sqlx::query_as::<_, ResultListItem>(&format!(
            "{} WHERE r.student_id = $1 ORDER BY r.created_at DESC, r.id",
            RESULT_SELECT
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn latest_for_student(&self, student_id: Uuid) -> Result<Option<ResultListItem>> {
        let row = sqlx::query_as::<_, ResultListItem>(&format!(
            "{} WHERE r.student_id = $1 ORDER BY r.created_at DESC, r.id LIMIT 1",
            RESULT_SELECT
        ))
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn stats_for_student(&self, student_id: Uuid) -> Result<StudentStats> {
        let total_tests: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tests")
            .fetch_one(&self.pool)
            .await?;
        let (completed_tests, average_overall): (i64, Option<Decimal>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), ROUND(AVG(overall_score), 1)
            FROM results
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        let recent_results = sqlx::query_as::<_, ResultListItem>(&format!(
            "{} WHERE r.student_id = $1 ORDER BY r.created_at DESC, r.id LIMIT $2",
            RESULT_SELECT
        ))
        .bind(student_id)
        .bind(RECENT_RESULTS)
        .fetch_all(&self.pool)
        .await?;

        Ok(StudentStats {
            total_tests,
            completed_tests,
            average_overall,
            recent_results,
        })
    }

    /// Admins see every result. Centers see results saved from their own sessions.
    pub async fn list_for_scope(&self, scope: &SessionScope) -> Result<Vec<ResultListItem>> {
        let rows = sqlx::query_as::<_, ResultListItem>(&format!(
            r#"{}
            WHERE $1::UUID IS NULL
               OR r.session_id IN (SELECT id FROM test_sessions WHERE center_id = $1)
            ORDER BY r.created_at DESC, r.id"#,
            RESULT_SELECT
        ))
        .bind(scope.center_id())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
