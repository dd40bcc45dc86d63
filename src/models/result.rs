use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestResult {
    pub id: Uuid,
    pub student_id: Uuid,
    pub test_id: Uuid,
    pub session_id: Option<Uuid>,
    pub listening_score: Decimal,
    pub reading_score: Decimal,
    pub writing_score: Decimal,
    pub speaking_score: Decimal,
    pub overall_score: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A saved result joined with its test and student, as listed to students,
/// centers and admins.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResultListItem {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub phone_number: String,
    pub test_id: Uuid,
    pub test_name: String,
    pub session_id: Option<Uuid>,
    pub listening_score: Decimal,
    pub reading_score: Decimal,
    pub writing_score: Decimal,
    pub speaking_score: Decimal,
    pub overall_score: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentStats {
    pub total_tests: i64,
    pub completed_tests: i64,
    pub average_overall: Option<Decimal>,
    pub recent_results: Vec<ResultListItem>,
}
