use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::participant::Participant;
use crate::models::test_session::TestSession;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 300))]
    pub listening_minutes: Option<i32>,
    #[validate(range(min = 1, max = 300))]
    pub reading_minutes: Option<i32>,
    #[validate(range(min = 1, max = 300))]
    pub writing_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMaterialsPayload {
    pub test_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialsQuery {
    pub test_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSessionPayload {
    pub test_id: Uuid,
    pub test_materials_id: Uuid,
    pub session_date: DateTime<Utc>,
    #[validate(length(min = 1, max = 255))]
    pub location: String,
    #[validate(range(min = 1, max = 1000))]
    pub max_capacity: Option<i32>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewParticipant {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[validate(length(min = 3, max = 32))]
    pub participant_id_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterParticipantsPayload {
    #[validate(length(min = 1, max = 500), nested)]
    pub participants: Vec<NewParticipant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterFailure {
    pub full_name: String,
    pub phone_number: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterParticipantsResponse {
    pub registered: Vec<Participant>,
    pub failed: Vec<RegisterFailure>,
}

/// Band scores entered by an examiner; omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetScoresPayload {
    pub listening_score: Option<Decimal>,
    pub reading_score: Option<Decimal>,
    pub writing_score: Option<Decimal>,
    pub speaking_score: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewWritingPayload {
    pub writing_score: Decimal,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkUpdateResponse {
    pub message: String,
    pub updated_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveAndEndResponse {
    pub message: String,
    pub saved_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingScores {
    pub participant_id: Uuid,
    pub participant_id_code: String,
    pub full_name: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_participants: i64,
    pub entered_startscreen: i64,
    pub test_started: i64,
    pub currently_active: i64,
    pub paused: i64,
    pub offline_or_disconnected: i64,
    pub test_completed: i64,
    pub scores_pending: i64,
    pub total_tab_switches: i64,
    pub total_focus_lost: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MonitoringSummary {
    pub participant_id: Uuid,
    pub full_name: String,
    pub event_type: String,
    pub event_count: i64,
    pub last_event_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeInfo {
    pub server_time: DateTime<Utc>,
    pub test_started_at: Option<DateTime<Utc>>,
    pub test_end_at: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDashboard {
    pub session: TestSession,
    pub participants: Vec<Participant>,
    pub stats: DashboardStats,
    pub monitoring: Vec<MonitoringSummary>,
    pub time_info: TimeInfo,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub session: TestSession,
    pub test_name: String,
    pub participant_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AnswerListItem {
    pub section_type: String,
    pub question_number: i32,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WritingSubmissionItem {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub participant_id_code: String,
    pub full_name: String,
    pub task_1_content: String,
    pub task_2_content: String,
    pub task_1_word_count: i32,
    pub task_2_word_count: i32,
    pub writing_score: Decimal,
    pub admin_notes: Option<String>,
    pub is_reviewed: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheClearResponse {
    pub message: String,
    pub cleared: usize,
}
