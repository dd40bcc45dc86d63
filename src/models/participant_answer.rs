use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ParticipantAnswer {
    pub session_id: Uuid,
    pub participant_id: Uuid,
    pub section_type: String,
    pub question_number: i32,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Listening,
    Reading,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Listening => "listening",
            SectionType::Reading => "reading",
        }
    }

    /// Screen the participant moves on to after submitting this section.
    pub fn next_screen(&self) -> &'static str {
        match self {
            SectionType::Listening => "reading",
            SectionType::Reading => "writing",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WritingSubmission {
    pub id: Uuid,
    pub session_id: Uuid,
    pub participant_id: Uuid,
    pub task_1_content: String,
    pub task_2_content: String,
    pub task_1_word_count: i32,
    pub task_2_word_count: i32,
    pub writing_score: rust_decimal::Decimal,
    pub admin_notes: Option<String>,
    pub is_reviewed: bool,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
}
