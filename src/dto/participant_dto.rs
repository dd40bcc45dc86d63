use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::participant::Participant;
use crate::models::test_session::TestSession;
use crate::services::scoring_service::WritingScore;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckInRequest {
    #[validate(length(min = 1, max = 32))]
    pub participant_id_code: String,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ValidateDeviceRequest {
    #[validate(length(min = 1, max = 32))]
    pub participant_id_code: String,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(length(min = 1, max = 255))]
    pub device_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CanStartQuery {
    pub full_name: Option<String>,
}

/// Section answers keyed by question number, e.g. `{"1": "A", "2": "true"}`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitSectionRequest {
    #[validate(length(min = 1, max = 32))]
    pub participant_id_code: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub answers: HashMap<i32, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitWritingRequest {
    #[validate(length(min = 1, max = 32))]
    pub participant_id_code: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub answers: HashMap<i32, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ActivityRequest {
    #[validate(length(min = 1, max = 32))]
    pub participant_id_code: String,
    pub event_type: Option<String>,
    #[validate(length(max = 64))]
    pub current_screen: Option<String>,
    pub event_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantDetail {
    pub id: Uuid,
    pub session_id: Uuid,
    pub participant_id_code: String,
    pub full_name: String,
    pub test_id: Uuid,
    pub test_materials_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub location: String,
    pub admission_state: String,
    pub test_taking_state: String,
    pub has_entered_startscreen: bool,
    pub entered_at: Option<DateTime<Utc>>,
    pub current_screen: Option<String>,
}

impl ParticipantDetail {
    pub fn new(participant: &Participant, session: &TestSession) -> Self {
        Self {
            id: participant.id,
            session_id: participant.session_id,
            participant_id_code: participant.participant_id_code.clone(),
            full_name: participant.full_name.clone(),
            test_id: session.test_id,
            test_materials_id: session.test_materials_id,
            session_date: session.session_date,
            location: session.location.clone(),
            admission_state: participant.admission_state.clone(),
            test_taking_state: participant.test_taking_state.clone(),
            has_entered_startscreen: participant.has_entered_startscreen,
            entered_at: participant.entered_at,
            current_screen: participant.current_screen.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInResponse {
    pub message: String,
    pub participant: ParticipantDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateDeviceResponse {
    pub ip_match: bool,
    pub first_binding: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantScores {
    pub listening_raw_score: Option<i32>,
    pub listening_score: Option<Decimal>,
    pub reading_raw_score: Option<i32>,
    pub reading_score: Option<Decimal>,
    pub writing_score: Option<Decimal>,
    pub speaking_score: Option<Decimal>,
}

impl From<&Participant> for ParticipantScores {
    fn from(p: &Participant) -> Self {
        Self {
            listening_raw_score: p.listening_raw_score,
            listening_score: p.listening_score,
            reading_raw_score: p.reading_raw_score,
            reading_score: p.reading_score,
            writing_score: p.writing_score,
            speaking_score: p.speaking_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CanStartResponse {
    pub can_start: bool,
    pub admission_state: String,
    pub test_taking_state: String,
    pub test_started_at: Option<DateTime<Utc>>,
    pub test_end_at: Option<DateTime<Utc>>,
    pub current_screen: Option<String>,
    pub scores: ParticipantScores,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitSectionResponse {
    pub message: String,
    pub section: String,
    pub raw_score: i32,
    pub band_score: Decimal,
    pub total_questions: usize,
    pub next_screen: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitWritingResponse {
    pub message: String,
    pub submission_id: Uuid,
    pub writing: WritingScore,
}
