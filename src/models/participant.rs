use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Option<Uuid>,
    pub participant_id_code: String,
    pub full_name: String,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub device_id: Option<String>,
    #[serde(skip_serializing)]
    pub locked_ip: Option<IpNetwork>,
    pub has_entered_startscreen: bool,
    pub entered_at: Option<DateTime<Utc>>,
    pub admission_state: String,
    pub test_taking_state: String,
    pub test_started: bool,
    pub test_started_at: Option<DateTime<Utc>>,
    pub test_end_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub total_pause_seconds: i64,
    pub test_completed_at: Option<DateTime<Utc>>,
    pub current_screen: Option<String>,
    pub listening_raw_score: Option<i32>,
    pub listening_score: Option<Decimal>,
    pub reading_raw_score: Option<i32>,
    pub reading_score: Option<Decimal>,
    pub writing_score: Option<Decimal>,
    pub speaking_score: Option<Decimal>,
    pub tab_switch_count: i32,
    pub focus_lost_count: i32,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Participant {
    pub fn admission(&self) -> AdmissionState {
        AdmissionState::parse(&self.admission_state).unwrap_or(AdmissionState::NotEntered)
    }

    pub fn test_taking(&self) -> TestTakingState {
        TestTakingState::parse(&self.test_taking_state).unwrap_or(TestTakingState::NotStarted)
    }

    pub fn is_expired(&self) -> bool {
        self.admission() == AdmissionState::Expired
    }

    /// Scores that must be present before the session can be finalized.
    /// A writing score of zero means the script is still waiting for review.
    pub fn missing_scores(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.listening_score.is_none() {
            missing.push("listening");
        }
        if self.reading_score.is_none() {
            missing.push("reading");
        }
        if self.writing_score.map_or(true, |w| w.is_zero()) {
            missing.push("writing");
        }
        if self.speaking_score.is_none() {
            missing.push("speaking");
        }
        missing
    }
}

#[cfg(test)]
impl Participant {
    pub fn fixture(full_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            participant_id_code: crate::utils::token::generate_participant_code(),
            full_name: full_name.to_string(),
            phone_number: String::new(),
            device_id: None,
            locked_ip: None,
            has_entered_startscreen: false,
            entered_at: None,
            admission_state: AdmissionState::NotEntered.as_str().to_string(),
            test_taking_state: TestTakingState::NotStarted.as_str().to_string(),
            test_started: false,
            test_started_at: None,
            test_end_at: None,
            paused_at: None,
            total_pause_seconds: 0,
            test_completed_at: None,
            current_screen: None,
            listening_raw_score: None,
            listening_score: None,
            reading_raw_score: None,
            reading_score: None,
            writing_score: None,
            speaking_score: None,
            tab_switch_count: 0,
            focus_lost_count: 0,
            last_activity_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_states(mut self, admission: AdmissionState, taking: TestTakingState) -> Self {
        self.admission_state = admission.as_str().to_string();
        self.test_taking_state = taking.as_str().to_string();
        self.has_entered_startscreen = admission != AdmissionState::NotEntered;
        self.test_started = taking != TestTakingState::NotStarted;
        self
    }
}

/// Whether the access code has been used to enter the waiting room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    NotEntered,
    Admitted,
    Expired,
}

impl AdmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionState::NotEntered => "not_entered",
            AdmissionState::Admitted => "admitted",
            AdmissionState::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not_entered" => Some(AdmissionState::NotEntered),
            "admitted" => Some(AdmissionState::Admitted),
            "expired" => Some(AdmissionState::Expired),
            _ => None,
        }
    }
}

/// Where the participant is in the timed sitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestTakingState {
    NotStarted,
    InProgress,
    Paused,
    Completed,
}

impl TestTakingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestTakingState::NotStarted => "not_started",
            TestTakingState::InProgress => "in_progress",
            TestTakingState::Paused => "paused",
            TestTakingState::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not_started" => Some(TestTakingState::NotStarted),
            "in_progress" => Some(TestTakingState::InProgress),
            "paused" => Some(TestTakingState::Paused),
            "completed" => Some(TestTakingState::Completed),
            _ => None,
        }
    }

    pub fn apply(self, action: ControlAction) -> Result<TestTakingState, InvalidTransition> {
        use ControlAction::*;
        use TestTakingState::*;
        match (self, action) {
            (NotStarted, Start) => Ok(InProgress),
            (InProgress, Pause) => Ok(Paused),
            (Paused, Restart) => Ok(InProgress),
            (NotStarted | InProgress | Paused, End) => Ok(Completed),
            (from, action) => Err(InvalidTransition { from, action }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Start,
    Pause,
    Restart,
    End,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Pause => "pause",
            ControlAction::Restart => "restart",
            ControlAction::End => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {} a participant whose test is {}", .action.as_str(), .from.as_str())]
pub struct InvalidTransition {
    pub from: TestTakingState,
    pub action: ControlAction,
}

/// Folds case and runs of whitespace so "ahmed  khan " matches "Ahmed Khan".
pub fn fold_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn names_match(claimed: &str, registered: &str) -> bool {
    let claimed = fold_name(claimed);
    !claimed.is_empty() && claimed == fold_name(registered)
}
