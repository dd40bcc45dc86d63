use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestSession {
    pub id: Uuid,
    pub test_id: Uuid,
    pub test_materials_id: Uuid,
    pub center_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub session_date: DateTime<Utc>,
    pub location: String,
    pub max_capacity: Option<i32>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub test_started_at: Option<DateTime<Utc>>,
    pub test_end_at: Option<DateTime<Utc>>,
    pub test_paused_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestSession {
    pub fn session_status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    /// Closed sessions no longer admit participants.
    pub fn is_closed(&self) -> bool {
        matches!(
            self.session_status(),
            Some(SessionStatus::Completed) | Some(SessionStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 4] = [
        SessionStatus::Scheduled,
        SessionStatus::Ongoing,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    /// Status only moves forward: scheduled -> ongoing -> completed, with
    /// cancelled reachable from either open state. Re-asserting the current
    /// status is accepted as a no-op.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Scheduled, Ongoing)
                | (Scheduled, Completed)
                | (Ongoing, Completed)
                | (Scheduled, Cancelled)
                | (Ongoing, Cancelled)
        )
    }
}
