use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoringEvent {
    pub id: Uuid,
    pub session_id: Uuid,
    pub participant_id: Uuid,
    pub event_type: String,
    pub event_data: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    Heartbeat,
    TabSwitch,
    FocusLost,
    FocusGained,
    ScreenChange,
}

impl ActivityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityEvent::Heartbeat => "heartbeat",
            ActivityEvent::TabSwitch => "tab_switch",
            ActivityEvent::FocusLost => "focus_lost",
            ActivityEvent::FocusGained => "focus_gained",
            ActivityEvent::ScreenChange => "screen_change",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "heartbeat" => Some(ActivityEvent::Heartbeat),
            "tab_switch" => Some(ActivityEvent::TabSwitch),
            "focus_lost" => Some(ActivityEvent::FocusLost),
            "focus_gained" => Some(ActivityEvent::FocusGained),
            "screen_change" => Some(ActivityEvent::ScreenChange),
            _ => None,
        }
    }

    /// Heartbeats only refresh `last_activity_at`; everything else is logged.
    pub fn is_logged(&self) -> bool {
        !matches!(self, ActivityEvent::Heartbeat)
    }
}
