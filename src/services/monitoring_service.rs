use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::session_dto::{DashboardStats, MonitoringSummary, SessionDashboard, TimeInfo};
use crate::error::Result;
use crate::models::participant::{Participant, TestTakingState};
use crate::services::participant_service::ParticipantService;
use crate::services::session_service::{SessionScope, SessionService};
use crate::utils::time::remaining_seconds;

#[derive(Clone)]
pub struct MonitoringService {
    pool: PgPool,
    sessions: SessionService,
    participants: ParticipantService,
    offline_threshold_seconds: i64,
}

impl MonitoringService {
    pub fn new(
        pool: PgPool,
        sessions: SessionService,
        participants: ParticipantService,
        offline_threshold_seconds: i64,
    ) -> Self {
        Self {
            pool,
            sessions,
            participants,
            offline_threshold_seconds,
        }
    }

    pub async fn dashboard(&self, session_id: Uuid, scope: &SessionScope) -> Result<SessionDashboard> {
        let session = self.sessions.get_session(session_id, scope).await?;
        self.sessions.expire_overdue(session_id).await?;

        let participants = self.participants.list_participants(session_id).await?;
        let now = Utc::now();
        let stats = compute_stats(&participants, now, self.offline_threshold_seconds);
        let monitoring = self.monitoring_summary(session_id).await?;

        let time_info = TimeInfo {
            server_time: now,
            test_started_at: session.test_started_at,
            test_end_at: session.test_end_at,
            remaining_seconds: session.test_end_at.map(|end| remaining_seconds(end, now)),
        };

        Ok(SessionDashboard {
            session,
            participants,
            stats,
            monitoring,
            time_info,
        })
    }

    async fn monitoring_summary(&self, session_id: Uuid) -> Result<Vec<MonitoringSummary>> {
        let rows = sqlx::query_as::<_, MonitoringSummary>(
            r#"
            SELECT m.participant_id, p.full_name, m.event_type,
                   COUNT(*) AS event_count, MAX(m.created_at) AS last_event_at
            FROM participant_monitoring m
            JOIN test_participants p ON p.id = m.participant_id
            WHERE m.session_id = $1
            GROUP BY m.participant_id, p.full_name, m.event_type
            ORDER BY last_event_at DESC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn is_online(participant: &Participant, now: DateTime<Utc>, threshold: Duration) -> bool {
    participant
        .last_activity_at
        .map(|seen| now - seen <= threshold)
        .unwrap_or(false)
}

pub fn compute_stats(
    participants: &[Participant],
    now: DateTime<Utc>,
    offline_threshold_seconds: i64,
) -> DashboardStats {
    let threshold = Duration::seconds(offline_threshold_seconds);
    let mut stats = DashboardStats {
        total_participants: participants.len() as i64,
        ..DashboardStats::default()
    };

    for p in participants {
        let state = p.test_taking();
        let completed = state == TestTakingState::Completed;
        let online = is_online(p, now, threshold);

        if p.has_entered_startscreen {
            stats.entered_startscreen += 1;
        }
        if p.test_started && !completed {
            stats.test_started += 1;
            if !online {
                stats.offline_or_disconnected += 1;
            }
        }
        if matches!(state, TestTakingState::InProgress | TestTakingState::Paused) && online {
            stats.currently_active += 1;
        }
        if state == TestTakingState::Paused {
            stats.paused += 1;
        }
        if completed {
            stats.test_completed += 1;
            if !p.missing_scores().is_empty() {
                stats.scores_pending += 1;
            }
        }
        stats.total_tab_switches += p.tab_switch_count as i64;
        stats.total_focus_lost += p.focus_lost_count as i64;
    }
    stats
}
