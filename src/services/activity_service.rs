use axum::body::Bytes;
use sqlx::PgPool;
use validator::Validate;

use crate::dto::participant_dto::ActivityRequest;
use crate::error::{Error, Result};
use crate::models::monitoring_event::{ActivityEvent, MonitoringEvent};
use crate::services::participant_service::ParticipantService;

#[derive(Clone)]
pub struct ActivityService {
    pool: PgPool,
    participants: ParticipantService,
}

impl ActivityService {
    pub fn new(pool: PgPool, participants: ParticipantService) -> Self {
        Self { pool, participants }
    }

    pub async fn record(&self, req: ActivityRequest) -> Result<()> {
        let event = match req.event_type.as_deref().map(str::trim) {
            None | Some("") => ActivityEvent::Heartbeat,
            Some(raw) => ActivityEvent::parse(raw)
                .ok_or_else(|| Error::BadRequest(format!("Unknown activity event: {}", raw)))?,
        };
        let participant = self.participants.find_by_code(&req.participant_id_code).await?;
        if participant.is_expired() {
            tracing::debug!(participant_id = %participant.id, "activity from expired participant ignored");
            return Ok(());
        }

        let tab_switches = i32::from(event == ActivityEvent::TabSwitch);
        let focus_lost = i32::from(event == ActivityEvent::FocusLost);
        sqlx::query(
            r#"
            UPDATE test_participants
            SET last_activity_at = NOW(),
                current_screen = COALESCE($2, current_screen),
                tab_switch_count = tab_switch_count + $3,
                focus_lost_count = focus_lost_count + $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(participant.id)
        .bind(req.current_screen.as_deref().filter(|s| !s.trim().is_empty()))
        .bind(tab_switches)
        .bind(focus_lost)
        .execute(&self.pool)
        .await?;

        if event.is_logged() {
            let logged = sqlx::query_as::<_, MonitoringEvent>(
                r#"
                INSERT INTO participant_monitoring (session_id, participant_id, event_type, event_data)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(participant.session_id)
            .bind(participant.id)
            .bind(event.as_str())
            .bind(req.event_data)
            .fetch_one(&self.pool)
            .await?;
            tracing::debug!(
                participant_id = %logged.participant_id,
                event_id = %logged.id,
                event_type = %logged.event_type,
                "activity event logged"
            );
        }
        Ok(())
    }

    /// Runs `record` off the request path. Unparseable reports and failures
    /// are logged and dropped.
    pub fn spawn_record(&self, body: Bytes) {
        let req = match serde_json::from_slice::<ActivityRequest>(&body) {
            Ok(req) => req,
            Err(e) => {
                tracing::debug!(error = %e, bytes = body.len(), "activity report not parseable, dropped");
                return;
            }
        };
        if let Err(e) = req.validate() {
            tracing::debug!(error = %e, "activity report invalid, dropped");
            return;
        }
        let service = self.clone();
        tokio::spawn(async move {
            let code = req.participant_id_code.clone();
            if let Err(e) = service.record(req).await {
                tracing::warn!(participant_id_code = %code, error = %e, "activity not recorded");
            }
        });
    }
}
