use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::session_dto::{
    CreateSessionPayload, MissingScores, SaveAndEndResponse, SessionSummary, SetScoresPayload,
};
use crate::error::{Error, Result};
use crate::models::participant::{AdmissionState, ControlAction, Participant, TestTakingState};
use crate::models::result::TestResult;
use crate::models::test::Test;
use crate::models::test_session::{SessionStatus, TestSession};
use crate::models::user::CourseCenter;
use crate::services::audit_service::AuditService;
use crate::services::scoring_service::ScoringService;
use crate::utils::time::minutes_from;

/// Which sessions the caller may see and control.
#[derive(Debug, Clone)]
pub enum SessionScope {
    Admin,
    Center(CourseCenter),
}

impl SessionScope {
    pub fn center_id(&self) -> Option<Uuid> {
        match self {
            SessionScope::Admin => None,
            SessionScope::Center(center) => Some(center.id),
        }
    }

    pub fn permits(&self, session: &TestSession) -> bool {
        match self {
            SessionScope::Admin => true,
            SessionScope::Center(center) => session.center_id == Some(center.id),
        }
    }

    /// Centers may not exceed their per-session seat allowance.
    pub fn capped_capacity(&self, requested: Option<i32>) -> Option<i32> {
        match self {
            SessionScope::Admin => requested,
            SessionScope::Center(center) => Some(
                requested
                    .map(|r| r.min(center.max_session_users))
                    .unwrap_or(center.max_session_users),
            ),
        }
    }
}

const START_SQL: &str = r#"
    UPDATE test_participants
    SET test_taking_state = 'in_progress',
        test_started = TRUE,
        test_started_at = $3,
        test_end_at = $4,
        current_screen = 'listening',
        updated_at = NOW()
    WHERE id = $1 AND test_taking_state = $2 AND admission_state = 'admitted'
"#;

const PAUSE_SQL: &str = r#"
    UPDATE test_participants
    SET test_taking_state = 'paused',
        paused_at = $3,
        updated_at = NOW()
    WHERE id = $1 AND test_taking_state = $2
"#;

const RESTART_SQL: &str = r#"
    UPDATE test_participants
    SET test_taking_state = 'in_progress',
        total_pause_seconds = total_pause_seconds
            + GREATEST(0, EXTRACT(EPOCH FROM ($3 - COALESCE(paused_at, $3))))::BIGINT,
        test_end_at = test_end_at + GREATEST(INTERVAL '0 seconds', $3 - COALESCE(paused_at, $3)),
        paused_at = NULL,
        updated_at = NOW()
    WHERE id = $1 AND test_taking_state = $2
"#;

const END_SQL: &str = r#"
    UPDATE test_participants
    SET test_taking_state = 'completed',
        admission_state = 'expired',
        test_completed_at = $3,
        total_pause_seconds = total_pause_seconds
            + GREATEST(0, EXTRACT(EPOCH FROM ($3 - COALESCE(paused_at, $3))))::BIGINT,
        paused_at = NULL,
        updated_at = NOW()
    WHERE id = $1 AND test_taking_state = $2
"#;

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    audit: AuditService,
    test_buffer_minutes: i64,
}

impl SessionService {
    pub fn new(pool: PgPool, audit: AuditService, test_buffer_minutes: i64) -> Self {
        Self {
            pool,
            audit,
            test_buffer_minutes,
        }
    }

    pub async fn create_session(
        &self,
        payload: CreateSessionPayload,
        created_by: Uuid,
        scope: &SessionScope,
    ) -> Result<TestSession> {
        let test = self.get_test(payload.test_id).await?;
        let materials_test_id: Option<Uuid> =
            sqlx::query_scalar("SELECT test_id FROM test_materials WHERE id = $1")
                .bind(payload.test_materials_id)
                .fetch_optional(&self.pool)
                .await?;
        match materials_test_id {
            None => return Err(Error::NotFound("Test materials not found".into())),
            Some(id) if id != test.id => {
                return Err(Error::BadRequest(
                    "Test materials do not belong to the selected test".into(),
                ))
            }
            Some(_) => {}
        }

        let session = sqlx::query_as::<_, TestSession>(
            r#"
            INSERT INTO test_sessions (
                test_id, test_materials_id, center_id, created_by,
                session_date, location, max_capacity, admin_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(test.id)
        .bind(payload.test_materials_id)
        .bind(scope.center_id())
        .bind(created_by)
        .bind(payload.session_date)
        .bind(payload.location.trim())
        .bind(scope.capped_capacity(payload.max_capacity))
        .bind(payload.admin_notes)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(session_id = %session.id, test_id = %test.id, "test session created");
        self.audit
            .record(
                Some(created_by),
                "session_created",
                "test_session",
                session.id,
                Some(json!({ "center_id": session.center_id, "max_capacity": session.max_capacity })),
            )
            .await;
        Ok(session)
    }

    pub async fn list_sessions(&self, scope: &SessionScope) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query_as::<_, SessionSummary>(
            r#"
            SELECT s.*,
                   t.name AS test_name,
                   (SELECT COUNT(*) FROM test_participants p WHERE p.session_id = s.id) AS participant_count
            FROM test_sessions s
            JOIN tests t ON t.id = s.test_id
            WHERE ($1::uuid IS NULL OR s.center_id = $1)
            ORDER BY s.session_date DESC
            "#,
        )
        .bind(scope.center_id())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_session(&self, session_id: Uuid) -> Result<TestSession> {
        sqlx::query_as::<_, TestSession>("SELECT * FROM test_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".into()))
    }

    /// Sessions outside the caller's scope are reported as missing.
    pub async fn get_session(&self, session_id: Uuid, scope: &SessionScope) -> Result<TestSession> {
        let session = self.find_session(session_id).await?;
        if !scope.permits(&session) {
            return Err(Error::NotFound("Session not found".into()));
        }
        Ok(session)
    }

    pub async fn update_status(
        &self,
        session_id: Uuid,
        raw_status: &str,
        scope: &SessionScope,
        actor: Uuid,
    ) -> Result<TestSession> {
        let next = SessionStatus::parse(raw_status.trim())
            .ok_or_else(|| Error::BadRequest(format!("Unknown session status: {}", raw_status)))?;
        let session = self.get_session(session_id, scope).await?;
        let current = session
            .session_status()
            .ok_or_else(|| Error::Internal(format!("session has unknown status {}", session.status)))?;
        if !current.can_transition_to(next) {
            return Err(Error::BadRequest(format!(
                "Cannot change session status from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }

        let updated = sqlx::query_as::<_, TestSession>(
            r#"
            UPDATE test_sessions
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(next.as_str())
        .bind(current.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::BadRequest("Session status changed concurrently, retry".into()))?;

        tracing::info!(
            session_id = %session_id,
            from = current.as_str(),
            to = next.as_str(),
            "session status updated"
        );
        self.audit
            .record(
                Some(actor),
                "session_status_changed",
                "test_session",
                session_id,
                Some(json!({ "from": current.as_str(), "to": next.as_str() })),
            )
            .await;
        Ok(updated)
    }

    pub async fn get_participant_in_session(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
    ) -> Result<Participant> {
        sqlx::query_as::<_, Participant>(
            "SELECT * FROM test_participants WHERE id = $1 AND session_id = $2",
        )
        .bind(participant_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Participant not found".into()))
    }

    async fn get_test(&self, test_id: Uuid) -> Result<Test> {
        sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1")
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".into()))
    }

    async fn deadline_from(&self, session: &TestSession, start: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let test = self.get_test(session.test_id).await?;
        Ok(minutes_from(start, test.total_minutes(self.test_buffer_minutes)))
    }

    /// Compare-and-set on `test_taking_state`: the row is only touched if it is
    /// still in `from`. Returns whether the row changed.
    async fn apply_transition(
        &self,
        participant_id: Uuid,
        from: TestTakingState,
        action: ControlAction,
        now: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        from.apply(action)
            .map_err(|e| Error::BadRequest(e.to_string()))?;

        let query = match action {
            ControlAction::Start => {
                let end_at = end_at
                    .ok_or_else(|| Error::Internal("start requires a deadline".into()))?;
                sqlx::query(START_SQL)
                    .bind(participant_id)
                    .bind(from.as_str())
                    .bind(now)
                    .bind(end_at)
            }
            ControlAction::Pause => sqlx::query(PAUSE_SQL)
                .bind(participant_id)
                .bind(from.as_str())
                .bind(now),
            ControlAction::Restart => sqlx::query(RESTART_SQL)
                .bind(participant_id)
                .bind(from.as_str())
                .bind(now),
            ControlAction::End => sqlx::query(END_SQL)
                .bind(participant_id)
                .bind(from.as_str())
                .bind(now),
        };

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Applies `action` to every participant currently in one of `from_states`.
    /// Rows are updated one by one; a failing row is logged and skipped.
    async fn bulk_transition(
        &self,
        session_id: Uuid,
        action: ControlAction,
        from_states: &[TestTakingState],
        now: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let states: Vec<String> = from_states.iter().map(|s| s.as_str().to_string()).collect();
        let admitted_only = action == ControlAction::Start;
        let targets: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT id, test_taking_state
            FROM test_participants
            WHERE session_id = $1
              AND test_taking_state = ANY($2)
              AND ($3 = FALSE OR admission_state = 'admitted')
            ORDER BY created_at
            "#,
        )
        .bind(session_id)
        .bind(&states)
        .bind(admitted_only)
        .fetch_all(&self.pool)
        .await?;

        let mut updated = 0u64;
        for (participant_id, state) in targets {
            let Some(from) = TestTakingState::parse(&state) else {
                tracing::warn!(participant_id = %participant_id, state = %state, "unknown test state, skipped");
                continue;
            };
            match self
                .apply_transition(participant_id, from, action, now, end_at)
                .await
            {
                Ok(true) => updated += 1,
                Ok(false) => tracing::debug!(
                    participant_id = %participant_id,
                    "participant changed state concurrently, skipped"
                ),
                Err(e) => tracing::warn!(
                    participant_id = %participant_id,
                    action = action.as_str(),
                    error = %e,
                    "bulk transition failed for participant"
                ),
            }
        }

        tracing::info!(
            session_id = %session_id,
            action = action.as_str(),
            updated,
            "bulk participant control applied"
        );
        Ok(updated)
    }

    fn ensure_open(session: &TestSession) -> Result<()> {
        if session.is_closed() {
            return Err(Error::BadRequest(format!("Session is {}", session.status)));
        }
        Ok(())
    }

    pub async fn start_all(&self, session_id: Uuid, scope: &SessionScope, actor: Uuid) -> Result<u64> {
        let session = self.get_session(session_id, scope).await?;
        Self::ensure_open(&session)?;

        let now = Utc::now();
        let end_at = self.deadline_from(&session, now).await?;
        let updated = self
            .bulk_transition(
                session_id,
                ControlAction::Start,
                &[TestTakingState::NotStarted],
                now,
                Some(end_at),
            )
            .await?;

        sqlx::query(
            r#"
            UPDATE test_sessions
            SET status = CASE WHEN status = 'scheduled' THEN 'ongoing' ELSE status END,
                test_started_at = COALESCE(test_started_at, $2),
                test_end_at = GREATEST(COALESCE(test_end_at, $3), $3),
                test_paused_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(now)
        .bind(end_at)
        .execute(&self.pool)
        .await?;

        self.audit
            .record(
                Some(actor),
                "start_all",
                "test_session",
                session_id,
                Some(json!({ "updated_count": updated, "test_end_at": end_at })),
            )
            .await;
        Ok(updated)
    }

    pub async fn pause_all(&self, session_id: Uuid, scope: &SessionScope, actor: Uuid) -> Result<u64> {
        let session = self.get_session(session_id, scope).await?;
        Self::ensure_open(&session)?;

        let now = Utc::now();
        let updated = self
            .bulk_transition(
                session_id,
                ControlAction::Pause,
                &[TestTakingState::InProgress],
                now,
                None,
            )
            .await?;

        if updated > 0 {
            sqlx::query(
                r#"
                UPDATE test_sessions
                SET test_paused_at = COALESCE(test_paused_at, $2), updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(session_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        self.audit
            .record(
                Some(actor),
                "pause_all",
                "test_session",
                session_id,
                Some(json!({ "updated_count": updated })),
            )
            .await;
        Ok(updated)
    }

    pub async fn restart_all(&self, session_id: Uuid, scope: &SessionScope, actor: Uuid) -> Result<u64> {
        let session = self.get_session(session_id, scope).await?;
        Self::ensure_open(&session)?;

        let now = Utc::now();
        let updated = self
            .bulk_transition(
                session_id,
                ControlAction::Restart,
                &[TestTakingState::Paused],
                now,
                None,
            )
            .await?;

        sqlx::query(
            r#"
            UPDATE test_sessions
            SET test_end_at = test_end_at + GREATEST(INTERVAL '0 seconds', $2 - COALESCE(test_paused_at, $2)),
                test_paused_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND test_paused_at IS NOT NULL
            "#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.audit
            .record(
                Some(actor),
                "restart_all",
                "test_session",
                session_id,
                Some(json!({ "updated_count": updated })),
            )
            .await;
        Ok(updated)
    }

    pub async fn end_all(&self, session_id: Uuid, scope: &SessionScope, actor: Uuid) -> Result<u64> {
        self.get_session(session_id, scope).await?;

        let updated = self
            .bulk_transition(
                session_id,
                ControlAction::End,
                &[TestTakingState::InProgress, TestTakingState::Paused],
                Utc::now(),
                None,
            )
            .await?;

        self.audit
            .record(
                Some(actor),
                "end_all",
                "test_session",
                session_id,
                Some(json!({ "updated_count": updated })),
            )
            .await;
        Ok(updated)
    }

    pub async fn control_participant(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        action: ControlAction,
        scope: &SessionScope,
        actor: Uuid,
    ) -> Result<Participant> {
        let session = self.get_session(session_id, scope).await?;
        if action != ControlAction::End {
            Self::ensure_open(&session)?;
        }
        let participant = self
            .get_participant_in_session(session_id, participant_id)
            .await?;
        let from = participant.test_taking();
        let to = from
            .apply(action)
            .map_err(|e| Error::BadRequest(e.to_string()))?;

        let now = Utc::now();
        let end_at = if action == ControlAction::Start {
            if participant.admission() != AdmissionState::Admitted {
                return Err(Error::BadRequest("Participant has not checked in".into()));
            }
            Some(self.deadline_from(&session, now).await?)
        } else {
            None
        };

        if !self
            .apply_transition(participant_id, from, action, now, end_at)
            .await?
        {
            return Err(Error::BadRequest(
                "Participant state changed concurrently, retry".into(),
            ));
        }

        tracing::info!(
            session_id = %session_id,
            participant_id = %participant_id,
            from = from.as_str(),
            to = to.as_str(),
            "participant control applied"
        );
        self.audit
            .record(
                Some(actor),
                &format!("participant_{}", action.as_str()),
                "test_participant",
                participant_id,
                Some(json!({ "from": from.as_str(), "to": to.as_str() })),
            )
            .await;

        self.get_participant_in_session(session_id, participant_id)
            .await
    }

    pub async fn pause_participant(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        scope: &SessionScope,
        actor: Uuid,
    ) -> Result<Participant> {
        self.control_participant(session_id, participant_id, ControlAction::Pause, scope, actor)
            .await
    }

    pub async fn restart_participant(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        scope: &SessionScope,
        actor: Uuid,
    ) -> Result<Participant> {
        self.control_participant(session_id, participant_id, ControlAction::Restart, scope, actor)
            .await
    }

    pub async fn end_participant(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        scope: &SessionScope,
        actor: Uuid,
    ) -> Result<Participant> {
        self.control_participant(session_id, participant_id, ControlAction::End, scope, actor)
            .await
    }

    pub async fn set_scores(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        payload: SetScoresPayload,
        scope: &SessionScope,
        actor: Uuid,
    ) -> Result<Participant> {
        self.get_session(session_id, scope).await?;
        for (field, value) in [
            ("listening_score", payload.listening_score),
            ("reading_score", payload.reading_score),
            ("writing_score", payload.writing_score),
            ("speaking_score", payload.speaking_score),
        ] {
            let Some(band) = value else { continue };
            let (valid, lowest) = if field == "writing_score" {
                (ScoringService::is_valid_writing_band(band), "0.5")
            } else {
                (ScoringService::is_valid_band(band), "0")
            };
            if !valid {
                return Err(Error::BadRequest(format!(
                    "{} must be between {} and 9 in steps of 0.5",
                    field, lowest
                )));
            }
        }

        let participant = sqlx::query_as::<_, Participant>(
            r#"
            UPDATE test_participants
            SET listening_score = COALESCE($3, listening_score),
                reading_score = COALESCE($4, reading_score),
                writing_score = COALESCE($5, writing_score),
                speaking_score = COALESCE($6, speaking_score),
                updated_at = NOW()
            WHERE id = $1 AND session_id = $2
            RETURNING *
            "#,
        )
        .bind(participant_id)
        .bind(session_id)
        .bind(payload.listening_score)
        .bind(payload.reading_score)
        .bind(payload.writing_score)
        .bind(payload.speaking_score)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Participant not found".into()))?;

        self.audit
            .record(
                Some(actor),
                "scores_updated",
                "test_participant",
                participant_id,
                Some(json!({
                    "listening_score": payload.listening_score,
                    "reading_score": payload.reading_score,
                    "writing_score": payload.writing_score,
                    "speaking_score": payload.speaking_score,
                })),
            )
            .await;
        Ok(participant)
    }

    /// Writes one result per completed participant and closes the session, or
    /// writes nothing when any of them is missing a score.
    pub async fn save_and_end(
        &self,
        session_id: Uuid,
        scope: &SessionScope,
        actor: Uuid,
    ) -> Result<SaveAndEndResponse> {
        let session = self.get_session(session_id, scope).await?;
        Self::ensure_open(&session)?;

        let completed = sqlx::query_as::<_, Participant>(
            r#"
            SELECT * FROM test_participants
            WHERE session_id = $1 AND test_taking_state = 'completed'
            ORDER BY full_name
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        if completed.is_empty() {
            return Err(Error::BadRequest(
                "No completed participants to save results for".into(),
            ));
        }
        let incomplete = collect_missing_scores(&completed);
        if !incomplete.is_empty() {
            tracing::info!(
                session_id = %session_id,
                incomplete = incomplete.len(),
                "save and end refused, scores missing"
            );
            return Err(Error::IncompleteScores(incomplete));
        }

        let mut tx = self.pool.begin().await?;
        let mut saved: Vec<TestResult> = Vec::with_capacity(completed.len());
        for participant in &completed {
            let (Some(student_id), Some(listening), Some(reading), Some(writing), Some(speaking)) = (
                participant.user_id,
                participant.listening_score,
                participant.reading_score,
                participant.writing_score,
                participant.speaking_score,
            ) else {
                return Err(Error::Internal(format!(
                    "participant {} lost a score during save",
                    participant.id
                )));
            };
            let overall = ScoringService::overall_band(listening, reading, writing, speaking);

            let result = sqlx::query_as::<_, TestResult>(
                r#"
                INSERT INTO results (
                    student_id, test_id, session_id,
                    listening_score, reading_score, writing_score, speaking_score, overall_score
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (student_id, test_id) DO UPDATE
                SET session_id = EXCLUDED.session_id,
                    listening_score = EXCLUDED.listening_score,
                    reading_score = EXCLUDED.reading_score,
                    writing_score = EXCLUDED.writing_score,
                    speaking_score = EXCLUDED.speaking_score,
                    overall_score = EXCLUDED.overall_score,
                    updated_at = NOW()
                RETURNING *
                "#,
            )
            .bind(student_id)
            .bind(session.test_id)
            .bind(session_id)
            .bind(listening)
            .bind(reading)
            .bind(writing)
            .bind(speaking)
            .bind(overall)
            .fetch_one(&mut *tx)
            .await?;
            tracing::debug!(
                result_id = %result.id,
                student_id = %result.student_id,
                overall = %result.overall_score,
                "result saved"
            );
            saved.push(result);
        }

        let closed = sqlx::query(
            r#"
            UPDATE test_sessions
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status IN ('scheduled', 'ongoing')
            "#,
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
        if closed.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(Error::BadRequest("Session was closed concurrently".into()));
        }
        tx.commit().await?;

        let saved_results = saved.len();
        tracing::info!(session_id = %session_id, saved_results, "session results saved and closed");
        self.audit
            .record(
                Some(actor),
                "save_and_end",
                "test_session",
                session_id,
                Some(json!({ "saved_results": saved_results })),
            )
            .await;

        Ok(SaveAndEndResponse {
            message: "Results saved and session completed".into(),
            saved_results,
        })
    }

    /// Closes out participants whose deadline has passed. A paused participant's
    /// clock is frozen, so it only counts once the deadline precedes the pause.
    pub async fn expire_overdue(&self, session_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE test_participants
            SET test_taking_state = 'completed',
                admission_state = 'expired',
                test_completed_at = COALESCE(test_completed_at, test_end_at),
                paused_at = NULL,
                updated_at = NOW()
            WHERE session_id = $1
              AND test_end_at IS NOT NULL
              AND (
                    (test_taking_state = 'in_progress' AND test_end_at <= NOW())
                 OR (test_taking_state = 'paused' AND test_end_at <= paused_at)
              )
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            tracing::info!(session_id = %session_id, expired, "overdue participants expired");
        }
        Ok(expired)
    }
}

/// Every completed participant needs all four bands, a reviewed writing band
/// and a linked student account before results can be written.
pub fn collect_missing_scores(participants: &[Participant]) -> Vec<MissingScores> {
    participants
        .iter()
        .filter(|p| p.test_taking() == TestTakingState::Completed)
        .filter_map(|p| {
            let mut missing: Vec<String> =
                p.missing_scores().into_iter().map(String::from).collect();
            if p.user_id.is_none() {
                missing.push("student_account".to_string());
            }
            (!missing.is_empty()).then(|| MissingScores {
                participant_id: p.id,
                participant_id_code: p.participant_id_code.clone(),
                full_name: p.full_name.clone(),
                missing,
            })
        })
        .collect()
}
