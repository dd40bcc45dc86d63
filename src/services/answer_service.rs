use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::dto::participant_dto::{SubmitSectionResponse, SubmitWritingResponse};
use crate::dto::session_dto::{AnswerListItem, ReviewWritingPayload, WritingSubmissionItem};
use crate::error::{Error, Result};
use crate::models::participant::{Participant, TestTakingState};
use crate::models::participant_answer::{SectionType, WritingSubmission};
use crate::models::test_session::SessionStatus;
use crate::services::answer_key_service::AnswerKeyService;
use crate::services::audit_service::AuditService;
use crate::services::participant_service::ParticipantService;
use crate::services::scoring_service::{GradedAnswer, ScoringService};
use crate::services::session_service::SessionService;

#[derive(Clone)]
pub struct AnswerService {
    pool: PgPool,
    answer_keys: AnswerKeyService,
    participants: ParticipantService,
    sessions: SessionService,
    audit: AuditService,
}

impl AnswerService {
    pub fn new(
        pool: PgPool,
        answer_keys: AnswerKeyService,
        participants: ParticipantService,
        sessions: SessionService,
        audit: AuditService,
    ) -> Self {
        Self {
            pool,
            answer_keys,
            participants,
            sessions,
            audit,
        }
    }

    fn ensure_taking(participant: &Participant) -> Result<()> {
        if !participant.test_started {
            return Err(Error::BadRequest("Test has not been started yet".into()));
        }
        match participant.test_taking() {
            TestTakingState::Paused => Err(Error::BadRequest("Test is currently paused".into())),
            TestTakingState::Completed => Err(Error::AlreadyUsed(
                "This participant has already finished the test".into(),
            )),
            _ => Ok(()),
        }
    }

    pub async fn submit_section(
        &self,
        section: SectionType,
        code: &str,
        claimed_name: Option<&str>,
        answers: &HashMap<i32, String>,
    ) -> Result<SubmitSectionResponse> {
        let participant = self.participants.authorize(code, claimed_name).await?;
        Self::ensure_taking(&participant)?;

        let session = self.sessions.find_session(participant.session_id).await?;
        let key = self.answer_keys.load(session.test_materials_id).await?;
        let score = ScoringService::calculate_section_score(section, key.section(section), answers);
        let band = score.band_decimal();

        let mut tx = self.pool.begin().await?;
        record_section_answers(&mut tx, &participant, section, &score.graded).await?;

        let update = match section {
            SectionType::Listening => {
                r#"
                UPDATE test_participants
                SET listening_raw_score = $2, listening_score = $3, current_screen = $4,
                    last_activity_at = NOW(), updated_at = NOW()
                WHERE id = $1
                "#
            }
            SectionType::Reading => {
                r#"
                UPDATE test_participants
                SET reading_raw_score = $2, reading_score = $3, current_screen = $4,
                    last_activity_at = NOW(), updated_at = NOW()
                WHERE id = $1
                "#
            }
        };
        sqlx::query(update)
            .bind(participant.id)
            .bind(score.raw_score)
            .bind(band)
            .bind(section.next_screen())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            participant_id = %participant.id,
            section = section.as_str(),
            raw_score = score.raw_score,
            band = %band,
            "section submitted"
        );

        Ok(SubmitSectionResponse {
            message: format!("{} answers submitted", section.as_str()),
            section: section.as_str().to_string(),
            raw_score: score.raw_score,
            band_score: band,
            total_questions: score.graded.len(),
            next_screen: section.next_screen().to_string(),
        })
    }

    /// Stores the single writing script and closes the participant's sitting.
    pub async fn submit_writing(
        &self,
        code: &str,
        claimed_name: Option<&str>,
        answers: &HashMap<i32, String>,
    ) -> Result<SubmitWritingResponse> {
        let participant = self.participants.authorize(code, claimed_name).await?;
        Self::ensure_taking(&participant)?;

        let writing = ScoringService::process_writing_score(answers);
        let task_1 = answers.get(&1).cloned().unwrap_or_default();
        let task_2 = answers.get(&2).cloned().unwrap_or_default();

        let mut tx = self.pool.begin().await?;
        let submission_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO writing_submissions (
                session_id, participant_id, task_1_content, task_2_content,
                task_1_word_count, task_2_word_count
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (participant_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(participant.session_id)
        .bind(participant.id)
        .bind(&task_1)
        .bind(&task_2)
        .bind(writing.task_1.word_count as i32)
        .bind(writing.task_2.word_count as i32)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(submission_id) = submission_id else {
            return Err(Error::AlreadyUsed("Writing has already been submitted".into()));
        };

        sqlx::query(
            r#"
            UPDATE test_participants
            SET writing_score = COALESCE(writing_score, 0),
                test_taking_state = 'completed',
                admission_state = 'expired',
                test_completed_at = NOW(),
                current_screen = 'completed',
                paused_at = NULL,
                last_activity_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(participant.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            participant_id = %participant.id,
            submission_id = %submission_id,
            task_1_words = writing.task_1.word_count,
            task_2_words = writing.task_2.word_count,
            "writing submitted, participant completed"
        );

        Ok(SubmitWritingResponse {
            message: "Writing submitted. The test is complete".into(),
            submission_id,
            writing,
        })
    }

    pub async fn get_writing_submission(&self, submission_id: Uuid) -> Result<WritingSubmission> {
        sqlx::query_as::<_, WritingSubmission>("SELECT * FROM writing_submissions WHERE id = $1")
            .bind(submission_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Writing submission not found".into()))
    }

    pub async fn review_writing(
        &self,
        submission_id: Uuid,
        payload: ReviewWritingPayload,
        reviewer: Uuid,
    ) -> Result<WritingSubmission> {
        if !ScoringService::is_valid_writing_band(payload.writing_score) {
            return Err(Error::BadRequest(
                "writing_score must be between 0.5 and 9 in steps of 0.5".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let session_status: String = sqlx::query_scalar(
            r#"
            SELECT s.status
            FROM writing_submissions w
            JOIN test_sessions s ON s.id = w.session_id
            WHERE w.id = $1
            FOR UPDATE OF s
            "#,
        )
        .bind(submission_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Writing submission not found".into()))?;
        if session_status == SessionStatus::Completed.as_str() {
            return Err(Error::BadRequest(
                "Results for this session are already saved".into(),
            ));
        }
        let submission = sqlx::query_as::<_, WritingSubmission>(
            r#"
            UPDATE writing_submissions
            SET writing_score = $2,
                admin_notes = COALESCE($3, admin_notes),
                is_reviewed = TRUE,
                reviewed_by = $4,
                reviewed_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(submission_id)
        .bind(payload.writing_score)
        .bind(payload.admin_notes.as_deref())
        .bind(reviewer)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Writing submission not found".into()))?;

        sqlx::query(
            "UPDATE test_participants SET writing_score = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(submission.participant_id)
        .bind(payload.writing_score)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            submission_id = %submission_id,
            participant_id = %submission.participant_id,
            writing_score = %payload.writing_score,
            "writing reviewed"
        );
        self.audit
            .record(
                Some(reviewer),
                "writing_reviewed",
                "writing_submission",
                submission_id,
                Some(json!({ "writing_score": payload.writing_score })),
            )
            .await;
        Ok(submission)
    }

    pub async fn list_writing_submissions(&self, session_id: Uuid) -> Result<Vec<WritingSubmissionItem>> {
        let rows = sqlx::query_as::<_, WritingSubmissionItem>(
            r#"
            SELECT w.id, w.participant_id, p.participant_id_code, p.full_name,
                   w.task_1_content, w.task_2_content, w.task_1_word_count, w.task_2_word_count,
                   w.writing_score, w.admin_notes, w.is_reviewed, w.submitted_at
            FROM writing_submissions w
            JOIN test_participants p ON p.id = w.participant_id
            WHERE w.session_id = $1
            ORDER BY w.is_reviewed, w.submitted_at
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_participant_answers(&self, participant_id: Uuid) -> Result<Vec<AnswerListItem>> {
        let rows = sqlx::query_as::<_, AnswerListItem>(
            r#"
            SELECT section_type, question_number, user_answer, correct_answer, is_correct
            FROM participant_answers
            WHERE participant_id = $1
            ORDER BY section_type, question_number
            "#,
        )
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Upserts one row per key question; resubmission overwrites the previous answer.
pub async fn record_section_answers(
    tx: &mut Transaction<'_, Postgres>,
    participant: &Participant,
    section: SectionType,
    graded: &[GradedAnswer],
) -> Result<()> {
    for answer in graded {
        sqlx::query(
            r#"
            INSERT INTO participant_answers (
                session_id, participant_id, section_type, question_number,
                user_answer, correct_answer, is_correct
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (session_id, participant_id, section_type, question_number) DO UPDATE
            SET user_answer = EXCLUDED.user_answer,
                correct_answer = EXCLUDED.correct_answer,
                is_correct = EXCLUDED.is_correct,
                updated_at = NOW()
            "#,
        )
        .bind(participant.session_id)
        .bind(participant.id)
        .bind(section.as_str())
        .bind(answer.question_number)
        .bind(answer.user_answer.as_deref())
        .bind(&answer.correct_answer)
        .bind(answer.is_correct)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
