use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::session_dto::{
        BulkUpdateResponse, CacheClearResponse, CreateMaterialsPayload, CreateSessionPayload,
        CreateTestPayload, MaterialsQuery, RegisterParticipantsPayload, ReviewWritingPayload,
        SetScoresPayload, UpdateStatusPayload,
    },
    error::Result,
    middleware::auth::AuthUser,
    services::session_service::SessionScope,
    AppState,
};

fn bulk(message: &str, updated_count: u64) -> Json<BulkUpdateResponse> {
    Json(BulkUpdateResponse {
        message: message.to_string(),
        updated_count,
    })
}

#[utoipa::path(
    post,
    path = "/api/admin/tests",
    responses(
        (status = 201, description = "Test created"),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Json(payload): Json<CreateTestPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let test = state.test_service.create_test(payload).await?;
    Ok((StatusCode::CREATED, Json(test)))
}

#[axum::debug_handler]
pub async fn list_tests(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let tests = state.test_service.list_tests().await?;
    Ok(Json(tests))
}

#[utoipa::path(
    post,
    path = "/api/admin/materials",
    responses(
        (status = 201, description = "Test materials created"),
        (status = 404, description = "Test not found")
    )
)]
#[axum::debug_handler]
pub async fn create_materials(
    State(state): State<AppState>,
    Json(payload): Json<CreateMaterialsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let materials = state.test_service.create_materials(payload).await?;
    Ok((StatusCode::CREATED, Json(materials)))
}

#[axum::debug_handler]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<MaterialsQuery>,
) -> Result<impl IntoResponse> {
    let materials = state.test_service.list_materials(query.test_id).await?;
    Ok(Json(materials))
}

#[utoipa::path(
    post,
    path = "/api/admin/sessions",
    responses(
        (status = 201, description = "Session created"),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Test or materials not found")
    )
)]
#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state
        .session_service
        .create_session(payload, user.id, &scope)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(scope): Extension<SessionScope>,
) -> Result<impl IntoResponse> {
    let sessions = state.session_service.list_sessions(&scope).await?;
    Ok(Json(sessions))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state.session_service.get_session(session_id, &scope).await?;
    Ok(Json(session))
}

#[utoipa::path(
    patch,
    path = "/api/admin/sessions/{id}/status",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Transition not allowed"),
        (status = 404, description = "Session not found")
    )
)]
#[axum::debug_handler]
pub async fn update_session_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse> {
    let session = state
        .session_service
        .update_status(session_id, &payload.status, &scope, user.id)
        .await?;
    Ok(Json(session))
}

#[axum::debug_handler]
pub async fn register_participants(
    State(state): State<AppState>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<RegisterParticipantsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.session_service.get_session(session_id, &scope).await?;
    let result = state
        .participant_service
        .register_participants(&session, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[axum::debug_handler]
pub async fn list_participants(
    State(state): State<AppState>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.session_service.get_session(session_id, &scope).await?;
    let participants = state.participant_service.list_participants(session_id).await?;
    Ok(Json(participants))
}

#[utoipa::path(
    post,
    path = "/api/admin/sessions/{id}/start-all",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Admitted participants started"),
        (status = 400, description = "Session is closed")
    )
)]
#[axum::debug_handler]
pub async fn start_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let updated = state
        .session_service
        .start_all(session_id, &scope, user.id)
        .await?;
    Ok(bulk("Test started for admitted participants", updated))
}

#[axum::debug_handler]
pub async fn pause_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let updated = state
        .session_service
        .pause_all(session_id, &scope, user.id)
        .await?;
    Ok(bulk("Test paused", updated))
}

#[axum::debug_handler]
pub async fn restart_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let updated = state
        .session_service
        .restart_all(session_id, &scope, user.id)
        .await?;
    Ok(bulk("Test resumed", updated))
}

#[axum::debug_handler]
pub async fn end_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let updated = state
        .session_service
        .end_all(session_id, &scope, user.id)
        .await?;
    Ok(bulk("Test ended", updated))
}

#[axum::debug_handler]
pub async fn pause_participant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path((session_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let participant = state
        .session_service
        .pause_participant(session_id, participant_id, &scope, user.id)
        .await?;
    Ok(Json(participant))
}

#[axum::debug_handler]
pub async fn restart_participant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path((session_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let participant = state
        .session_service
        .restart_participant(session_id, participant_id, &scope, user.id)
        .await?;
    Ok(Json(participant))
}

#[axum::debug_handler]
pub async fn end_participant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path((session_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let participant = state
        .session_service
        .end_participant(session_id, participant_id, &scope, user.id)
        .await?;
    Ok(Json(participant))
}

#[axum::debug_handler]
pub async fn set_scores(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path((session_id, participant_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetScoresPayload>,
) -> Result<impl IntoResponse> {
    let participant = state
        .session_service
        .set_scores(session_id, participant_id, payload, &scope, user.id)
        .await?;
    Ok(Json(participant))
}

#[utoipa::path(
    post,
    path = "/api/admin/sessions/{id}/save-and-end",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Results written and session completed"),
        (status = 400, description = "Scores missing or nothing to save")
    )
)]
#[axum::debug_handler]
pub async fn save_and_end(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let result = state
        .session_service
        .save_and_end(session_id, &scope, user.id)
        .await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/admin/sessions/{id}/dashboard",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Live session dashboard"),
        (status = 404, description = "Session not found")
    )
)]
#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let dashboard = state
        .monitoring_service
        .dashboard(session_id, &scope)
        .await?;
    Ok(Json(dashboard))
}

#[axum::debug_handler]
pub async fn list_participant_answers(
    State(state): State<AppState>,
    Extension(scope): Extension<SessionScope>,
    Path((session_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    state.session_service.get_session(session_id, &scope).await?;
    let participant = state
        .session_service
        .get_participant_in_session(session_id, participant_id)
        .await?;
    let answers = state
        .answer_service
        .list_participant_answers(participant.id)
        .await?;
    Ok(Json(json!({
        "participant_id": participant.id,
        "full_name": participant.full_name,
        "answers": answers,
    })))
}

#[axum::debug_handler]
pub async fn list_writing_submissions(
    State(state): State<AppState>,
    Extension(scope): Extension<SessionScope>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.session_service.get_session(session_id, &scope).await?;
    let submissions = state
        .answer_service
        .list_writing_submissions(session_id)
        .await?;
    Ok(Json(submissions))
}

#[axum::debug_handler]
pub async fn review_writing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(scope): Extension<SessionScope>,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<ReviewWritingPayload>,
) -> Result<impl IntoResponse> {
    let submission = state
        .answer_service
        .get_writing_submission(submission_id)
        .await?;
    state
        .session_service
        .get_session(submission.session_id, &scope)
        .await?;
    let reviewed = state
        .answer_service
        .review_writing(submission_id, payload, user.id)
        .await?;
    Ok(Json(reviewed))
}

#[axum::debug_handler]
pub async fn clear_answer_key_cache(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let cleared = state.answer_keys.cache().clear();
    tracing::info!(user_id = %user.id, cleared, "answer key cache cleared");
    Ok(Json(CacheClearResponse {
        message: "Answer key cache cleared".into(),
        cleared,
    }))
}

#[axum::debug_handler]
pub async fn invalidate_answer_key(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(materials_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let cleared = usize::from(state.answer_keys.cache().invalidate(materials_id));
    tracing::info!(user_id = %user.id, test_materials_id = %materials_id, cleared, "answer key invalidated");
    Ok(Json(CacheClearResponse {
        message: "Answer key invalidated".into(),
        cleared,
    }))
}
