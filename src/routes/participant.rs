use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use validator::Validate;

use crate::{
    dto::participant_dto::{
        CanStartQuery, CheckInRequest, CheckInResponse, ParticipantDetail,
        SubmitSectionRequest, SubmitWritingRequest, ValidateDeviceRequest,
    },
    error::Result,
    middleware::client_ip::ClientIp,
    models::participant_answer::SectionType,
    AppState,
};

#[axum::debug_handler]
pub async fn check_in_participant(
    State(state): State<AppState>,
    Json(payload): Json<CheckInRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (participant, session) = state
        .participant_service
        .check_in(&payload.participant_id_code, &payload.full_name)
        .await?;
    Ok(Json(CheckInResponse {
        message: "Check-in successful".into(),
        participant: ParticipantDetail::new(&participant, &session),
    }))
}

#[axum::debug_handler]
pub async fn validate_participant_ip(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Json(payload): Json<ValidateDeviceRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let result = state
        .participant_service
        .validate_device(
            &payload.participant_id_code,
            &payload.full_name,
            &payload.device_id,
            client_ip,
        )
        .await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn can_start(
    State(state): State<AppState>,
    Path(id_code): Path<String>,
    Query(query): Query<CanStartQuery>,
) -> Result<impl IntoResponse> {
    let result = state
        .participant_service
        .can_start(&id_code, query.full_name.as_deref())
        .await?;
    Ok(Json(result))
}

async fn submit_section(
    state: &AppState,
    section: SectionType,
    payload: SubmitSectionRequest,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let result = state
        .answer_service
        .submit_section(
            section,
            &payload.participant_id_code,
            payload.full_name.as_deref(),
            &payload.answers,
        )
        .await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn submit_listening(
    State(state): State<AppState>,
    Json(payload): Json<SubmitSectionRequest>,
) -> Result<impl IntoResponse> {
    submit_section(&state, SectionType::Listening, payload).await
}

#[axum::debug_handler]
pub async fn submit_reading(
    State(state): State<AppState>,
    Json(payload): Json<SubmitSectionRequest>,
) -> Result<impl IntoResponse> {
    submit_section(&state, SectionType::Reading, payload).await
}

#[axum::debug_handler]
pub async fn submit_writing(
    State(state): State<AppState>,
    Json(payload): Json<SubmitWritingRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let result = state
        .answer_service
        .submit_writing(
            &payload.participant_id_code,
            payload.full_name.as_deref(),
            &payload.answers,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Telemetry is accepted unconditionally and recorded in the background.
/// The body is parsed off the request path, so malformed reports still get 202.
#[axum::debug_handler]
pub async fn participant_activity(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    state.activity_service.spawn_record(body);
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}
