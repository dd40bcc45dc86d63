use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;
use validator::Validate;

use crate::{
    dto::auth_dto::{AuthResponse, LoginRequest, RegisterRequest},
    error::Result,
    middleware::auth::{AuthUser, BearerToken},
    AppState,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (user, token) = state.auth_service.register(payload).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (user, token) = state.auth_service.login(payload).await?;
    Ok(Json(AuthResponse { token, user }))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<impl IntoResponse> {
    state.auth_service.logout(&token).await?;
    tracing::info!(user_id = %user.id, "user logged out");
    Ok(Json(json!({ "message": "Logged out" })))
}
