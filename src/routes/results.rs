use axum::{
    extract::State,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;

use crate::{
    error::Result, middleware::auth::AuthUser, services::session_service::SessionScope, AppState,
};

#[axum::debug_handler]
pub async fn my_results(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let results = state.result_service.list_for_student(user.id).await?;
    Ok(Json(json!({ "results": results })))
}

#[axum::debug_handler]
pub async fn latest_result(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let result = state.result_service.latest_for_student(user.id).await?;
    Ok(Json(json!({ "result": result })))
}

#[axum::debug_handler]
pub async fn my_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let stats = state.result_service.stats_for_student(user.id).await?;
    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/api/admin/results",
    responses(
        (status = 200, description = "Saved results visible to the caller")
    )
)]
#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Extension(scope): Extension<SessionScope>,
) -> Result<impl IntoResponse> {
    let results = state.result_service.list_for_scope(&scope).await?;
    Ok(Json(results))
}
