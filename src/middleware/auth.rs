use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::Error;
use crate::models::user::UserRole;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
    /// Makes every issued token distinct, even for the same user and second.
    #[serde(default)]
    pub jti: Option<String>,
}

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    pub full_name: String,
}

/// Raw bearer token of the current request, kept for logout.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

fn bearer_token(req: &Request) -> std::result::Result<String, Response> {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"missing_authorization"})),
        )
            .into_response());
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"bad_authorization"})),
        )
            .into_response());
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"unsupported_scheme"})),
        )
            .into_response());
    };
    Ok(token.trim().to_string())
}

pub async fn require_roles(
    state: &AppState,
    mut req: Request,
    next: Next,
    allowed: &[UserRole],
) -> Response {
    let token = match bearer_token(&req) {
        Ok(token) => token,
        Err(resp) => return resp,
    };

    let user = match state.auth_service.authenticate(&token).await {
        Ok(user) => user,
        Err(Error::Unauthorized(reason)) => {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": reason }))).into_response();
        }
        Err(e) => return e.into_response(),
    };

    if !allowed.is_empty() && !allowed.contains(&user.role) {
        tracing::warn!(user_id = %user.id, role = user.role.as_str(), "role not permitted");
        return (StatusCode::FORBIDDEN, Json(json!({"error":"forbidden"}))).into_response();
    }

    if matches!(user.role, UserRole::Admin | UserRole::Center) {
        match state.auth_service.scope_for(&user).await {
            Ok(scope) => {
                req.extensions_mut().insert(scope);
            }
            Err(e) => return e.into_response(),
        }
    }

    req.extensions_mut().insert(BearerToken(token));
    req.extensions_mut().insert(user);
    next.run(req).await
}

pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    require_roles(&state, req, next, &[UserRole::Admin]).await
}

pub async fn require_center(State(state): State<AppState>, req: Request, next: Next) -> Response {
    require_roles(&state, req, next, &[UserRole::Center]).await
}

pub async fn require_user(State(state): State<AppState>, req: Request, next: Next) -> Response {
    require_roles(&state, req, next, &[]).await
}
