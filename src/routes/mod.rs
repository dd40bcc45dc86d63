pub mod auth;
pub mod control;
pub mod health;
pub mod participant;
pub mod results;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    config::Config,
    middleware::{
        auth::{require_admin, require_center, require_user},
        cors::api_cors,
        rate_limit::{new_per_client_rps_state, new_rps_state, rps_middleware},
    },
    AppState,
};

/// Session, participant and scoring routes shared by the admin and center groups.
fn session_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/sessions",
            get(control::list_sessions).post(control::create_session),
        )
        .route("/sessions/:id", get(control::get_session))
        .route("/sessions/:id/status", patch(control::update_session_status))
        .route(
            "/sessions/:id/participants",
            get(control::list_participants).post(control::register_participants),
        )
        .route("/sessions/:id/start-all", post(control::start_all))
        .route("/sessions/:id/pause-all", post(control::pause_all))
        .route("/sessions/:id/restart-all", post(control::restart_all))
        .route("/sessions/:id/end-all", post(control::end_all))
        .route(
            "/sessions/:id/participants/:participant_id/pause",
            post(control::pause_participant),
        )
        .route(
            "/sessions/:id/participants/:participant_id/restart",
            post(control::restart_participant),
        )
        .route(
            "/sessions/:id/participants/:participant_id/end",
            post(control::end_participant),
        )
        .route(
            "/sessions/:id/participants/:participant_id/scores",
            put(control::set_scores),
        )
        .route(
            "/sessions/:id/participants/:participant_id/answers",
            get(control::list_participant_answers),
        )
        .route("/sessions/:id/save-and-end", post(control::save_and_end))
        .route("/sessions/:id/dashboard", get(control::dashboard))
        .route(
            "/sessions/:id/writing-submissions",
            get(control::list_writing_submissions),
        )
        .route(
            "/writing-submissions/:id/review",
            post(control::review_writing),
        )
        .route("/results", get(results::list_results))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let public_api = Router::new()
        .route("/api/users/register", post(auth::register))
        .route("/api/users/login", post(auth::login))
        .route(
            "/api/test-sessions/check-in-participant",
            post(participant::check_in_participant),
        )
        .route(
            "/api/test-sessions/validate-participant-ip",
            post(participant::validate_participant_ip),
        )
        .route(
            "/api/test-sessions/participant/:id_code/can-start",
            get(participant::can_start),
        )
        .route(
            "/api/test-sessions/submit-listening",
            post(participant::submit_listening),
        )
        .route(
            "/api/test-sessions/submit-reading",
            post(participant::submit_reading),
        )
        .route(
            "/api/test-sessions/submit-writing",
            post(participant::submit_writing),
        )
        .route(
            "/api/test-sessions/participant-activity",
            post(participant::participant_activity),
        )
        .layer(from_fn_with_state(
            new_per_client_rps_state(config.public_rps),
            rps_middleware,
        ));

    let user_api = Router::new()
        .route("/api/users/logout", post(auth::logout))
        .route("/api/dashboard/results", get(results::my_results))
        .route("/api/dashboard/latest-result", get(results::latest_result))
        .route("/api/dashboard/stats", get(results::my_stats))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let admin_group = session_routes()
        .route(
            "/tests",
            get(control::list_tests).post(control::create_test),
        )
        .route(
            "/materials",
            get(control::list_materials).post(control::create_materials),
        )
        .route(
            "/answer-keys/cache",
            delete(control::clear_answer_key_cache),
        )
        .route(
            "/answer-keys/:id",
            delete(control::invalidate_answer_key),
        );

    let admin_api = Router::new()
        .route("/api/test-sessions/create", post(control::create_session))
        .route(
            "/api/test-sessions/:id/status",
            patch(control::update_session_status),
        )
        .nest("/api/admin", admin_group)
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .layer(from_fn_with_state(
            new_rps_state(config.admin_rps),
            rps_middleware,
        ));

    let center_group = session_routes()
        .route("/tests", get(control::list_tests))
        .route("/materials", get(control::list_materials));

    let center_api = Router::new()
        .nest("/api/center", center_group)
        .route_layer(from_fn_with_state(state.clone(), require_center))
        .layer(from_fn_with_state(
            new_rps_state(config.admin_rps),
            rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(public_api)
        .merge(user_api)
        .merge(admin_api)
        .merge(center_api)
        .with_state(state)
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
}
