pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    activity_service::ActivityService,
    answer_key_service::{AnswerKeyCache, AnswerKeyService},
    answer_service::AnswerService,
    audit_service::AuditService,
    auth_service::AuthService,
    monitoring_service::MonitoringService,
    participant_service::ParticipantService,
    result_service::ResultService,
    session_service::SessionService,
    test_service::TestService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub answer_keys: AnswerKeyService,
    pub audit_service: AuditService,
    pub auth_service: AuthService,
    pub test_service: TestService,
    pub session_service: SessionService,
    pub participant_service: ParticipantService,
    pub answer_service: AnswerService,
    pub activity_service: ActivityService,
    pub monitoring_service: MonitoringService,
    pub result_service: ResultService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let answer_keys = AnswerKeyService::new(
            config.answer_keys_dir.clone(),
            AnswerKeyCache::new(config.answer_key_cache_capacity),
        );
        let audit_service = AuditService::new(pool.clone());
        let auth_service = AuthService::new(
            pool.clone(),
            config.jwt_secret.clone(),
            config.token_ttl_hours,
        );
        let test_service = TestService::new(pool.clone());
        let session_service = SessionService::new(
            pool.clone(),
            audit_service.clone(),
            config.test_buffer_minutes,
        );
        let participant_service = ParticipantService::new(pool.clone(), session_service.clone());
        let answer_service = AnswerService::new(
            pool.clone(),
            answer_keys.clone(),
            participant_service.clone(),
            session_service.clone(),
            audit_service.clone(),
        );
        let activity_service = ActivityService::new(pool.clone(), participant_service.clone());
        let monitoring_service = MonitoringService::new(
            pool.clone(),
            session_service.clone(),
            participant_service.clone(),
            config.offline_threshold_seconds,
        );
        let result_service = ResultService::new(pool.clone());

        Self {
            pool,
            answer_keys,
            audit_service,
            auth_service,
            test_service,
            session_service,
            participant_service,
            answer_service,
            activity_service,
            monitoring_service,
            result_service,
        }
    }
}
