pub mod activity_service;
pub mod answer_key_service;
pub mod answer_service;
pub mod audit_service;
pub mod auth_service;
pub mod monitoring_service;
pub mod participant_service;
pub mod result_service;
pub mod scoring_service;
pub mod session_service;
pub mod test_service;
