pub mod audit_log;
pub mod monitoring_event;
pub mod participant;
pub mod participant_answer;
pub mod result;
pub mod test_session;
pub mod user;
