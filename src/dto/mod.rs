pub mod auth_dto;
pub mod participant_dto;
pub mod session_dto;
