pub mod auth;
pub mod client_ip;
pub mod cors;
pub mod rate_limit;
