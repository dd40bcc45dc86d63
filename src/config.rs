use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub answer_keys_dir: PathBuf,
    pub answer_key_cache_capacity: usize,
    pub public_rps: u32,
    pub admin_rps: u32,
    /// Honour `X-Forwarded-For` / `X-Real-IP`. Only enable behind a proxy that sets them.
    pub trust_proxy_headers: bool,
    /// Extra minutes added on top of the three timed sections when a test is started.
    pub test_buffer_minutes: i64,
    pub offline_threshold_seconds: i64,
    pub bootstrap_admin_phone: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            token_ttl_hours: get_env_parse_or("TOKEN_TTL_HOURS", 24)?,
            answer_keys_dir: PathBuf::from(
                env::var("ANSWER_KEYS_DIR").unwrap_or_else(|_| "uploads/answer_keys".to_string()),
            ),
            answer_key_cache_capacity: get_env_parse_or("ANSWER_KEY_CACHE_CAPACITY", 64)?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            admin_rps: get_env_parse("ADMIN_RPS")?,
            trust_proxy_headers: get_env_parse_or("TRUST_PROXY_HEADERS", false)?,
            test_buffer_minutes: get_env_parse_or("TEST_BUFFER_MINUTES", 60)?,
            offline_threshold_seconds: get_env_parse_or("OFFLINE_THRESHOLD_SECONDS", 300)?,
            bootstrap_admin_phone: env::var("BOOTSTRAP_ADMIN_PHONE").ok(),
            bootstrap_admin_password: env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(_) => get_env_parse(name),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
