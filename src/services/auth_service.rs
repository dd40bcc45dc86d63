use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::auth_dto::{LoginRequest, RegisterRequest};
use crate::error::{Error, Result};
use crate::middleware::auth::{AuthUser, Claims};
use crate::models::user::{CourseCenter, User, UserRole, UserSession};
use crate::services::session_service::SessionScope;
use crate::utils::crypto::{hash_password, hash_token, verify_password};
use crate::utils::validation::normalize_phone;

pub const DEFAULT_MAX_SESSION_USERS: i32 = 50;

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt_secret: String,
    token_ttl_hours: i64,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt_secret: String, token_ttl_hours: i64) -> Self {
        Self {
            pool,
            jwt_secret,
            token_ttl_hours,
        }
    }

    pub async fn register(&self, payload: RegisterRequest) -> Result<(User, String)> {
        let phone = normalize_phone(&payload.phone_number);
        if phone.len() < 5 {
            return Err(Error::BadRequest("Invalid phone number".into()));
        }
        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE phone_number = $1")
                .bind(&phone)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(Error::BadRequest("Phone number already registered".into()));
        }

        let user = self
            .create_user(payload.full_name.trim(), &phone, &payload.password, UserRole::Student)
            .await?;
        let token = self.issue_token(&user).await?;
        tracing::info!(user_id = %user.id, "student registered");
        Ok((user, token))
    }

    pub async fn login(&self, payload: LoginRequest) -> Result<(User, String)> {
        let phone = normalize_phone(&payload.phone_number);
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone_number = $1")
            .bind(&phone)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::Unauthorized("Invalid phone number or password".into()))?;

        let valid = verify_password(&payload.password, &user.password_hash)
            .map_err(|e| Error::Internal(format!("password hash unreadable: {}", e)))?;
        if !valid {
            tracing::warn!(user_id = %user.id, "failed login attempt");
            return Err(Error::Unauthorized("Invalid phone number or password".into()));
        }
        if user.status != "active" {
            return Err(Error::Forbidden("Account is inactive".into()));
        }

        let token = self.issue_token(&user).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok((user, token))
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// A token is accepted only when its signature verifies and its session row
    /// is still present and unexpired.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser> {
        let claims = self.decode_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| Error::Unauthorized("invalid_token".into()))?;

        let row: Option<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT u.role, u.status, u.full_name
            FROM user_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1 AND s.user_id = $2 AND s.expires_at > NOW()
            "#,
        )
        .bind(hash_token(token))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((role, status, full_name)) = row else {
            return Err(Error::Unauthorized("session_expired".into()));
        };
        if status != "active" {
            return Err(Error::Forbidden("Account is inactive".into()));
        }
        let role = UserRole::parse(&role)
            .ok_or_else(|| Error::Internal(format!("unknown role {}", role)))?;

        Ok(AuthUser {
            id: user_id,
            role,
            full_name,
        })
    }

    /// Admins see every session; centers only their own.
    pub async fn scope_for(&self, user: &AuthUser) -> Result<SessionScope> {
        match user.role {
            UserRole::Admin => Ok(SessionScope::Admin),
            UserRole::Center => Ok(SessionScope::Center(self.ensure_center(user).await?)),
            UserRole::Student => Err(Error::Forbidden("forbidden".into())),
        }
    }

    pub async fn ensure_center(&self, user: &AuthUser) -> Result<CourseCenter> {
        let center = sqlx::query_as::<_, CourseCenter>(
            r#"
            INSERT INTO course_centers (user_id, center_name, max_session_users)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(DEFAULT_MAX_SESSION_USERS)
        .fetch_one(&self.pool)
        .await?;
        Ok(center)
    }

    pub async fn ensure_bootstrap_admin(&self, phone: &str, password: &str) -> Result<()> {
        let phone = normalize_phone(phone);
        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE phone_number = $1")
                .bind(&phone)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            tracing::debug!("bootstrap admin already present");
            return Ok(());
        }
        let admin = self
            .create_user("Administrator", &phone, password, UserRole::Admin)
            .await?;
        tracing::info!(user_id = %admin.id, "bootstrap admin created");
        Ok(())
    }

    pub async fn create_user(
        &self,
        full_name: &str,
        phone: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User> {
        let password_hash = hash_password(password)
            .map_err(|e| Error::Internal(format!("failed to hash password: {}", e)))?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (full_name, phone_number, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(full_name)
        .bind(phone)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn issue_token(&self, user: &User) -> Result<String> {
        let expires_at = Utc::now() + Duration::hours(self.token_ttl_hours);
        let claims = Claims {
            sub: user.id.to_string(),
            exp: expires_at.timestamp() as usize,
            role: Some(user.role.clone()),
            jti: Some(Uuid::new_v4().to_string()),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| Error::Internal(format!("failed to sign token: {}", e)))?;

        let session = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        tracing::debug!(user_id = %session.user_id, expires_at = %session.expires_at, "user session opened");

        Ok(token)
    }

    fn decode_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|_| Error::Unauthorized("invalid_token".into()))
    }
}
