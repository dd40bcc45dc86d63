use std::net::IpAddr;

use chrono::Utc;
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::participant_dto::{
    CanStartResponse, ParticipantScores, ValidateDeviceResponse,
};
use crate::dto::session_dto::{
    NewParticipant, RegisterFailure, RegisterParticipantsPayload, RegisterParticipantsResponse,
};
use crate::error::{Error, Result};
use crate::models::participant::{names_match, Participant};
use crate::models::test_session::TestSession;
use crate::services::session_service::SessionService;
use crate::utils::token::{generate_participant_code, normalize_participant_code};
use crate::utils::validation::normalize_phone;

const CODE_ATTEMPTS: usize = 5;
const CODE_CONSTRAINT: &str = "test_participants_participant_id_code_key";

#[derive(Clone)]
pub struct ParticipantService {
    pool: PgPool,
    sessions: SessionService,
}

impl ParticipantService {
    pub fn new(pool: PgPool, sessions: SessionService) -> Self {
        Self { pool, sessions }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Participant> {
        sqlx::query_as::<_, Participant>(
            "SELECT * FROM test_participants WHERE participant_id_code = $1",
        )
        .bind(normalize_participant_code(code))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Participant ID not found".into()))
    }

    pub async fn get_by_id(&self, participant_id: Uuid) -> Result<Participant> {
        sqlx::query_as::<_, Participant>("SELECT * FROM test_participants WHERE id = $1")
            .bind(participant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Participant not found".into()))
    }

    /// Shared gate for participant-facing calls: the code must still be live
    /// and, when a name is supplied, it must match the registered one.
    pub async fn authorize(&self, code: &str, claimed_name: Option<&str>) -> Result<Participant> {
        let participant = self.find_by_code(code).await?;
        if participant.is_expired() {
            return Err(Error::AlreadyUsed(
                "This participant ID has already been used and can no longer be entered".into(),
            ));
        }
        if let Some(name) = claimed_name {
            if !names_match(name, &participant.full_name) {
                tracing::warn!(
                    participant_id = %participant.id,
                    "name does not match registered participant"
                );
                return Err(Error::IdentityMismatch(
                    "Full name does not match the registered participant".into(),
                ));
            }
        }
        Ok(participant)
    }

    pub async fn check_in(&self, code: &str, full_name: &str) -> Result<(Participant, TestSession)> {
        let participant = self.authorize(code, Some(full_name)).await?;
        let session = self.sessions.find_session(participant.session_id).await?;
        if session.is_closed() {
            return Err(Error::Forbidden(format!("Test session is {}", session.status)));
        }

        let admitted = sqlx::query_as::<_, Participant>(
            r#"
            UPDATE test_participants
            SET has_entered_startscreen = TRUE,
                entered_at = COALESCE(entered_at, NOW()),
                admission_state = 'admitted',
                last_activity_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND admission_state <> 'expired'
            RETURNING *
            "#,
        )
        .bind(participant.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::AlreadyUsed(
                "This participant ID has already been used and can no longer be entered".into(),
            )
        })?;

        tracing::info!(
            participant_id = %admitted.id,
            session_id = %session.id,
            "participant checked in"
        );
        Ok((admitted, session))
    }

    /// The first call binds the device and address; every later call must
    /// present the same pair.
    pub async fn validate_device(
        &self,
        code: &str,
        full_name: &str,
        device_id: &str,
        client_ip: Option<IpAddr>,
    ) -> Result<ValidateDeviceResponse> {
        let participant = self.authorize(code, Some(full_name)).await?;
        let device_id = device_id.trim();

        let participant = if participant.device_id.is_none() {
            let bound = sqlx::query_as::<_, Participant>(
                r#"
                UPDATE test_participants
                SET device_id = $2, locked_ip = $3, updated_at = NOW()
                WHERE id = $1 AND device_id IS NULL
                RETURNING *
                "#,
            )
            .bind(participant.id)
            .bind(device_id)
            .bind(client_ip.map(IpNetwork::from))
            .fetch_optional(&self.pool)
            .await?;

            match bound {
                Some(bound) => {
                    tracing::info!(participant_id = %bound.id, ip = ?client_ip, "device bound");
                    return Ok(ValidateDeviceResponse {
                        ip_match: true,
                        first_binding: true,
                    });
                }
                None => self.get_by_id(participant.id).await?,
            }
        } else {
            participant
        };

        if !device_matches(&participant, device_id, client_ip) {
            tracing::warn!(
                participant_id = %participant.id,
                ip = ?client_ip,
                "device or address does not match binding"
            );
            return Err(Error::DeviceMismatch(
                "This participant ID is already in use on another device".into(),
            ));
        }

        Ok(ValidateDeviceResponse {
            ip_match: true,
            first_binding: false,
        })
    }

    pub async fn can_start(&self, code: &str, claimed_name: Option<&str>) -> Result<CanStartResponse> {
        let participant = self.find_by_code(code).await?;
        if let Some(name) = claimed_name.filter(|n| !n.trim().is_empty()) {
            if !names_match(name, &participant.full_name) {
                return Err(Error::IdentityMismatch(
                    "Full name does not match the registered participant".into(),
                ));
            }
        }

        let participant = if self.sessions.expire_overdue(participant.session_id).await? > 0 {
            self.get_by_id(participant.id).await?
        } else {
            participant
        };

        Ok(CanStartResponse {
            can_start: participant.test_started && !participant.is_expired(),
            admission_state: participant.admission_state.clone(),
            test_taking_state: participant.test_taking_state.clone(),
            test_started_at: participant.test_started_at,
            test_end_at: participant.test_end_at,
            current_screen: participant.current_screen.clone(),
            scores: ParticipantScores::from(&participant),
            server_time: Utc::now(),
        })
    }

    pub async fn list_participants(&self, session_id: Uuid) -> Result<Vec<Participant>> {
        let rows = sqlx::query_as::<_, Participant>(
            r#"
            SELECT * FROM test_participants
            WHERE session_id = $1
            ORDER BY created_at, full_name
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Best effort: each entry is registered or reported as failed on its own.
    pub async fn register_participants(
        &self,
        session: &TestSession,
        payload: RegisterParticipantsPayload,
    ) -> Result<RegisterParticipantsResponse> {
        if session.is_closed() {
            return Err(Error::BadRequest(format!("Session is {}", session.status)));
        }

        let mut current: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM test_participants WHERE session_id = $1")
                .bind(session.id)
                .fetch_one(&self.pool)
                .await?;

        let mut registered = Vec::new();
        let mut failed = Vec::new();
        for entry in payload.participants {
            if let Some(capacity) = session.max_capacity {
                if current >= capacity as i64 {
                    failed.push(failure(&entry, "Session is at full capacity"));
                    continue;
                }
            }
            match self.register_one(session.id, &entry).await {
                Ok(participant) => {
                    current += 1;
                    registered.push(participant);
                }
                Err(Error::BadRequest(reason)) => failed.push(failure(&entry, &reason)),
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "participant registration failed");
                    failed.push(failure(&entry, "Registration failed"));
                }
            }
        }

        tracing::info!(
            session_id = %session.id,
            registered = registered.len(),
            failed = failed.len(),
            "participants registered"
        );
        Ok(RegisterParticipantsResponse { registered, failed })
    }

    async fn register_one(&self, session_id: Uuid, entry: &NewParticipant) -> Result<Participant> {
        let full_name = entry.full_name.split_whitespace().collect::<Vec<_>>().join(" ");
        if full_name.is_empty() {
            return Err(Error::BadRequest("Full name is required".into()));
        }
        let phone = normalize_phone(&entry.phone_number);

        if !phone.is_empty() {
            let duplicate: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM test_participants WHERE session_id = $1 AND phone_number = $2",
            )
            .bind(session_id)
            .bind(&phone)
            .fetch_optional(&self.pool)
            .await?;
            if duplicate.is_some() {
                return Err(Error::BadRequest(
                    "Phone number already registered in this session".into(),
                ));
            }
        }

        let user_id: Option<Uuid> = if phone.is_empty() {
            None
        } else {
            sqlx::query_scalar("SELECT id FROM users WHERE phone_number = $1 AND role = 'student'")
                .bind(&phone)
                .fetch_optional(&self.pool)
                .await?
        };

        let requested = entry
            .participant_id_code
            .as_deref()
            .map(normalize_participant_code)
            .filter(|c| !c.is_empty());
        let attempts = if requested.is_some() { 1 } else { CODE_ATTEMPTS };

        for _ in 0..attempts {
            let code = requested.clone().unwrap_or_else(generate_participant_code);
            let inserted = sqlx::query_as::<_, Participant>(
                r#"
                INSERT INTO test_participants (session_id, user_id, participant_id_code, full_name, phone_number)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(session_id)
            .bind(user_id)
            .bind(&code)
            .bind(&full_name)
            .bind(&phone)
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(participant) => return Ok(participant),
                Err(sqlx::Error::Database(db)) if db.constraint() == Some(CODE_CONSTRAINT) => {
                    tracing::debug!(code = %code, "participant code collision");
                    continue;
                }
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    return Err(Error::BadRequest(
                        "Phone number already registered in this session".into(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::BadRequest(match requested {
            Some(code) => format!("Participant ID {} is already in use", code),
            None => "Could not allocate a unique participant ID".into(),
        }))
    }
}

fn failure(entry: &NewParticipant, reason: &str) -> RegisterFailure {
    RegisterFailure {
        full_name: entry.full_name.clone(),
        phone_number: entry.phone_number.clone(),
        reason: reason.to_string(),
    }
}

/// A device binding matches when the device id is identical and, if an address
/// was locked, the caller presents that same address.
pub fn device_matches(participant: &Participant, device_id: &str, client_ip: Option<IpAddr>) -> bool {
    let device_ok = participant.device_id.as_deref() == Some(device_id);
    let ip_ok = match participant.locked_ip {
        Some(locked) => client_ip == Some(locked.ip()),
        None => true,
    };
    device_ok && ip_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(device: &str, ip: Option<&str>) -> Participant {
        let mut p = Participant::fixture("Ahmed Khan");
        p.device_id = Some(device.to_string());
        p.locked_ip = ip.map(|ip| IpNetwork::from(ip.parse::<IpAddr>().unwrap()));
        p
    }

    #[test]
    fn same_device_and_address_match() {
        let p = bound("device-a", Some("203.0.113.7"));
        assert!(device_matches(&p, "device-a", Some("203.0.113.7".parse().unwrap())));
    }

    #[test]
    fn second_device_is_rejected() {
        let p = bound("device-a", Some("203.0.113.7"));
        assert!(!device_matches(&p, "device-b", Some("203.0.113.7".parse().unwrap())));
        assert!(!device_matches(&p, "device-a", Some("203.0.113.8".parse().unwrap())));
        assert!(!device_matches(&p, "device-a", None));
    }

    #[test]
    fn unlocked_address_only_checks_device() {
        let p = bound("device-a", None);
        assert!(device_matches(&p, "device-a", Some("198.51.100.1".parse().unwrap())));
        assert!(!device_matches(&p, "device-b", None));
    }
}
