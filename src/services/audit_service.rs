use crate::error::Result;
use crate::models::audit_log::AuditLog;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log(
        &self,
        user_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        changes: Option<JsonValue>,
    ) -> Result<AuditLog> {
        let row = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (user_id, action, entity_type, entity_id, changes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, action, entity_type, entity_id, changes, created_at
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(changes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Audit failures never fail the action being audited.
    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        changes: Option<JsonValue>,
    ) {
        if let Err(e) = self
            .log(user_id, action, entity_type, entity_id, changes)
            .await
        {
            tracing::warn!(action, entity_id = %entity_id, error = %e, "failed to write audit log");
        }
    }

    pub async fn list_for_entity(&self, entity_id: Uuid) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, changes, created_at
            FROM audit_logs
            WHERE entity_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
