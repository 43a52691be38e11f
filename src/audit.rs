use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// A state change worth keeping a trail of.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub actor: Option<Uuid>,
    pub action: &'a str,
    pub resource: &'a str,
    pub metadata: Value,
}

impl<'a> AuditEvent<'a> {
    pub fn new(actor: Option<Uuid>, action: &'a str, resource: &'a str, metadata: Value) -> Self {
        Self {
            actor,
            action,
            resource,
            metadata,
        }
    }
}

pub async fn log_audit(pool: &DbPool, event: &AuditEvent<'_>) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event.actor)
    .bind(event.action)
    .bind(event.resource)
    .bind(&event.metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Writes the event; a failed write is logged and never fails the caller.
pub async fn record(pool: &DbPool, event: AuditEvent<'_>) {
    if let Err(err) = log_audit(pool, &event).await {
        tracing::warn!(error = %err, action = event.action, "audit log failed");
    }
}
