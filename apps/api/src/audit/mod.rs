//! Audit trail. Writes are best-effort: a failed audit insert is logged and
//! never fails the request that triggered it.

pub mod handlers;

use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::auth::extractors::TenantContext;
use crate::models::audit::AuditLogRow;

pub const MAX_AUDIT_PAGE: i64 = 500;
pub const DEFAULT_AUDIT_PAGE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Export,
    Invite,
    Accept,
    Revoke,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Export => "export",
            AuditAction::Invite => "invite",
            AuditAction::Accept => "accept",
            AuditAction::Revoke => "revoke",
        }
    }
}

pub async fn record(
    pool: &PgPool,
    ctx: &TenantContext,
    action: AuditAction,
    entity_type: &str,
    entity_id: Option<Uuid>,
    details: Value,
) {
    record_for(pool, ctx.company_id, ctx.user_id, action, entity_type, entity_id, details).await
}

/// Records an entry for an explicit company/actor pair (used before a tenant context exists).
pub async fn record_for(
    pool: &PgPool,
    company_id: Uuid,
    actor_id: Uuid,
    action: AuditAction,
    entity_type: &str,
    entity_id: Option<Uuid>,
    details: Value,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs (id, company_id, actor_id, action, entity_type, entity_id, details)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(actor_id)
    .bind(action.as_str())
    .bind(entity_type)
    .bind(entity_id)
    .bind(&details)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(
            "Failed to write audit entry {} {entity_type} for company {company_id}: {e}",
            action.as_str()
        );
    }
}

pub async fn list(
    pool: &PgPool,
    company_id: Uuid,
    entity_type: Option<&str>,
    limit: i64,
) -> sqlx::Result<Vec<AuditLogRow>> {
    sqlx::query_as::<_, AuditLogRow>(
        r#"
        SELECT * FROM audit_logs
        WHERE company_id = $1 AND ($2::TEXT IS NULL OR entity_type = $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(company_id)
    .bind(entity_type)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Clamps a requested page size into `1..=MAX_AUDIT_PAGE`.
pub fn page_size(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_AUDIT_PAGE)
        .clamp(1, MAX_AUDIT_PAGE)
}
