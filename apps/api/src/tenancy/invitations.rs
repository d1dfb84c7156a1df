//! Time-limited, single-use invitations to join a company with a preset role.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::invitation::{InvitationRow, InvitationStatus};
use crate::models::user::{PlatformUser, Role, TeamMemberRow};
use crate::tenancy::users::{add_member, NewMember};
use crate::validation::{normalize_email, Validator};

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationInput {
    pub email: String,
    pub role: Role,
}

impl InvitationInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.email("email", &self.email);
        v.finish()
    }
}

/// 64 lowercase hex characters from two random v4 UUIDs.
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn accept_link(app_base_url: &str, token: &str) -> String {
    format!("{}/invite/{token}", app_base_url.trim_end_matches('/'))
}

/// Fails with `Gone` unless the invitation is pending and unexpired at `now`.
pub fn ensure_acceptable(invitation: &InvitationRow, now: DateTime<Utc>) -> Result<(), AppError> {
    match invitation.status.parse::<InvitationStatus>() {
        Ok(InvitationStatus::Pending) => {}
        Ok(InvitationStatus::Accepted) => {
            return Err(AppError::Gone("This invitation has already been used".to_string()))
        }
        Ok(InvitationStatus::Revoked) | Err(_) => {
            return Err(AppError::Gone("This invitation has been revoked".to_string()))
        }
    }
    if invitation.expires_at <= now {
        return Err(AppError::Gone("This invitation has expired".to_string()));
    }
    Ok(())
}

/// The invitation's email must match the signed-in user's, ignoring case.
pub fn ensure_recipient(invitation: &InvitationRow, email: &str) -> Result<(), AppError> {
    if normalize_email(&invitation.email) == normalize_email(email) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "This invitation was sent to a different email address".to_string(),
        ))
    }
}

/// Public view of an invitation, shown before the recipient signs in.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationLookup {
    pub company_name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub acceptable: bool,
}

pub async fn create_invitation(
    pool: &PgPool,
    company_id: Uuid,
    invited_by: Uuid,
    input: &InvitationInput,
    ttl_days: i64,
) -> sqlx::Result<InvitationRow> {
    let row = sqlx::query_as::<_, InvitationRow>(
        r#"
        INSERT INTO invitations (id, company_id, email, role, token, status, invited_by, expires_at)
        VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(normalize_email(&input.email))
    .bind(input.role.as_str())
    .bind(generate_token())
    .bind(invited_by)
    .bind(Utc::now() + Duration::days(ttl_days))
    .fetch_one(pool)
    .await?;

    info!("Invitation {} created for company {company_id}", row.id);
    Ok(row)
}

/// A pending, unexpired invitation for this email in the company, if any.
pub async fn find_open_for_email(
    pool: &PgPool,
    company_id: Uuid,
    email: &str,
) -> sqlx::Result<Option<InvitationRow>> {
    sqlx::query_as::<_, InvitationRow>(
        r#"
        SELECT * FROM invitations
        WHERE company_id = $1 AND LOWER(email) = LOWER($2)
          AND status = 'pending' AND expires_at > NOW()
        LIMIT 1
        "#,
    )
    .bind(company_id)
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn list_invitations(pool: &PgPool, company_id: Uuid) -> sqlx::Result<Vec<InvitationRow>> {
    sqlx::query_as::<_, InvitationRow>(
        "SELECT * FROM invitations WHERE company_id = $1 ORDER BY created_at DESC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_token(pool: &PgPool, token: &str) -> sqlx::Result<Option<InvitationRow>> {
    sqlx::query_as::<_, InvitationRow>("SELECT * FROM invitations WHERE token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await
}

/// Marks a pending invitation revoked. `None` when no pending invitation has that id.
pub async fn revoke_invitation(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<InvitationRow>> {
    sqlx::query_as::<_, InvitationRow>(
        r#"
        UPDATE invitations SET status = 'revoked'
        WHERE id = $1 AND company_id = $2 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

/// Adds the user to the inviting company and consumes the invitation in one transaction.
pub async fn accept_invitation(
    pool: &PgPool,
    invitation: &InvitationRow,
    user: &PlatformUser,
) -> Result<TeamMemberRow, AppError> {
    let role = invitation
        .role
        .parse::<Role>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored invitation role is invalid: {e}")))?;

    let mut tx = pool.begin().await?;
    let consumed = sqlx::query(
        r#"
        UPDATE invitations SET status = 'accepted', accepted_at = NOW(), accepted_by = $2
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(invitation.id)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;
    if consumed.rows_affected() == 0 {
        return Err(AppError::Gone("This invitation has already been used".to_string()));
    }

    let member = add_member(
        &mut *tx,
        NewMember {
            company_id: invitation.company_id,
            user,
            role,
            invited_by: Some(invitation.invited_by),
        },
    )
    .await?;
    tx.commit().await?;

    info!(
        "User {} joined company {} as {}",
        user.id, invitation.company_id, member.role
    );
    Ok(member)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation(status: &str, expires_in: Duration) -> InvitationRow {
        let now = Utc::now();
        InvitationRow {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            email: "New.Hire@Example.com".to_string(),
            role: "manager".to_string(),
            token: generate_token(),
            status: status.to_string(),
            invited_by: Uuid::new_v4(),
            expires_at: now + expires_in,
            accepted_at: None,
            accepted_by: None,
            created_at: now,
        }
    }

    #[test]
    fn test_token_is_64_hex_chars_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_pending_unexpired_invitation_is_acceptable() {
        let inv = invitation("pending", Duration::days(1));
        assert!(ensure_acceptable(&inv, Utc::now()).is_ok());
    }

    #[test]
    fn test_expired_used_or_revoked_invitations_are_gone() {
        let now = Utc::now();
        for inv in [
            invitation("pending", Duration::seconds(-1)),
            invitation("accepted", Duration::days(1)),
            invitation("revoked", Duration::days(1)),
        ] {
            assert!(matches!(ensure_acceptable(&inv, now), Err(AppError::Gone(_))));
        }
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let inv = invitation("pending", Duration::days(1));
        assert!(ensure_acceptable(&inv, inv.expires_at).is_err());
    }

    #[test]
    fn test_recipient_match_ignores_case_and_whitespace() {
        let inv = invitation("pending", Duration::days(1));
        assert!(ensure_recipient(&inv, " new.hire@example.COM").is_ok());
        assert!(matches!(
            ensure_recipient(&inv, "someone@example.com"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_accept_link_joins_cleanly() {
        assert_eq!(
            accept_link("https://app.example.com/", "abc"),
            "https://app.example.com/invite/abc"
        );
    }

    #[test]
    fn test_token_never_serialized() {
        let inv = invitation("pending", Duration::days(1));
        let json = serde_json::to_value(&inv).unwrap();
        assert!(json.get("token").is_none());
        assert_eq!(json["role"], "manager");
    }
}
