//! Platform users and their company memberships (`platform_users`, `team_members`).

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::identity::VerifiedIdentity;
use crate::models::user::{MemberStatus, PlatformUser, Role, TeamMemberRow};

/// A membership joined with its company name, used in session payloads.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MembershipSummary {
    pub company_id: Uuid,
    pub company_name: String,
    pub role: String,
    pub status: String,
}

/// Inserts the user on first sign-in, refreshing email, name and login time afterwards.
pub async fn upsert_platform_user(
    pool: &PgPool,
    identity: &VerifiedIdentity,
) -> sqlx::Result<PlatformUser> {
    let user = sqlx::query_as::<_, PlatformUser>(
        r#"
        INSERT INTO platform_users (id, external_id, email, display_name, last_login_at)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT (external_id) DO UPDATE
            SET email = EXCLUDED.email,
                display_name = COALESCE(EXCLUDED.display_name, platform_users.display_name),
                last_login_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&identity.external_id)
    .bind(&identity.email)
    .bind(&identity.display_name)
    .fetch_one(pool)
    .await?;

    info!("Platform user {} signed in", user.id);
    Ok(user)
}

pub async fn get_platform_user(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Option<PlatformUser>> {
    sqlx::query_as::<_, PlatformUser>("SELECT * FROM platform_users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Memberships for a user across all companies, oldest first.
pub async fn list_memberships(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<MembershipSummary>> {
    sqlx::query_as::<_, MembershipSummary>(
        r#"
        SELECT m.company_id, c.name AS company_name, m.role, m.status
        FROM team_members m
        JOIN companies c ON c.id = m.company_id
        WHERE m.user_id = $1
        ORDER BY m.joined_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// The active company for a new session: the requested one when the user is an
/// active member of it, otherwise the earliest active membership.
pub fn choose_active_company(
    memberships: &[MembershipSummary],
    requested: Option<Uuid>,
) -> Option<Uuid> {
    let active = memberships
        .iter()
        .filter(|m| m.status == MemberStatus::Active.as_str());
    let mut first = None;
    for m in active {
        if Some(m.company_id) == requested {
            return Some(m.company_id);
        }
        first.get_or_insert(m.company_id);
    }
    first
}

pub async fn find_membership(
    pool: &PgPool,
    company_id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<Option<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(
        "SELECT * FROM team_members WHERE company_id = $1 AND user_id = $2",
    )
    .bind(company_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_member(
    pool: &PgPool,
    company_id: Uuid,
    member_id: Uuid,
) -> sqlx::Result<Option<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(
        "SELECT * FROM team_members WHERE id = $1 AND company_id = $2",
    )
    .bind(member_id)
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_members(pool: &PgPool, company_id: Uuid) -> sqlx::Result<Vec<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(
        "SELECT * FROM team_members WHERE company_id = $1 ORDER BY joined_at ASC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}

pub async fn find_member_by_email(
    pool: &PgPool,
    company_id: Uuid,
    email: &str,
) -> sqlx::Result<Option<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(
        "SELECT * FROM team_members WHERE company_id = $1 AND LOWER(email) = LOWER($2)",
    )
    .bind(company_id)
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub struct NewMember<'a> {
    pub company_id: Uuid,
    pub user: &'a PlatformUser,
    pub role: Role,
    pub invited_by: Option<Uuid>,
}

/// Adds the user to the company, or reactivates an existing membership with the new role.
pub async fn add_member<'e, E>(executor: E, member: NewMember<'_>) -> sqlx::Result<TeamMemberRow>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, TeamMemberRow>(
        r#"
        INSERT INTO team_members
            (id, company_id, user_id, email, display_name, role, status, invited_by)
        VALUES ($1, $2, $3, $4, $5, $6, 'active', $7)
        ON CONFLICT (company_id, user_id) DO UPDATE
            SET role = EXCLUDED.role,
                status = 'active',
                invited_by = EXCLUDED.invited_by
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(member.company_id)
    .bind(member.user.id)
    .bind(&member.user.email)
    .bind(&member.user.display_name)
    .bind(member.role.as_str())
    .bind(member.invited_by)
    .fetch_one(executor)
    .await
}

pub async fn update_member_role(
    pool: &PgPool,
    company_id: Uuid,
    member_id: Uuid,
    role: Role,
) -> sqlx::Result<Option<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(
        "UPDATE team_members SET role = $1 WHERE id = $2 AND company_id = $3 RETURNING *",
    )
    .bind(role.as_str())
    .bind(member_id)
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_member_status(
    pool: &PgPool,
    company_id: Uuid,
    member_id: Uuid,
    status: MemberStatus,
) -> sqlx::Result<Option<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(
        "UPDATE team_members SET status = $1 WHERE id = $2 AND company_id = $3 RETURNING *",
    )
    .bind(status.as_str())
    .bind(member_id)
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_member(pool: &PgPool, company_id: Uuid, member_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM team_members WHERE id = $1 AND company_id = $2")
        .bind(member_id)
        .bind(company_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// A change an admin makes to another membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberChange {
    Role(Role),
    Status(MemberStatus),
    Remove,
}

pub fn is_active_admin(member: &TeamMemberRow) -> bool {
    member.role == Role::Admin.as_str() && member.status == MemberStatus::Active.as_str()
}

/// Whether `change` would take away the company's last active admin, given how
/// many active admins it has now.
pub fn leaves_no_active_admin(member: &TeamMemberRow, change: MemberChange, active_admins: i64) -> bool {
    let demotes = match change {
        MemberChange::Role(role) => role != Role::Admin,
        MemberChange::Status(status) => status != MemberStatus::Active,
        MemberChange::Remove => true,
    };
    demotes && is_active_admin(member) && active_admins <= 1
}

pub async fn count_active_admins(pool: &PgPool, company_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM team_members WHERE company_id = $1 AND role = 'admin' AND status = 'active'",
    )
    .bind(company_id)
    .fetch_one(pool)
    .await
}
