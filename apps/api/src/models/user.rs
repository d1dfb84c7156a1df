use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

/// A person known to the platform, keyed by the identity provider's uid.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlatformUser {
    pub id: Uuid,
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub is_platform_admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Membership of a platform user in a company.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMemberRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub status: String,
    pub invited_by: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
}

text_enum!(Role {
    Admin => "admin",
    Manager => "manager",
    Member => "member",
});

impl Role {
    /// Create, update and delete staffing and portfolio records.
    pub fn can_edit_records(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    /// Company settings, team membership, invitations, audit log.
    pub fn can_manage_company(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Read and write employee pay. Hidden from members only.
    pub fn can_view_compensation(&self) -> bool {
        !matches!(self, Role::Member)
    }
}

text_enum!(MemberStatus {
    Active => "active",
    Disabled => "disabled",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.can_manage_company());
        assert!(Role::Admin.can_edit_records());
        assert!(Role::Manager.can_edit_records());
        assert!(!Role::Manager.can_manage_company());
        assert!(!Role::Member.can_edit_records());
        assert!(!Role::Member.can_manage_company());
    }

    #[test]
    fn test_compensation_is_hidden_from_members_only() {
        assert!(Role::Admin.can_view_compensation());
        assert!(Role::Manager.can_view_compensation());
        assert!(!Role::Member.can_view_compensation());
    }

    #[test]
    fn test_role_parses_lowercase_only() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("Manager".parse::<Role>().is_err());
    }
}
