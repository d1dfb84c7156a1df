use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::company::CompanyRow;
use crate::models::user::{PlatformUser, Role, TeamMemberRow};
use crate::tenancy::users::{add_member, NewMember};
use crate::validation::{clean_optional, Validator};

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl CompanyInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.required("name", &self.name).max_len("name", &self.name, 200);
        if let Some(site) = &self.website {
            if !(site.starts_with("http://") || site.starts_with("https://")) {
                v.push("website", "must start with http:// or https://");
            }
        }
        v.finish()
    }

    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.industry = clean_optional(self.industry);
        self.website = clean_optional(self.website);
        self
    }
}

/// Creates the company and makes its creator the first admin, atomically.
pub async fn create_company(
    pool: &PgPool,
    owner: &PlatformUser,
    input: &CompanyInput,
) -> sqlx::Result<(CompanyRow, TeamMemberRow)> {
    let mut tx = pool.begin().await?;

    let company = sqlx::query_as::<_, CompanyRow>(
        r#"
        INSERT INTO companies (id, name, industry, website, owner_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&input.name)
    .bind(&input.industry)
    .bind(&input.website)
    .bind(owner.id)
    .fetch_one(&mut *tx)
    .await?;

    let member = add_member(
        &mut *tx,
        NewMember {
            company_id: company.id,
            user: owner,
            role: Role::Admin,
            invited_by: None,
        },
    )
    .await?;

    tx.commit().await?;
    info!("Company {} created by user {}", company.id, owner.id);
    Ok((company, member))
}

pub async fn get_company(pool: &PgPool, company_id: Uuid) -> sqlx::Result<Option<CompanyRow>> {
    sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE id = $1")
        .bind(company_id)
        .fetch_optional(pool)
        .await
}

pub async fn update_company(
    pool: &PgPool,
    company_id: Uuid,
    input: &CompanyInput,
) -> sqlx::Result<Option<CompanyRow>> {
    sqlx::query_as::<_, CompanyRow>(
        r#"
        UPDATE companies SET name = $2, industry = $3, website = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(company_id)
    .bind(&input.name)
    .bind(&input.industry)
    .bind(&input.website)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_name_required_and_website_checked() {
        let input = CompanyInput {
            name: "  ".to_string(),
            industry: None,
            website: Some("acme.io".to_string()),
        }
        .normalized();
        let Err(AppError::InvalidFields(fields)) = input.validate() else {
            panic!("expected field errors");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, "name");
        assert_eq!(fields[1].field, "website");
    }

    #[test]
    fn test_blank_optional_fields_are_dropped() {
        let input = CompanyInput {
            name: " Acme ".to_string(),
            industry: Some("".to_string()),
            website: Some(" https://acme.io ".to_string()),
        }
        .normalized();
        assert_eq!(input.name, "Acme");
        assert_eq!(input.industry, None);
        assert_eq!(input.website.as_deref(), Some("https://acme.io"));
        assert!(input.validate().is_ok());
    }
}
