use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::listing::{Listable, SortKey};
use crate::models::client::{ClientRow, ClientStatus};
use crate::validation::{clean_optional, normalize_email, Validator};

#[derive(Debug, Clone, Deserialize)]
pub struct ClientInput {
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<ClientStatus>,
}

impl ClientInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.required("name", &self.name)
            .max_len("name", &self.name, 200)
            .optional_email("contact_email", self.contact_email.as_deref());
        v.finish()
    }

    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.industry = clean_optional(self.industry);
        self.contact_name = clean_optional(self.contact_name);
        self.contact_email = clean_optional(self.contact_email).map(|e| normalize_email(&e));
        self.contact_phone = clean_optional(self.contact_phone);
        self.website = clean_optional(self.website);
        self.notes = clean_optional(self.notes);
        self
    }
}

impl Listable for ClientRow {
    const SORT_FIELDS: &'static [&'static str] = &["name", "industry", "status", "created_at"];
    const DEFAULT_SORT: &'static str = "name";

    fn search_fields(&self) -> Vec<&str> {
        [
            Some(self.name.as_str()),
            self.industry.as_deref(),
            self.contact_name.as_deref(),
            self.contact_email.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn sort_key(&self, field: &str) -> SortKey {
        match field {
            "industry" => SortKey::text(self.industry.as_deref().unwrap_or("")),
            "status" => SortKey::text(&self.status),
            "created_at" => SortKey::Time(self.created_at),
            _ => SortKey::text(&self.name),
        }
    }
}

pub async fn list_clients(pool: &PgPool, company_id: Uuid) -> sqlx::Result<Vec<ClientRow>> {
    sqlx::query_as::<_, ClientRow>("SELECT * FROM clients WHERE company_id = $1 ORDER BY name ASC")
        .bind(company_id)
        .fetch_all(pool)
        .await
}

pub async fn get_client(pool: &PgPool, company_id: Uuid, id: Uuid) -> sqlx::Result<Option<ClientRow>> {
    sqlx::query_as::<_, ClientRow>("SELECT * FROM clients WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_client(
    pool: &PgPool,
    company_id: Uuid,
    input: &ClientInput,
) -> sqlx::Result<ClientRow> {
    let row = sqlx::query_as::<_, ClientRow>(
        r#"
        INSERT INTO clients
            (id, company_id, name, industry, contact_name, contact_email, contact_phone,
             website, notes, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(&input.name)
    .bind(&input.industry)
    .bind(&input.contact_name)
    .bind(&input.contact_email)
    .bind(&input.contact_phone)
    .bind(&input.website)
    .bind(&input.notes)
    .bind(input.status.unwrap_or(ClientStatus::Active).as_str())
    .fetch_one(pool)
    .await?;

    info!("Created client {} in company {company_id}", row.id);
    Ok(row)
}

pub async fn update_client(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
    input: &ClientInput,
) -> sqlx::Result<Option<ClientRow>> {
    sqlx::query_as::<_, ClientRow>(
        r#"
        UPDATE clients SET
            name = $3, industry = $4, contact_name = $5, contact_email = $6,
            contact_phone = $7, website = $8, notes = $9, status = $10, updated_at = NOW()
        WHERE id = $1 AND company_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(&input.name)
    .bind(&input.industry)
    .bind(&input.contact_name)
    .bind(&input.contact_email)
    .bind(&input.contact_phone)
    .bind(&input.website)
    .bind(&input.notes)
    .bind(input.status.unwrap_or(ClientStatus::Active).as_str())
    .fetch_optional(pool)
    .await
}

pub async fn delete_client(pool: &PgPool, company_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
