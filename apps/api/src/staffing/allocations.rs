use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::allocation::AllocationRow;
use crate::validation::{clean_optional, Validator};

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationInput {
    pub resource_id: Uuid,
    pub project_id: Uuid,
    pub percent: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AllocationInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.range_i32("percent", self.percent, 1, 100).date_order(
            "end_date",
            Some(self.start_date),
            Some(self.end_date),
        );
        v.finish()
    }

    pub fn normalized(mut self) -> Self {
        self.role = clean_optional(self.role);
        self.notes = clean_optional(self.notes);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AllocationFilter {
    pub resource_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

pub async fn list_allocations(
    pool: &PgPool,
    company_id: Uuid,
    filter: AllocationFilter,
) -> sqlx::Result<Vec<AllocationRow>> {
    sqlx::query_as::<_, AllocationRow>(
        r#"
        SELECT * FROM allocations
        WHERE company_id = $1
          AND ($2::UUID IS NULL OR resource_id = $2)
          AND ($3::UUID IS NULL OR project_id = $3)
        ORDER BY start_date ASC, created_at ASC
        "#,
    )
    .bind(company_id)
    .bind(filter.resource_id)
    .bind(filter.project_id)
    .fetch_all(pool)
    .await
}

pub async fn list_for_resource(
    pool: &PgPool,
    company_id: Uuid,
    resource_id: Uuid,
) -> sqlx::Result<Vec<AllocationRow>> {
    list_allocations(
        pool,
        company_id,
        AllocationFilter {
            resource_id: Some(resource_id),
            project_id: None,
        },
    )
    .await
}

pub async fn list_for_project(
    pool: &PgPool,
    company_id: Uuid,
    project_id: Uuid,
) -> sqlx::Result<Vec<AllocationRow>> {
    list_allocations(
        pool,
        company_id,
        AllocationFilter {
            resource_id: None,
            project_id: Some(project_id),
        },
    )
    .await
}

pub async fn get_allocation(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<AllocationRow>> {
    sqlx::query_as::<_, AllocationRow>(
        "SELECT * FROM allocations WHERE id = $1 AND company_id = $2",
    )
    .bind(id)
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_allocation(
    pool: &PgPool,
    company_id: Uuid,
    actor: Uuid,
    input: &AllocationInput,
) -> sqlx::Result<AllocationRow> {
    let row = sqlx::query_as::<_, AllocationRow>(
        r#"
        INSERT INTO allocations
            (id, company_id, resource_id, project_id, percent, start_date, end_date, role, notes, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(input.resource_id)
    .bind(input.project_id)
    .bind(input.percent)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(&input.role)
    .bind(&input.notes)
    .bind(actor)
    .fetch_one(pool)
    .await?;

    info!(
        "Allocated resource {} to project {} at {}%",
        row.resource_id, row.project_id, row.percent
    );
    Ok(row)
}

pub async fn update_allocation(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
    input: &AllocationInput,
) -> sqlx::Result<Option<AllocationRow>> {
    sqlx::query_as::<_, AllocationRow>(
        r#"
        UPDATE allocations SET
            resource_id = $3, project_id = $4, percent = $5, start_date = $6, end_date = $7,
            role = $8, notes = $9, updated_at = NOW()
        WHERE id = $1 AND company_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(input.resource_id)
    .bind(input.project_id)
    .bind(input.percent)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(&input.role)
    .bind(&input.notes)
    .fetch_optional(pool)
    .await
}

pub async fn delete_allocation(pool: &PgPool, company_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM allocations WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
