use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::listing::{Listable, SortKey};
use crate::models::employee::{Compensation, EmployeeRow, EmployeeStatus, EmploymentType};
use crate::models::skill::Skill;
use crate::models::user::Role;
use crate::validation::{clean_optional, normalize_email, Validator};

/// Create/update payload for an employee. Updates replace every field.
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub job_title: String,
    #[serde(default)]
    pub department: Option<String>,
    pub employment_type: EmploymentType,
    #[serde(default)]
    pub status: Option<EmployeeStatus>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub compensation: Option<Compensation>,
    #[serde(default)]
    pub skills: Vec<Skill>,
}

impl EmployeeInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.required("first_name", &self.first_name)
            .max_len("first_name", &self.first_name, 100)
            .required("last_name", &self.last_name)
            .max_len("last_name", &self.last_name, 100)
            .email("email", &self.email)
            .required("job_title", &self.job_title)
            .date_order("end_date", Some(self.start_date), self.end_date)
            .unique_names("skills", self.skills.iter().map(|s| s.name.as_str()));
        if let Some(comp) = &self.compensation {
            v.non_negative("compensation.amount", Some(comp.amount))
                .currency("compensation.currency", &comp.currency);
        }
        v.finish()
    }

    /// Trims text fields and normalizes the email.
    pub fn normalized(mut self) -> Self {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.job_title = self.job_title.trim().to_string();
        self.phone = clean_optional(self.phone);
        self.department = clean_optional(self.department);
        for skill in &mut self.skills {
            skill.name = skill.name.trim().to_string();
        }
        self
    }
}

impl Listable for EmployeeRow {
    const SORT_FIELDS: &'static [&'static str] = &[
        "name",
        "last_name",
        "email",
        "job_title",
        "department",
        "start_date",
        "created_at",
    ];
    const DEFAULT_SORT: &'static str = "name";

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.email.as_str(),
            self.job_title.as_str(),
        ];
        if let Some(d) = &self.department {
            fields.push(d);
        }
        fields
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn sort_key(&self, field: &str) -> SortKey {
        match field {
            "last_name" => SortKey::text(&self.last_name),
            "email" => SortKey::text(&self.email),
            "job_title" => SortKey::text(&self.job_title),
            "department" => SortKey::text(self.department.as_deref().unwrap_or("")),
            "start_date" => SortKey::Date(Some(self.start_date)),
            "created_at" => SortKey::Time(self.created_at),
            _ => SortKey::text(&self.full_name()),
        }
    }

    fn skills(&self) -> Option<&[Skill]> {
        Some(&self.skills.0)
    }
}

/// Refuses a payload carrying pay from a role that may not see it.
pub fn check_compensation_write(role: Role, input: &EmployeeInput) -> Result<(), AppError> {
    if input.compensation.is_some() && !role.can_view_compensation() {
        return Err(AppError::forbidden("set compensation"));
    }
    Ok(())
}

/// Drops compensation for roles that may not see it.
pub fn redact_for(role: Role, mut row: EmployeeRow) -> EmployeeRow {
    if !role.can_view_compensation() {
        row.compensation = None;
    }
    row
}

pub async fn list_employees(pool: &PgPool, company_id: Uuid) -> sqlx::Result<Vec<EmployeeRow>> {
    sqlx::query_as::<_, EmployeeRow>(
        "SELECT * FROM employees WHERE company_id = $1 ORDER BY created_at ASC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}

pub async fn get_employee(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<EmployeeRow>> {
    sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_employee(
    pool: &PgPool,
    company_id: Uuid,
    actor: Uuid,
    input: &EmployeeInput,
) -> sqlx::Result<EmployeeRow> {
    let status = input.status.unwrap_or(EmployeeStatus::Active);
    let row = sqlx::query_as::<_, EmployeeRow>(
        r#"
        INSERT INTO employees
            (id, company_id, first_name, last_name, email, phone, job_title, department,
             employment_type, status, start_date, end_date, compensation, skills, documents,
             created_by, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, '[]', $15, $15)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.job_title)
    .bind(&input.department)
    .bind(input.employment_type.as_str())
    .bind(status.as_str())
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.compensation.as_ref().map(Json))
    .bind(Json(&input.skills))
    .bind(actor)
    .fetch_one(pool)
    .await?;

    info!("Created employee {} in company {company_id}", row.id);
    Ok(row)
}

/// Replaces the employee's fields. An absent `status` keeps the stored one.
pub async fn update_employee(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
    actor: Uuid,
    input: &EmployeeInput,
) -> sqlx::Result<Option<EmployeeRow>> {
    sqlx::query_as::<_, EmployeeRow>(
        r#"
        UPDATE employees SET
            first_name = $3, last_name = $4, email = $5, phone = $6, job_title = $7,
            department = $8, employment_type = $9, status = COALESCE($10, status),
            start_date = $11, end_date = $12, compensation = $13,
            skills = $14, updated_by = $15, updated_at = NOW()
        WHERE id = $1 AND company_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.job_title)
    .bind(&input.department)
    .bind(input.employment_type.as_str())
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.compensation.as_ref().map(Json))
    .bind(Json(&input.skills))
    .bind(actor)
    .fetch_optional(pool)
    .await
}

pub async fn delete_employee(pool: &PgPool, company_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM employees WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::employee::PayPeriod;
    use crate::models::skill::Proficiency;

    fn input() -> EmployeeInput {
        EmployeeInput {
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            email: " Ada@Example.COM ".to_string(),
            phone: Some("  ".to_string()),
            job_title: "Engineer".to_string(),
            department: None,
            employment_type: EmploymentType::FullTime,
            status: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            compensation: Some(Compensation {
                amount: 90_000.0,
                currency: "EUR".to_string(),
                period: PayPeriod::Annual,
            }),
            skills: vec![Skill {
                name: "Rust".to_string(),
                category: None,
                proficiency: Proficiency::Expert,
                years_experience: Some(6.0),
            }],
        }
    }

    #[test]
    fn test_valid_input_passes_and_normalizes() {
        let i = input().normalized();
        assert!(i.validate().is_ok());
        assert_eq!(i.first_name, "Ada");
        assert_eq!(i.email, "ada@example.com");
        assert_eq!(i.phone, None);
    }

    #[test]
    fn test_invalid_input_reports_every_field() {
        let mut i = input();
        i.first_name = String::new();
        i.email = "not-an-email".to_string();
        i.end_date = NaiveDate::from_ymd_opt(2023, 12, 31);
        i.compensation = Some(Compensation {
            amount: -1.0,
            currency: "euro".to_string(),
            period: PayPeriod::Monthly,
        });
        let Err(AppError::InvalidFields(fields)) = i.validate() else {
            panic!("expected field errors");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "first_name",
                "email",
                "end_date",
                "compensation.amount",
                "compensation.currency"
            ]
        );
    }

    fn row() -> EmployeeRow {
        let i = input().normalized();
        let now = chrono::Utc::now();
        EmployeeRow {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            first_name: i.first_name,
            last_name: i.last_name,
            email: i.email,
            phone: None,
            job_title: i.job_title,
            department: None,
            employment_type: i.employment_type.as_str().to_string(),
            status: EmployeeStatus::Active.as_str().to_string(),
            start_date: i.start_date,
            end_date: None,
            compensation: i.compensation.map(Json),
            skills: Json(i.skills),
            documents: Json(vec![]),
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_redact_for_each_role() {
        assert!(redact_for(Role::Admin, row()).compensation.is_some());
        assert!(redact_for(Role::Manager, row()).compensation.is_some());
        assert!(redact_for(Role::Member, row()).compensation.is_none());
    }

    #[test]
    fn test_compensation_write_for_each_role() {
        let with_pay = input();
        assert!(check_compensation_write(Role::Admin, &with_pay).is_ok());
        assert!(check_compensation_write(Role::Manager, &with_pay).is_ok());
        assert!(matches!(
            check_compensation_write(Role::Member, &with_pay),
            Err(AppError::Forbidden(_))
        ));

        let mut without_pay = input();
        without_pay.compensation = None;
        assert!(check_compensation_write(Role::Member, &without_pay).is_ok());
    }

    #[test]
    fn test_payload_parses_enums_and_defaults() {
        let json = r#"{
            "first_name": "Grace", "last_name": "Hopper", "email": "grace@navy.mil",
            "job_title": "Admiral", "employment_type": "contractor", "start_date": "2024-02-01"
        }"#;
        let parsed: EmployeeInput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.employment_type, EmploymentType::Contractor);
        assert!(parsed.skills.is_empty());
        assert!(parsed.status.is_none());
    }
}
