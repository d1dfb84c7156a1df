use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::listing::{Listable, SortKey};
use crate::models::resource::{ResourceRow, ResourceStatus, Seniority};
use crate::models::skill::Skill;
use crate::validation::{clean_optional, normalize_email, Validator};

/// Create/update payload for a resource. Updates replace every field.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceInput {
    #[serde(default)]
    pub employee_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub role_title: String,
    pub seniority: Seniority,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default = "full_availability")]
    pub availability_percent: i32,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub status: Option<ResourceStatus>,
}

fn full_availability() -> i32 {
    100
}

impl ResourceInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.required("name", &self.name)
            .max_len("name", &self.name, 200)
            .email("email", &self.email)
            .required("role_title", &self.role_title)
            .range_i32("availability_percent", self.availability_percent, 0, 100)
            .non_negative("hourly_rate", self.hourly_rate)
            .unique_names("skills", self.skills.iter().map(|s| s.name.as_str()));
        for (i, skill) in self.skills.iter().enumerate() {
            if let Some(years) = skill.years_experience {
                if !(0.0..=60.0).contains(&years) {
                    v.push(
                        &format!("skills[{i}].years_experience"),
                        "must be between 0 and 60",
                    );
                }
            }
        }
        v.finish()
    }

    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.role_title = self.role_title.trim().to_string();
        self.location = clean_optional(self.location);
        self.bio = clean_optional(self.bio);
        for skill in &mut self.skills {
            skill.name = skill.name.trim().to_string();
        }
        self
    }
}

impl Listable for ResourceRow {
    const SORT_FIELDS: &'static [&'static str] = &[
        "name",
        "email",
        "role_title",
        "seniority",
        "availability_percent",
        "hourly_rate",
        "created_at",
    ];
    const DEFAULT_SORT: &'static str = "name";

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.email.as_str(), self.role_title.as_str()];
        if let Some(l) = &self.location {
            fields.push(l);
        }
        fields.extend(self.skills.0.iter().map(|s| s.name.as_str()));
        fields
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn sort_key(&self, field: &str) -> SortKey {
        match field {
            "email" => SortKey::text(&self.email),
            "role_title" => SortKey::text(&self.role_title),
            "seniority" => SortKey::Number(
                self.seniority
                    .parse::<Seniority>()
                    .map(|s| seniority_rank(s) as f64)
                    .unwrap_or(-1.0),
            ),
            "availability_percent" => SortKey::Number(self.availability_percent as f64),
            "hourly_rate" => SortKey::Number(self.hourly_rate.unwrap_or(0.0)),
            "created_at" => SortKey::Time(self.created_at),
            _ => SortKey::text(&self.name),
        }
    }

    fn skills(&self) -> Option<&[Skill]> {
        Some(&self.skills.0)
    }
}

fn seniority_rank(s: Seniority) -> usize {
    Seniority::ALL.iter().position(|x| *x == s).unwrap_or(0)
}

pub async fn list_resources(pool: &PgPool, company_id: Uuid) -> sqlx::Result<Vec<ResourceRow>> {
    sqlx::query_as::<_, ResourceRow>(
        "SELECT * FROM resources WHERE company_id = $1 ORDER BY name ASC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}

pub async fn list_resources_by_ids(
    pool: &PgPool,
    company_id: Uuid,
    ids: &[Uuid],
) -> sqlx::Result<Vec<ResourceRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, ResourceRow>(
        "SELECT * FROM resources WHERE company_id = $1 AND id = ANY($2) ORDER BY name ASC",
    )
    .bind(company_id)
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub async fn get_resource(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<ResourceRow>> {
    sqlx::query_as::<_, ResourceRow>("SELECT * FROM resources WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .fetch_optional(pool)
        .await
}

/// Fetches a resource or fails with `NotFound`.
pub async fn require_resource(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
) -> Result<ResourceRow, AppError> {
    get_resource(pool, company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resource {id} not found")))
}

pub async fn insert_resource(
    pool: &PgPool,
    company_id: Uuid,
    actor: Uuid,
    input: &ResourceInput,
) -> sqlx::Result<ResourceRow> {
    let status = input.status.unwrap_or(ResourceStatus::Available);
    let row = sqlx::query_as::<_, ResourceRow>(
        r#"
        INSERT INTO resources
            (id, company_id, employee_id, name, email, role_title, seniority, skills,
             availability_percent, hourly_rate, location, bio, status, documents,
             created_by, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, '[]', $14, $14)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(input.employee_id)
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.role_title)
    .bind(input.seniority.as_str())
    .bind(Json(&input.skills))
    .bind(input.availability_percent)
    .bind(input.hourly_rate)
    .bind(&input.location)
    .bind(&input.bio)
    .bind(status.as_str())
    .bind(actor)
    .fetch_one(pool)
    .await?;

    info!("Created resource {} in company {company_id}", row.id);
    Ok(row)
}

pub async fn update_resource(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
    actor: Uuid,
    input: &ResourceInput,
) -> sqlx::Result<Option<ResourceRow>> {
    let status = input.status.unwrap_or(ResourceStatus::Available);
    sqlx::query_as::<_, ResourceRow>(
        r#"
        UPDATE resources SET
            employee_id = $3, name = $4, email = $5, role_title = $6, seniority = $7,
            skills = $8, availability_percent = $9, hourly_rate = $10, location = $11,
            bio = $12, status = $13, updated_by = $14, updated_at = NOW()
        WHERE id = $1 AND company_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(input.employee_id)
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.role_title)
    .bind(input.seniority.as_str())
    .bind(Json(&input.skills))
    .bind(input.availability_percent)
    .bind(input.hourly_rate)
    .bind(&input.location)
    .bind(&input.bio)
    .bind(status.as_str())
    .bind(actor)
    .fetch_optional(pool)
    .await
}

/// Replaces only the skill list (used when extracted skills are applied).
pub async fn set_resource_skills(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
    actor: Uuid,
    skills: &[Skill],
) -> sqlx::Result<Option<ResourceRow>> {
    sqlx::query_as::<_, ResourceRow>(
        r#"
        UPDATE resources SET skills = $3, updated_by = $4, updated_at = NOW()
        WHERE id = $1 AND company_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(Json(skills))
    .bind(actor)
    .fetch_optional(pool)
    .await
}

pub async fn delete_resource(pool: &PgPool, company_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM resources WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    use crate::listing::{apply, ListParams};
    use crate::models::skill::Proficiency;

    pub(crate) fn skill(name: &str, proficiency: Proficiency) -> Skill {
        Skill {
            name: name.to_string(),
            category: None,
            proficiency,
            years_experience: None,
        }
    }

    /// A resource row for pure tests.
    pub(crate) fn resource(name: &str, availability: i32, skills: Vec<Skill>) -> ResourceRow {
        let now = Utc::now();
        ResourceRow {
            id: Uuid::new_v4(),
            company_id: Uuid::nil(),
            employee_id: None,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            role_title: "Consultant".to_string(),
            seniority: "senior".to_string(),
            skills: Json(skills),
            availability_percent: availability,
            hourly_rate: None,
            location: None,
            bio: None,
            status: "available".to_string(),
            documents: Json(Vec::new()),
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_availability_and_rate_are_bounded() {
        let input: ResourceInput = serde_json::from_value(serde_json::json!({
            "name": "Lin", "email": "lin@example.com", "role_title": "Dev",
            "seniority": "mid", "availability_percent": 140, "hourly_rate": -5.0
        }))
        .unwrap();
        let Err(AppError::InvalidFields(fields)) = input.validate() else {
            panic!("expected field errors");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["availability_percent", "hourly_rate"]);
    }

    #[test]
    fn test_duplicate_skill_names_rejected_ignoring_case() {
        let input = ResourceInput {
            employee_id: None,
            name: "Lin".to_string(),
            email: "lin@example.com".to_string(),
            role_title: "Dev".to_string(),
            seniority: Seniority::Mid,
            skills: vec![
                skill("Rust", Proficiency::Advanced),
                skill(" rust ", Proficiency::Beginner),
            ],
            availability_percent: 100,
            hourly_rate: None,
            location: None,
            bio: None,
            status: None,
        };
        assert!(matches!(input.validate(), Err(AppError::InvalidFields(f)) if f.len() == 1));
    }

    #[test]
    fn test_availability_defaults_to_full() {
        let input: ResourceInput = serde_json::from_value(serde_json::json!({
            "name": "Lin", "email": "lin@example.com", "role_title": "Dev", "seniority": "lead"
        }))
        .unwrap();
        assert_eq!(input.availability_percent, 100);
    }

    #[test]
    fn test_search_covers_skill_names_and_seniority_sorts_by_rank() {
        let mut lead = resource("Zed", 100, vec![skill("Kubernetes", Proficiency::Expert)]);
        lead.seniority = "lead".to_string();
        let mut junior = resource("Amy", 100, vec![skill("React", Proficiency::Beginner)]);
        junior.seniority = "junior".to_string();

        let params = ListParams {
            q: Some("kube".to_string()),
            ..Default::default()
        };
        let found = apply(vec![lead.clone(), junior.clone()], &params).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Zed");

        let params = ListParams {
            sort: Some("seniority".to_string()),
            ..Default::default()
        };
        let sorted = apply(vec![lead, junior], &params).unwrap();
        assert_eq!(sorted[0].name, "Amy");
    }
}
