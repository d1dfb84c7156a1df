use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::listing::{Listable, SortKey};
use crate::models::project::{ProjectRow, ProjectStatus, RequiredSkill, TeamAssignment};
use crate::validation::{clean_optional, Validator};

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInput {
    #[serde(default)]
    pub client_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub required_skills: Vec<RequiredSkill>,
    #[serde(default)]
    pub team: Vec<TeamAssignment>,
}

impl ProjectInput {
    /// `known_resources` are the team's resource ids that exist in the tenant,
    /// as returned by `known_team_resources`.
    pub fn validate(&self, known_resources: &HashSet<Uuid>) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.required("name", &self.name)
            .max_len("name", &self.name, 200)
            .date_order("end_date", self.start_date, self.end_date)
            .non_negative("budget", self.budget)
            .unique_names(
                "required_skills",
                self.required_skills.iter().map(|s| s.name.as_str()),
            );
        validate_team(&mut v, &self.team, known_resources);
        v.finish()
    }

    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.description = clean_optional(self.description);
        for skill in &mut self.required_skills {
            skill.name = skill.name.trim().to_string();
        }
        self.team = normalize_team(self.team);
        self
    }
}

/// Percentages in range, every resource known to the tenant and listed once.
pub fn validate_team(v: &mut Validator, team: &[TeamAssignment], known_resources: &HashSet<Uuid>) {
    let mut seen = HashSet::new();
    for (i, member) in team.iter().enumerate() {
        if let Some(p) = member.allocation_percent {
            v.range_i32(&format!("team[{i}].allocation_percent"), p, 0, 100);
        }
        let field = format!("team[{i}].resource_id");
        if !known_resources.contains(&member.resource_id) {
            v.push(&field, "does not match a resource");
        } else if !seen.insert(member.resource_id) {
            v.push(&field, "is listed more than once");
        }
    }
}

/// The subset of the team's resource ids that belong to the tenant.
pub async fn known_team_resources(
    pool: &PgPool,
    company_id: Uuid,
    team: &[TeamAssignment],
) -> sqlx::Result<HashSet<Uuid>> {
    if team.is_empty() {
        return Ok(HashSet::new());
    }
    let ids: Vec<Uuid> = team.iter().map(|t| t.resource_id).collect();
    let known: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM resources WHERE company_id = $1 AND id = ANY($2)")
            .bind(company_id)
            .bind(&ids)
            .fetch_all(pool)
            .await?;
    Ok(known.into_iter().collect())
}

pub fn normalize_team(team: Vec<TeamAssignment>) -> Vec<TeamAssignment> {
    team.into_iter()
        .map(|mut t| {
            t.role = clean_optional(t.role);
            t
        })
        .collect()
}

impl Listable for ProjectRow {
    const SORT_FIELDS: &'static [&'static str] = &[
        "name",
        "status",
        "start_date",
        "end_date",
        "budget",
        "created_at",
    ];
    const DEFAULT_SORT: &'static str = "name";

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        if let Some(d) = &self.description {
            fields.push(d);
        }
        fields.extend(self.required_skills.0.iter().map(|s| s.name.as_str()));
        fields
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn sort_key(&self, field: &str) -> SortKey {
        match field {
            "status" => SortKey::text(&self.status),
            "start_date" => SortKey::Date(self.start_date),
            "end_date" => SortKey::Date(self.end_date),
            "budget" => SortKey::Number(self.budget.unwrap_or(0.0)),
            "created_at" => SortKey::Time(self.created_at),
            _ => SortKey::text(&self.name),
        }
    }
}

pub async fn list_projects(pool: &PgPool, company_id: Uuid) -> sqlx::Result<Vec<ProjectRow>> {
    sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE company_id = $1 ORDER BY name ASC")
        .bind(company_id)
        .fetch_all(pool)
        .await
}

pub async fn list_projects_for_client(
    pool: &PgPool,
    company_id: Uuid,
    client_id: Uuid,
) -> sqlx::Result<Vec<ProjectRow>> {
    sqlx::query_as::<_, ProjectRow>(
        "SELECT * FROM projects WHERE company_id = $1 AND client_id = $2 ORDER BY name ASC",
    )
    .bind(company_id)
    .bind(client_id)
    .fetch_all(pool)
    .await
}

pub async fn get_project(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
) -> sqlx::Result<Option<ProjectRow>> {
    sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .fetch_optional(pool)
        .await
}

pub async fn require_project(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
) -> Result<ProjectRow, AppError> {
    get_project(pool, company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))
}

pub async fn insert_project(
    pool: &PgPool,
    company_id: Uuid,
    actor: Uuid,
    input: &ProjectInput,
) -> sqlx::Result<ProjectRow> {
    let row = sqlx::query_as::<_, ProjectRow>(
        r#"
        INSERT INTO projects
            (id, company_id, client_id, name, description, status, start_date, end_date,
             budget, required_skills, team, created_by, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(input.client_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.status.unwrap_or(ProjectStatus::Planning).as_str())
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.budget)
    .bind(Json(&input.required_skills))
    .bind(Json(&input.team))
    .bind(actor)
    .fetch_one(pool)
    .await?;

    info!("Created project {} in company {company_id}", row.id);
    Ok(row)
}

pub async fn update_project(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
    actor: Uuid,
    input: &ProjectInput,
) -> sqlx::Result<Option<ProjectRow>> {
    sqlx::query_as::<_, ProjectRow>(
        r#"
        UPDATE projects SET
            client_id = $3, name = $4, description = $5, status = COALESCE($6, status),
            start_date = $7,
            end_date = $8, budget = $9, required_skills = $10, team = $11,
            updated_by = $12, updated_at = NOW()
        WHERE id = $1 AND company_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(input.client_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.budget)
    .bind(Json(&input.required_skills))
    .bind(Json(&input.team))
    .bind(actor)
    .fetch_optional(pool)
    .await
}

pub async fn set_project_team(
    pool: &PgPool,
    company_id: Uuid,
    id: Uuid,
    actor: Uuid,
    team: &[TeamAssignment],
) -> sqlx::Result<Option<ProjectRow>> {
    sqlx::query_as::<_, ProjectRow>(
        r#"
        UPDATE projects SET team = $3, updated_by = $4, updated_at = NOW()
        WHERE id = $1 AND company_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(Json(team))
    .bind(actor)
    .fetch_optional(pool)
    .await
}

/// Appends the resource to the project team unless it is already listed.
/// Returns whether the team changed.
pub async fn add_team_member(
    pool: &PgPool,
    company_id: Uuid,
    project_id: Uuid,
    actor: Uuid,
    assignment: TeamAssignment,
) -> sqlx::Result<bool> {
    let probe = serde_json::json!([{ "resource_id": assignment.resource_id }]);
    let result = sqlx::query(
        r#"
        UPDATE projects
        SET team = team || jsonb_build_array($3::JSONB), updated_by = $5, updated_at = NOW()
        WHERE id = $1 AND company_id = $2 AND NOT (team @> $4::JSONB)
        "#,
    )
    .bind(project_id)
    .bind(company_id)
    .bind(Json(&assignment))
    .bind(&probe)
    .bind(actor)
    .execute(pool)
    .await?;

    let added = result.rows_affected() > 0;
    if added {
        info!(
            "Added resource {} to the team of project {project_id}",
            assignment.resource_id
        );
    }
    Ok(added)
}

pub async fn delete_project(pool: &PgPool, company_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND company_id = $2")
        .bind(id)
        .bind(company_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Importance;
    use crate::models::skill::Proficiency;

    #[test]
    fn test_payload_defaults_required_skill_fields() {
        let input: ProjectInput = serde_json::from_value(serde_json::json!({
            "name": "Migration",
            "required_skills": [{ "name": "Rust" }, { "name": "SQL", "importance": "nice_to_have", "min_proficiency": "advanced" }]
        }))
        .unwrap();
        assert_eq!(input.required_skills[0].min_proficiency, Proficiency::Intermediate);
        assert_eq!(input.required_skills[0].importance, Importance::Required);
        assert_eq!(input.required_skills[1].importance, Importance::NiceToHave);
        assert_eq!(input.required_skills[1].min_proficiency, Proficiency::Advanced);
        assert!(input.validate(&HashSet::new()).is_ok());
    }

    #[test]
    fn test_invalid_project_fields() {
        let input: ProjectInput = serde_json::from_value(serde_json::json!({
            "name": "",
            "start_date": "2024-06-01",
            "end_date": "2024-05-01",
            "budget": -10.0,
            "required_skills": [{ "name": "Rust" }, { "name": "rust" }]
        }))
        .unwrap();
        let Err(AppError::InvalidFields(fields)) = input.validate(&HashSet::new()) else {
            panic!("expected field errors");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(
            names,
            vec!["name", "end_date", "budget", "required_skills[1].name"]
        );
    }

    #[test]
    fn test_team_rejects_repeats_and_bad_percentages() {
        let id = Uuid::new_v4();
        let team = vec![
            TeamAssignment {
                resource_id: id,
                role: None,
                allocation_percent: Some(150),
            },
            TeamAssignment {
                resource_id: id,
                role: None,
                allocation_percent: None,
            },
        ];
        let mut v = Validator::new();
        validate_team(&mut v, &team, &HashSet::from([id]));
        assert_eq!(v.errors().len(), 2);
    }

    #[test]
    fn test_team_must_reference_tenant_resources() {
        let ours = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        let input: ProjectInput = serde_json::from_value(serde_json::json!({
            "name": "Migration",
            "team": [{ "resource_id": ours }, { "resource_id": foreign }]
        }))
        .unwrap();

        let Err(AppError::InvalidFields(fields)) = input.validate(&HashSet::from([ours])) else {
            panic!("expected field errors");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "team[1].resource_id");
        assert_eq!(fields[0].message, "does not match a resource");

        assert!(input.validate(&HashSet::from([ours, foreign])).is_ok());
    }

    async fn live_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
        crate::db::create_pool(&url).await.unwrap()
    }

    fn named(name: &str) -> ProjectInput {
        serde_json::from_value(serde_json::json!({ "name": name })).unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires a live Postgres (DATABASE_URL)"]
    async fn test_records_are_scoped_to_their_company() {
        use crate::staffing::resources::{delete_resource, insert_resource, ResourceInput};

        let pool = live_pool().await;
        let (ours, theirs, actor) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let resource_input: ResourceInput = serde_json::from_value(serde_json::json!({
            "name": "Ada", "email": "ada@example.com",
            "role_title": "Consultant", "seniority": "senior"
        }))
        .unwrap();
        let resource = insert_resource(&pool, ours, actor, &resource_input).await.unwrap();

        let mut input = named("Platform");
        input.status = Some(ProjectStatus::Completed);
        let project = insert_project(&pool, ours, actor, &input).await.unwrap();

        assert!(get_project(&pool, theirs, project.id).await.unwrap().is_none());
        assert!(matches!(
            require_project(&pool, theirs, project.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(update_project(&pool, theirs, project.id, actor, &named("Hijack"))
            .await
            .unwrap()
            .is_none());
        assert!(!delete_project(&pool, theirs, project.id).await.unwrap());

        let team = vec![TeamAssignment {
            resource_id: resource.id,
            role: None,
            allocation_percent: None,
        }];
        assert!(known_team_resources(&pool, theirs, &team).await.unwrap().is_empty());
        assert_eq!(
            known_team_resources(&pool, ours, &team).await.unwrap(),
            HashSet::from([resource.id])
        );

        // Omitting status on update keeps the stored one.
        let renamed = update_project(&pool, ours, project.id, actor, &named("Platform v2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Platform v2");
        assert_eq!(renamed.status, ProjectStatus::Completed.as_str());

        assert!(delete_project(&pool, ours, project.id).await.unwrap());
        assert!(delete_resource(&pool, ours, resource.id).await.unwrap());
    }
}
