//! Resource lookups exposed to the model during tool-assisted calls.
//! Every lookup is scoped to one company.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::{ToolHandler, ToolSpec};
use crate::models::allocation::AllocationRow;
use crate::models::resource::ResourceRow;
use crate::models::skill::{find_skill, Proficiency, Skill};
use crate::staffing::allocations::{list_allocations, AllocationFilter};
use crate::staffing::load::{free_capacity, Window};
use crate::staffing::resources::{get_resource, list_resources};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const MAX_SEARCH_LIMIT: usize = 25;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub min_proficiency: Option<Proficiency>,
    #[serde(default)]
    pub min_free_capacity: Option<i32>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ResourceIdInput {
    resource_id: Uuid,
}

/// What the model sees of a resource. Rates and contact details are left out.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSummary {
    pub resource_id: Uuid,
    pub name: String,
    pub role_title: String,
    pub seniority: String,
    pub status: String,
    pub availability_percent: i32,
    pub free_capacity: i32,
    pub skills: Vec<Skill>,
}

impl ResourceSummary {
    fn new(resource: &ResourceRow, free_capacity: i32) -> Self {
        Self {
            resource_id: resource.id,
            name: resource.name.clone(),
            role_title: resource.role_title.clone(),
            seniority: resource.seniority.clone(),
            status: resource.status.clone(),
            availability_percent: resource.availability_percent,
            free_capacity,
            skills: resource.skills.0.clone(),
        }
    }
}

/// Filters resources for `search_resources`, most free capacity first.
pub fn search(
    resources: &[ResourceRow],
    allocations: &[AllocationRow],
    window: Window,
    exclude_project: Option<Uuid>,
    query: &SearchQuery,
) -> Vec<ResourceSummary> {
    let min_capacity = query.min_free_capacity.unwrap_or(0);
    let mut hits: Vec<ResourceSummary> = resources
        .iter()
        .filter(|r| !r.is_unavailable())
        .filter(|r| match query.skill.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(name) => find_skill(&r.skills.0, name).is_some_and(|s| {
                query.min_proficiency.map_or(true, |min| s.proficiency >= min)
            }),
        })
        .map(|r| ResourceSummary::new(r, free_capacity(r, allocations, window, exclude_project)))
        .filter(|s| s.free_capacity >= min_capacity)
        .collect();

    hits.sort_by(|a, b| {
        b.free_capacity
            .cmp(&a.free_capacity)
            .then_with(|| a.name.cmp(&b.name))
    });
    hits.truncate(
        query
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT),
    );
    hits
}

/// Tool handler over one company's resources, with capacity measured across
/// a project's window.
pub struct ResourceTools {
    pool: PgPool,
    company_id: Uuid,
    window: Window,
    project_id: Option<Uuid>,
}

impl ResourceTools {
    pub fn new(pool: PgPool, company_id: Uuid, window: Window, project_id: Option<Uuid>) -> Self {
        Self {
            pool,
            company_id,
            window,
            project_id,
        }
    }

    async fn company_allocations(&self) -> Result<Vec<AllocationRow>, AppError> {
        Ok(list_allocations(&self.pool, self.company_id, AllocationFilter::default()).await?)
    }

    async fn search_resources(&self, input: &Value) -> Result<Value, AppError> {
        let query: SearchQuery = serde_json::from_value(input.clone())
            .map_err(|e| AppError::Validation(format!("Invalid search_resources input: {e}")))?;
        let resources = list_resources(&self.pool, self.company_id).await?;
        let allocations = self.company_allocations().await?;
        let hits = search(&resources, &allocations, self.window, self.project_id, &query);
        Ok(json!({ "resources": hits }))
    }

    async fn get_resource(&self, input: &Value) -> Result<Value, AppError> {
        let ResourceIdInput { resource_id } = serde_json::from_value(input.clone())
            .map_err(|e| AppError::Validation(format!("Invalid get_resource input: {e}")))?;
        let resource = get_resource(&self.pool, self.company_id, resource_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {resource_id} not found")))?;
        let allocations = self.company_allocations().await?;
        let capacity = free_capacity(&resource, &allocations, self.window, self.project_id);
        Ok(json!({
            "resource": ResourceSummary::new(&resource, capacity),
            "bio": resource.bio,
        }))
    }
}

pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "search_resources",
            description: "Search the company's resources by skill and minimum free capacity \
                (percent of a week still bookable during the project). Returns summaries \
                sorted by free capacity.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "skill": { "type": "string", "description": "Skill name, case-insensitive" },
                    "min_proficiency": {
                        "type": "string",
                        "enum": ["beginner", "intermediate", "advanced", "expert"]
                    },
                    "min_free_capacity": { "type": "integer", "minimum": 0, "maximum": 100 },
                    "limit": { "type": "integer", "minimum": 1, "maximum": MAX_SEARCH_LIMIT }
                }
            }),
        },
        ToolSpec {
            name: "get_resource",
            description: "Fetch one resource's full profile by id.",
            input_schema: json!({
                "type": "object",
                "properties": { "resource_id": { "type": "string", "format": "uuid" } },
                "required": ["resource_id"]
            }),
        },
    ]
}

#[async_trait]
impl ToolHandler for ResourceTools {
    fn tools(&self) -> Vec<ToolSpec> {
        tool_specs()
    }

    async fn call_tool(&self, name: &str, input: &Value) -> Result<Value, AppError> {
        match name {
            "search_resources" => self.search_resources(input).await,
            "get_resource" => self.get_resource(input).await,
            other => Err(AppError::Validation(format!("Unknown tool '{other}'"))),
        }
    }
}
