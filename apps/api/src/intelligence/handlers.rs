use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::audit::{self, AuditAction};
use crate::auth::extractors::TenantContext;
use crate::errors::AppError;
use crate::intelligence::extraction::{document_text, extract_skills, merge_skills, SkillExtraction};
use crate::intelligence::matching::{MatchReport, MatchRequest};
use crate::intelligence::skill_gap::{analyze, recommend, team_ids, SkillGapReport};
use crate::models::resource::ResourceRow;
use crate::models::skill::{DocumentKind, DocumentRef};
use crate::portfolio::projects::require_project;
use crate::staffing::allocations::{list_allocations, AllocationFilter};
use crate::staffing::documents::get_object;
use crate::staffing::load::Window;
use crate::staffing::resources::{list_resources, require_resource, set_resource_skills};
use crate::state::AppState;

const DEFAULT_MATCH_LIMIT: usize = 5;
const MAX_MATCH_LIMIT: usize = 50;

// ── Skill extraction ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
}

/// POST /api/v1/ai/extract-skills
pub async fn handle_extract_skills(
    State(state): State<AppState>,
    _ctx: TenantContext,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<SkillExtraction>, AppError> {
    Ok(Json(extract_skills(&state.llm, &req.text).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceExtractRequest {
    #[serde(default)]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub apply: bool,
}

#[derive(Debug, Serialize)]
pub struct ResourceExtraction {
    pub document_id: Uuid,
    pub extraction: SkillExtraction,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRow>,
}

/// The requested document, or the most recently uploaded resume.
fn pick_document(documents: &[DocumentRef], requested: Option<Uuid>) -> Result<&DocumentRef, AppError> {
    match requested {
        Some(id) => documents
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Document {id} not found"))),
        None => documents
            .iter()
            .filter(|d| d.kind == DocumentKind::Resume)
            .max_by_key(|d| d.uploaded_at)
            .ok_or_else(|| {
                AppError::Validation(
                    "This resource has no resume document; upload one or pass document_id"
                        .to_string(),
                )
            }),
    }
}

/// POST /api/v1/resources/:id/extract-skills
pub async fn handle_extract_resource_skills(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(resource_id): Path<Uuid>,
    Json(req): Json<ResourceExtractRequest>,
) -> Result<Json<ResourceExtraction>, AppError> {
    if req.apply {
        ctx.require_editor()?;
    }
    let resource = require_resource(&state.db, ctx.company_id, resource_id).await?;
    let document = pick_document(&resource.documents.0, req.document_id)?.clone();

    let data = get_object(&state.s3, &state.config.s3_bucket, &document.storage_key).await?;
    let text = document_text(&document.content_type, data.to_vec()).await?;
    let extraction = extract_skills(&state.llm, &text).await?;

    if !req.apply {
        return Ok(Json(ResourceExtraction {
            document_id: document.id,
            extraction,
            applied: false,
            resource: None,
        }));
    }

    let merged = merge_skills(&resource.skills.0, &extraction.skills);
    let updated = set_resource_skills(&state.db, ctx.company_id, resource_id, ctx.user_id, &merged)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resource {resource_id} not found")))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "resource",
        Some(resource_id),
        json!({
            "skills_extracted_from": document.id,
            "skill_count": { "before": resource.skills.0.len(), "after": merged.len() },
        }),
    )
    .await;
    info!(
        "Applied {} extracted skills to resource {resource_id}",
        extraction.skills.len()
    );

    Ok(Json(ResourceExtraction {
        document_id: document.id,
        extraction,
        applied: true,
        resource: Some(updated),
    }))
}

// ── Candidate matching ─────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MatchCandidatesRequest {
    pub project_id: Uuid,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn match_limit(requested: Option<usize>) -> Result<usize, AppError> {
    match requested {
        None => Ok(DEFAULT_MATCH_LIMIT),
        Some(n) if (1..=MAX_MATCH_LIMIT).contains(&n) => Ok(n),
        Some(n) => Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_MATCH_LIMIT} (got {n})"
        ))),
    }
}

/// POST /api/v1/ai/match-candidates
pub async fn handle_match_candidates(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(req): Json<MatchCandidatesRequest>,
) -> Result<Json<MatchReport>, AppError> {
    let limit = match_limit(req.limit)?;
    let project = require_project(&state.db, ctx.company_id, req.project_id).await?;
    let resources = list_resources(&state.db, ctx.company_id).await?;
    let allocations = list_allocations(&state.db, ctx.company_id, AllocationFilter::default()).await?;

    let request = MatchRequest {
        project: &project,
        resources: &resources,
        allocations: &allocations,
        window: Window::for_project(&project, Utc::now().date_naive()),
        limit,
    };
    let report = state.matcher.rank(&request).await?;
    info!(
        "Matched {} candidates for project {} ({} backend)",
        report.candidates.len(),
        project.id,
        report.matcher_backend
    );
    Ok(Json(report))
}

// ── Skill gap ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SkillGapRequest {
    pub project_id: Uuid,
    #[serde(default = "default_true")]
    pub include_recommendations: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/v1/ai/skill-gap
pub async fn handle_skill_gap(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(req): Json<SkillGapRequest>,
) -> Result<Json<SkillGapReport>, AppError> {
    let project = require_project(&state.db, ctx.company_id, req.project_id).await?;
    let resources = list_resources(&state.db, ctx.company_id).await?;
    let allocations = list_allocations(
        &state.db,
        ctx.company_id,
        AllocationFilter {
            resource_id: None,
            project_id: Some(project.id),
        },
    )
    .await?;

    let ids = team_ids(&project, &allocations);
    let team: Vec<ResourceRow> = ids
        .iter()
        .filter_map(|id| resources.iter().find(|r| r.id == *id).cloned())
        .collect();
    let mut report = analyze(&project, &team);

    if req.include_recommendations {
        let window = Window::for_project(&project, Utc::now().date_naive());
        recommend(&state.llm, &state.db, &project, &mut report, &resources, window).await?;
    }
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc(kind: DocumentKind, age_days: i64) -> DocumentRef {
        DocumentRef {
            id: Uuid::new_v4(),
            name: "cv.pdf".to_string(),
            kind,
            content_type: "application/pdf".to_string(),
            size_bytes: 1024,
            storage_key: "k".to_string(),
            uploaded_at: Utc::now() - Duration::days(age_days),
            uploaded_by: None,
        }
    }

    #[test]
    fn test_newest_resume_picked_by_default() {
        let old = doc(DocumentKind::Resume, 30);
        let new = doc(DocumentKind::Resume, 1);
        let contract = doc(DocumentKind::Contract, 0);
        let docs = vec![old, new.clone(), contract.clone()];

        assert_eq!(pick_document(&docs, None).unwrap().id, new.id);
        assert_eq!(pick_document(&docs, Some(contract.id)).unwrap().id, contract.id);
        assert!(matches!(
            pick_document(&docs, Some(Uuid::new_v4())),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            pick_document(&[contract], None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_match_limit_bounds() {
        assert_eq!(match_limit(None).unwrap(), DEFAULT_MATCH_LIMIT);
        assert_eq!(match_limit(Some(50)).unwrap(), 50);
        assert!(match_limit(Some(0)).is_err());
        assert!(match_limit(Some(51)).is_err());
    }

    #[test]
    fn test_skill_gap_request_defaults_to_recommendations() {
        let req: SkillGapRequest =
            serde_json::from_value(json!({ "project_id": Uuid::nil() })).unwrap();
        assert!(req.include_recommendations);
    }
}
