//! Candidate matching: pluggable, trait-based ranking of resources against a
//! project's required skills.
//!
//! Default: `SkillMatcher` (pure-Rust, deterministic, fully testable).
//! Optional: `LlmMatcher` (the model browses the resource pool through tools).
//!
//! `AppState` holds an `Arc<dyn CandidateMatcher>`, chosen at startup via config.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::intelligence::prompts::{MATCHING_PROMPT_TEMPLATE, MATCHING_SYSTEM};
use crate::intelligence::tools::ResourceTools;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, TOOL_USE_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::allocation::AllocationRow;
use crate::models::project::{ProjectRow, RequiredSkill};
use crate::models::resource::ResourceRow;
use crate::models::skill::{find_skill, Skill};
use crate::staffing::load::{free_capacity, Window};

const SKILL_WEIGHT: f64 = 0.7;
const CAPACITY_WEIGHT: f64 = 0.3;
const MAX_MATCH_RETRIES: u32 = 2;

// ────────────────────────────────────────────────────────────────────────────
// Shared data models
// ────────────────────────────────────────────────────────────────────────────

/// How well one person's skills meet one requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillFit {
    /// Held at or above the minimum proficiency.
    Full,
    /// Held, but below the minimum.
    Partial,
    Absent,
}

impl SkillFit {
    pub fn of(skills: &[Skill], required: &RequiredSkill) -> Self {
        match find_skill(skills, &required.name) {
            Some(s) if s.proficiency >= required.min_proficiency => SkillFit::Full,
            Some(_) => SkillFit::Partial,
            None => SkillFit::Absent,
        }
    }

    pub fn strength(&self) -> f64 {
        match self {
            SkillFit::Full => 1.0,
            SkillFit::Partial => 0.5,
            SkillFit::Absent => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub resource_id: Uuid,
    pub name: String,
    pub score: u32,      // 0 – 100
    pub skill_score: u32, // 0 – 100
    pub free_capacity: i32,
    pub rationale: String,
    pub matched_skills: Vec<String>,
    pub partial_skills: Vec<String>,
    pub missing_skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub project_id: Uuid,
    pub candidates: Vec<CandidateMatch>,
    pub recommendation: String,
    pub matcher_backend: String, // "skill" | "llm"
}

/// Everything a matcher needs, loaded once by the handler.
pub struct MatchRequest<'a> {
    pub project: &'a ProjectRow,
    /// All of the company's resources.
    pub resources: &'a [ResourceRow],
    /// All of the company's allocations.
    pub allocations: &'a [AllocationRow],
    pub window: Window,
    pub limit: usize,
}

impl MatchRequest<'_> {
    fn requirements(&self) -> &[RequiredSkill] {
        &self.project.required_skills.0
    }

    fn capacity_of(&self, resource: &ResourceRow) -> i32 {
        free_capacity(resource, self.allocations, self.window, Some(self.project.id))
    }

    fn empty_report(&self, backend: &str) -> MatchReport {
        MatchReport {
            project_id: self.project.id,
            candidates: vec![],
            recommendation: "This project lists no required skills. Add them to rank candidates."
                .to_string(),
            matcher_backend: backend.to_string(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Ranks resources for a project. Implement this to swap backends without
/// touching the endpoint or handler.
#[async_trait]
pub trait CandidateMatcher: Send + Sync {
    async fn rank(&self, request: &MatchRequest<'_>) -> Result<MatchReport, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// SkillMatcher
// ────────────────────────────────────────────────────────────────────────────

/// Deterministic matcher.
///
/// Algorithm:
/// 1. Skip resources whose status is `unavailable`.
/// 2. For each required skill: held at ≥ min proficiency → 1.0, held below → 0.5,
///    absent → 0.0; weighted by importance (required 1.0, nice-to-have 0.5).
/// 3. skill_score = weighted mean × 100; people with no relevant skill are dropped.
/// 4. score = round(0.7 × skill_score + 0.3 × free capacity during the project).
/// 5. Highest score first, ties by name.
pub struct SkillMatcher;

#[async_trait]
impl CandidateMatcher for SkillMatcher {
    async fn rank(&self, request: &MatchRequest<'_>) -> Result<MatchReport, AppError> {
        Ok(rank_by_skills(request))
    }
}

struct SkillBreakdown {
    skill_score: f64,
    matched: Vec<String>,
    partial: Vec<String>,
    missing: Vec<String>,
}

fn skill_breakdown(skills: &[Skill], requirements: &[RequiredSkill]) -> SkillBreakdown {
    let mut total_weight = 0.0;
    let mut earned = 0.0;
    let mut breakdown = SkillBreakdown {
        skill_score: 0.0,
        matched: vec![],
        partial: vec![],
        missing: vec![],
    };

    for required in requirements {
        let fit = SkillFit::of(skills, required);
        total_weight += required.weight();
        earned += required.weight() * fit.strength();
        let bucket = match fit {
            SkillFit::Full => &mut breakdown.matched,
            SkillFit::Partial => &mut breakdown.partial,
            SkillFit::Absent => &mut breakdown.missing,
        };
        bucket.push(required.name.clone());
    }

    if total_weight > 0.0 {
        breakdown.skill_score = earned / total_weight * 100.0;
    }
    breakdown
}

fn overall_score(skill_score: f64, free_capacity: i32) -> u32 {
    (SKILL_WEIGHT * skill_score + CAPACITY_WEIGHT * f64::from(free_capacity.clamp(0, 100)))
        .round() as u32
}

fn rationale(b: &SkillBreakdown, free_capacity: i32) -> String {
    let mut parts = Vec::new();
    if !b.matched.is_empty() {
        parts.push(format!("meets {}", b.matched.join(", ")));
    }
    if !b.partial.is_empty() {
        parts.push(format!("below level in {}", b.partial.join(", ")));
    }
    if !b.missing.is_empty() {
        parts.push(format!("lacks {}", b.missing.join(", ")));
    }
    parts.push(format!("{free_capacity}% free during the project"));
    let mut text = parts.join("; ");
    if let Some(first) = text.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    text
}

fn rank_by_skills(request: &MatchRequest<'_>) -> MatchReport {
    let requirements = request.requirements();
    if requirements.is_empty() {
        return request.empty_report("skill");
    }

    let mut candidates: Vec<CandidateMatch> = request
        .resources
        .iter()
        .filter(|r| !r.is_unavailable())
        .filter_map(|r| {
            let breakdown = skill_breakdown(&r.skills.0, requirements);
            if breakdown.skill_score <= 0.0 {
                return None;
            }
            let capacity = request.capacity_of(r);
            Some(CandidateMatch {
                resource_id: r.id,
                name: r.name.clone(),
                score: overall_score(breakdown.skill_score, capacity),
                skill_score: breakdown.skill_score.round() as u32,
                free_capacity: capacity,
                rationale: rationale(&breakdown, capacity),
                matched_skills: breakdown.matched,
                partial_skills: breakdown.partial,
                missing_skills: breakdown.missing,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    candidates.truncate(request.limit);

    let recommendation = match candidates.first() {
        Some(top) => format!(
            "{} is the strongest match with a score of {} ({}% free).",
            top.name, top.score, top.free_capacity
        ),
        None => "No available resource holds any of the required skills. \
            Consider hiring or contracting."
            .to_string(),
    };

    MatchReport {
        project_id: request.project.id,
        candidates,
        recommendation,
        matcher_backend: "skill".to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmMatcher
// ────────────────────────────────────────────────────────────────────────────

/// The model searches the pool with `search_resources` / `get_resource` and
/// picks candidates. Ids and scores are checked; capacity is recomputed here.
pub struct LlmMatcher {
    llm: LlmClient,
    pool: PgPool,
}

impl LlmMatcher {
    pub fn new(llm: LlmClient, pool: PgPool) -> Self {
        Self { llm, pool }
    }
}

#[derive(Debug, Deserialize)]
struct LlmCandidates {
    candidates: Vec<LlmCandidate>,
}

#[derive(Debug, Deserialize)]
struct LlmCandidate {
    resource_id: String,
    score: f64,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    matched_skills: Vec<String>,
    #[serde(default)]
    missing_skills: Vec<String>,
}

#[async_trait]
impl CandidateMatcher for LlmMatcher {
    async fn rank(&self, request: &MatchRequest<'_>) -> Result<MatchReport, AppError> {
        if request.requirements().is_empty() {
            return Ok(request.empty_report("llm"));
        }

        let prompt = build_matching_prompt(request)?;
        let tools = ResourceTools::new(
            self.pool.clone(),
            request.project.company_id,
            request.window,
            Some(request.project.id),
        );

        for attempt in 0..=MAX_MATCH_RETRIES {
            let answer: LlmCandidates = self
                .llm
                .call_with_tools(&prompt, MATCHING_SYSTEM, &tools)
                .await
                .map_err(|e| AppError::Llm(format!("Candidate matching LLM call failed: {e}")))?;

            match accept_llm_candidates(request, answer.candidates) {
                Ok(candidates) => {
                    info!(
                        "LLM matcher returned {} candidates for project {}",
                        candidates.len(),
                        request.project.id
                    );
                    let recommendation = candidates
                        .first()
                        .map(|c| format!("{}: {}", c.name, c.rationale))
                        .unwrap_or_else(|| "No suitable candidates were found.".to_string());
                    return Ok(MatchReport {
                        project_id: request.project.id,
                        candidates,
                        recommendation,
                        matcher_backend: "llm".to_string(),
                    });
                }
                Err(reason) => warn!(
                    "Matching attempt {}/{} rejected: {reason}, retrying",
                    attempt + 1,
                    MAX_MATCH_RETRIES + 1
                ),
            }
        }

        Err(AppError::Llm(format!(
            "Candidate matching failed after {} attempts: the model kept returning \
            unknown resources or out-of-range scores",
            MAX_MATCH_RETRIES + 1
        )))
    }
}

/// Checks the model's picks against the tenant's resources and fills in the
/// deterministic fields. Any unknown id or out-of-range score rejects the answer.
fn accept_llm_candidates(
    request: &MatchRequest<'_>,
    picks: Vec<LlmCandidate>,
) -> Result<Vec<CandidateMatch>, String> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for pick in picks {
        let id: Uuid = pick
            .resource_id
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a resource id", pick.resource_id))?;
        let resource = request
            .resources
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| format!("resource {id} does not exist"))?;
        if !(0.0..=100.0).contains(&pick.score) {
            return Err(format!("score {} for {id} is outside 0–100", pick.score));
        }
        if !seen.insert(id) {
            continue;
        }

        let breakdown = skill_breakdown(&resource.skills.0, request.requirements());
        candidates.push(CandidateMatch {
            resource_id: id,
            name: resource.name.clone(),
            score: pick.score.round() as u32,
            skill_score: breakdown.skill_score.round() as u32,
            free_capacity: request.capacity_of(resource),
            rationale: pick.rationale,
            matched_skills: pick.matched_skills,
            partial_skills: breakdown.partial,
            missing_skills: pick.missing_skills,
        });
    }

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    candidates.truncate(request.limit);
    Ok(candidates)
}

fn build_matching_prompt(request: &MatchRequest<'_>) -> Result<String, AppError> {
    let project = serde_json::to_string_pretty(&serde_json::json!({
        "name": request.project.name,
        "description": request.project.description,
        "start_date": request.project.start_date,
        "end_date": request.project.end_date,
    }))
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize project: {e}")))?;

    let requirements = request
        .requirements()
        .iter()
        .map(|r| format!("- {} ({}, {})", r.name, r.min_proficiency, r.importance))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "{}\n\n{TOOL_USE_INSTRUCTION}\n\n{GROUNDING_INSTRUCTION}",
        MATCHING_PROMPT_TEMPLATE
            .replace("{project}", &project)
            .replace("{requirements}", &requirements)
            .replace("{limit}", &request.limit.to_string())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    use crate::models::project::Importance;
    use crate::models::skill::Proficiency;
    use crate::staffing::load::tests::{alloc, d, project};
    use crate::staffing::resources::tests::{resource, skill};

    fn required(name: &str, min: Proficiency, importance: Importance) -> RequiredSkill {
        RequiredSkill {
            name: name.to_string(),
            min_proficiency: min,
            importance,
        }
    }

    fn staffed_project() -> ProjectRow {
        let mut p = project(Some(d(2025, 4, 1)), Some(d(2025, 4, 30)));
        p.required_skills = Json(vec![
            required("Rust", Proficiency::Advanced, Importance::Required),
            required("Kafka", Proficiency::Intermediate, Importance::NiceToHave),
        ]);
        p
    }

    fn request<'a>(
        project: &'a ProjectRow,
        resources: &'a [ResourceRow],
        allocations: &'a [AllocationRow],
    ) -> MatchRequest<'a> {
        MatchRequest {
            project,
            resources,
            allocations,
            window: Window::for_project(project, d(2025, 1, 1)),
            limit: 5,
        }
    }

    #[test]
    fn test_skill_fit_levels() {
        let skills = vec![skill("rust", Proficiency::Intermediate)];
        let need = required("Rust", Proficiency::Advanced, Importance::Required);
        assert_eq!(SkillFit::of(&skills, &need), SkillFit::Partial);
        let need = required("Rust", Proficiency::Beginner, Importance::Required);
        assert_eq!(SkillFit::of(&skills, &need), SkillFit::Full);
        let need = required("Go", Proficiency::Beginner, Importance::Required);
        assert_eq!(SkillFit::of(&skills, &need), SkillFit::Absent);
    }

    #[tokio::test]
    async fn test_ranking_weights_skills_and_capacity() {
        let p = staffed_project();
        // Full Rust, no Kafka: skill = 1.0 / 1.5 → 66.7
        let ada = resource("Ada", 100, vec![skill("Rust", Proficiency::Expert)]);
        // Both at level: skill 100, but 60% booked elsewhere → 40 free
        let bo = resource(
            "Bo",
            100,
            vec![
                skill("Rust", Proficiency::Advanced),
                skill("Kafka", Proficiency::Advanced),
            ],
        );
        let busy = alloc(bo.id, Uuid::new_v4(), 60, d(2025, 4, 10), d(2025, 5, 10));
        let resources = vec![ada.clone(), bo.clone()];
        let allocations = vec![busy];

        let report = SkillMatcher
            .rank(&request(&p, &resources, &allocations))
            .await
            .unwrap();

        assert_eq!(report.matcher_backend, "skill");
        let bo_match = &report.candidates[0];
        assert_eq!(bo_match.name, "Bo");
        assert_eq!(bo_match.free_capacity, 40);
        assert_eq!(bo_match.score, 82); // 0.7×100 + 0.3×40
        let ada_match = &report.candidates[1];
        assert_eq!(ada_match.skill_score, 67);
        assert_eq!(ada_match.score, 77); // 0.7×66.67 + 0.3×100
        assert_eq!(ada_match.missing_skills, vec!["Kafka".to_string()]);
    }

    #[tokio::test]
    async fn test_allocations_on_this_project_do_not_reduce_capacity() {
        let p = staffed_project();
        let ada = resource("Ada", 80, vec![skill("Rust", Proficiency::Expert)]);
        let here = alloc(ada.id, p.id, 50, d(2025, 4, 1), d(2025, 4, 30));
        let resources = vec![ada];
        let allocations = vec![here];
        let report = SkillMatcher
            .rank(&request(&p, &resources, &allocations))
            .await
            .unwrap();
        assert_eq!(report.candidates[0].free_capacity, 80);
    }

    #[tokio::test]
    async fn test_unavailable_and_unskilled_are_excluded_ties_by_name() {
        let p = staffed_project();
        let mut gone = resource("Ann", 100, vec![skill("Rust", Proficiency::Expert)]);
        gone.status = "unavailable".to_string();
        let zed = resource("Zed", 100, vec![skill("Rust", Proficiency::Expert)]);
        let cal = resource("Cal", 100, vec![skill("Rust", Proficiency::Expert)]);
        let nobody = resource("Dee", 100, vec![skill("Excel", Proficiency::Expert)]);
        let resources = vec![gone, zed, cal, nobody];

        let report = SkillMatcher
            .rank(&request(&p, &resources, &[]))
            .await
            .unwrap();
        let names: Vec<&str> = report.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cal", "Zed"]);
    }

    #[tokio::test]
    async fn test_limit_truncates() {
        let p = staffed_project();
        let resources: Vec<ResourceRow> = (0..8)
            .map(|i| resource(&format!("R{i}"), 100, vec![skill("Rust", Proficiency::Expert)]))
            .collect();
        let mut req = request(&p, &resources, &[]);
        req.limit = 3;
        let report = SkillMatcher.rank(&req).await.unwrap();
        assert_eq!(report.candidates.len(), 3);
    }

    #[tokio::test]
    async fn test_project_without_requirements_gives_empty_report() {
        let p = project(None, None);
        let resources = vec![resource("Ada", 100, vec![skill("Rust", Proficiency::Expert)])];
        let report = SkillMatcher
            .rank(&request(&p, &resources, &[]))
            .await
            .unwrap();
        assert!(report.candidates.is_empty());
        assert!(report.recommendation.contains("no required skills"));
    }

    #[test]
    fn test_llm_candidates_must_be_known_with_valid_scores() {
        let p = staffed_project();
        let ada = resource("Ada", 100, vec![skill("Rust", Proficiency::Expert)]);
        let resources = vec![ada.clone()];
        let req = request(&p, &resources, &[]);

        let pick = |id: String, score: f64| LlmCandidate {
            resource_id: id,
            score,
            rationale: "fits".to_string(),
            matched_skills: vec!["Rust".to_string()],
            missing_skills: vec![],
        };

        let ok = accept_llm_candidates(&req, vec![pick(ada.id.to_string(), 91.4)]).unwrap();
        assert_eq!(ok[0].score, 91);
        assert_eq!(ok[0].free_capacity, 100);
        assert_eq!(ok[0].name, "Ada");

        assert!(accept_llm_candidates(&req, vec![pick(Uuid::new_v4().to_string(), 50.0)]).is_err());
        assert!(accept_llm_candidates(&req, vec![pick("ada".to_string(), 50.0)]).is_err());
        assert!(accept_llm_candidates(&req, vec![pick(ada.id.to_string(), 140.0)]).is_err());
    }

    #[test]
    fn test_matching_prompt_lists_requirements() {
        let p = staffed_project();
        let prompt = build_matching_prompt(&request(&p, &[], &[])).unwrap();
        assert!(prompt.contains("- Rust (advanced, required)"));
        assert!(prompt.contains("- Kafka (intermediate, nice_to_have)"));
        assert!(prompt.contains("at most 5 candidates"));
    }
}
