//! Skill-gap analysis: which of a project's required skills its team covers,
//! plus optional LLM recommendations for closing the gaps.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::intelligence::matching::SkillFit;
use crate::intelligence::prompts::{SKILL_GAP_PROMPT_TEMPLATE, SKILL_GAP_SYSTEM};
use crate::intelligence::tools::ResourceTools;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, TOOL_USE_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::allocation::AllocationRow;
use crate::models::project::{Importance, ProjectRow};
use crate::models::resource::ResourceRow;
use crate::models::skill::{find_skill, Proficiency};
use crate::models::text_enum;
use crate::staffing::load::Window;

const MAX_RECOMMENDATION_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Covered,
    UnderSkilled,
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillHolder {
    pub resource_id: Uuid,
    pub name: String,
    pub proficiency: Proficiency,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillCoverage {
    pub skill: String,
    pub min_proficiency: Proficiency,
    pub importance: Importance,
    pub coverage: Coverage,
    /// Team members holding the skill at any level, strongest first.
    pub holders: Vec<SkillHolder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamMember {
    pub resource_id: Uuid,
    pub name: String,
    pub role_title: String,
}

text_enum!(GapAction {
    Train => "train",
    Hire => "hire",
    Reassign => "reassign",
    Contract => "contract",
});

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub skill: String,
    pub action: GapAction,
    pub detail: String,
    pub resource_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillGapReport {
    pub project_id: Uuid,
    pub team: Vec<TeamMember>,
    pub skills: Vec<SkillCoverage>,
    pub coverage_score: u32, // 0 – 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub recommendations: Vec<Recommendation>,
}

impl SkillGapReport {
    pub fn gaps(&self) -> impl Iterator<Item = &SkillCoverage> {
        self.skills.iter().filter(|s| s.coverage != Coverage::Covered)
    }
}

/// Ids of everyone on the project: the listed team plus anyone allocated to it.
pub fn team_ids(project: &ProjectRow, allocations: &[AllocationRow]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    project
        .team
        .0
        .iter()
        .map(|t| t.resource_id)
        .chain(
            allocations
                .iter()
                .filter(|a| a.project_id == project.id)
                .map(|a| a.resource_id),
        )
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Classifies every required skill against `team` and scores the coverage.
///
/// coverage_score = Σ(weight × credit) / Σ(weight) × 100, where covered earns
/// full credit and under-skilled half. A project with no requirements scores 100.
pub fn analyze(project: &ProjectRow, team: &[ResourceRow]) -> SkillGapReport {
    let mut skills = Vec::new();
    let mut total_weight = 0.0;
    let mut earned = 0.0;

    for required in &project.required_skills.0 {
        let mut holders: Vec<SkillHolder> = team
            .iter()
            .filter_map(|r| {
                find_skill(&r.skills.0, &required.name).map(|s| SkillHolder {
                    resource_id: r.id,
                    name: r.name.clone(),
                    proficiency: s.proficiency,
                })
            })
            .collect();
        holders.sort_by(|a, b| {
            b.proficiency
                .cmp(&a.proficiency)
                .then_with(|| a.name.cmp(&b.name))
        });

        let best = team
            .iter()
            .map(|r| SkillFit::of(&r.skills.0, required))
            .max_by(|a, b| a.strength().total_cmp(&b.strength()))
            .unwrap_or(SkillFit::Absent);
        let coverage = match best {
            SkillFit::Full => Coverage::Covered,
            SkillFit::Partial => Coverage::UnderSkilled,
            SkillFit::Absent => Coverage::Missing,
        };

        total_weight += required.weight();
        earned += required.weight() * best.strength();
        skills.push(SkillCoverage {
            skill: required.name.clone(),
            min_proficiency: required.min_proficiency,
            importance: required.importance,
            coverage,
            holders,
        });
    }

    let coverage_score = if total_weight > 0.0 {
        (earned / total_weight * 100.0).round() as u32
    } else {
        100
    };

    SkillGapReport {
        project_id: project.id,
        team: team
            .iter()
            .map(|r| TeamMember {
                resource_id: r.id,
                name: r.name.clone(),
                role_title: r.role_title.clone(),
            })
            .collect(),
        skills,
        coverage_score,
        summary: None,
        recommendations: vec![],
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LLM recommendations
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LlmRecommendations {
    summary: String,
    recommendations: Vec<LlmRecommendation>,
}

#[derive(Debug, Deserialize)]
struct LlmRecommendation {
    skill: String,
    action: GapAction,
    detail: String,
    #[serde(default)]
    resource_id: Option<String>,
}

/// Asks the model how to close the report's gaps and stores its answer on the
/// report. With nothing missing, no call is made.
pub async fn recommend(
    llm: &LlmClient,
    pool: &PgPool,
    project: &ProjectRow,
    report: &mut SkillGapReport,
    company_resources: &[ResourceRow],
    window: Window,
) -> Result<(), AppError> {
    if report.gaps().next().is_none() {
        report.summary = Some("Every required skill is covered by the current team.".to_string());
        return Ok(());
    }

    let prompt = build_skill_gap_prompt(project, report)?;
    let tools = ResourceTools::new(pool.clone(), project.company_id, window, Some(project.id));

    for attempt in 0..=MAX_RECOMMENDATION_RETRIES {
        let answer: LlmRecommendations = llm
            .call_with_tools(&prompt, SKILL_GAP_SYSTEM, &tools)
            .await
            .map_err(|e| AppError::Llm(format!("Skill-gap LLM call failed: {e}")))?;

        match accept_recommendations(report, company_resources, answer.recommendations) {
            Ok(recommendations) => {
                info!(
                    "Skill-gap analysis for project {}: {} recommendations",
                    project.id,
                    recommendations.len()
                );
                report.summary = Some(answer.summary.trim().to_string());
                report.recommendations = recommendations;
                return Ok(());
            }
            Err(reason) => warn!(
                "Skill-gap attempt {}/{} rejected: {reason}, retrying",
                attempt + 1,
                MAX_RECOMMENDATION_RETRIES + 1
            ),
        }
    }

    Err(AppError::Llm(format!(
        "Skill-gap recommendations failed after {} attempts: the model kept naming \
        skills outside the gap list or unknown resources",
        MAX_RECOMMENDATION_RETRIES + 1
    )))
}

/// Every recommendation must target a gap skill, and any resource it names
/// must belong to the company.
fn accept_recommendations(
    report: &SkillGapReport,
    company_resources: &[ResourceRow],
    raw: Vec<LlmRecommendation>,
) -> Result<Vec<Recommendation>, String> {
    raw.into_iter()
        .map(|rec| {
            let gap = report
                .gaps()
                .find(|g| g.skill.eq_ignore_ascii_case(rec.skill.trim()))
                .ok_or_else(|| format!("'{}' is not one of the gaps", rec.skill))?;

            let resource_id = match rec.resource_id.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw_id) => {
                    let id: Uuid = raw_id
                        .parse()
                        .map_err(|_| format!("'{raw_id}' is not a resource id"))?;
                    if !company_resources.iter().any(|r| r.id == id) {
                        return Err(format!("resource {id} does not exist"));
                    }
                    Some(id)
                }
            };

            Ok(Recommendation {
                skill: gap.skill.clone(),
                action: rec.action,
                detail: rec.detail.trim().to_string(),
                resource_id,
            })
        })
        .collect()
}

fn build_skill_gap_prompt(project: &ProjectRow, report: &SkillGapReport) -> Result<String, AppError> {
    let project_json = serde_json::to_string_pretty(&serde_json::json!({
        "name": project.name,
        "description": project.description,
        "start_date": project.start_date,
        "end_date": project.end_date,
    }))
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize project: {e}")))?;

    let team = if report.team.is_empty() {
        "(nobody yet)".to_string()
    } else {
        report
            .team
            .iter()
            .map(|m| format!("- {} ({}), id {}", m.name, m.role_title, m.resource_id))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let gaps = report
        .gaps()
        .map(|g| {
            let status = match g.coverage {
                Coverage::UnderSkilled => "under_skilled",
                _ => "missing",
            };
            format!("- {} ({status}, needs {})", g.skill, g.min_proficiency)
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "{}\n\n{TOOL_USE_INSTRUCTION}\n\n{GROUNDING_INSTRUCTION}",
        SKILL_GAP_PROMPT_TEMPLATE
            .replace("{project}", &project_json)
            .replace("{team}", &team)
            .replace("{gaps}", &gaps)
    ))
}
