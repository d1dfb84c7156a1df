//! Resume skill extraction: document text, the LLM call, and merging results
//! into a resource's skill list.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::intelligence::prompts::{EXTRACTION_PROMPT_TEMPLATE, EXTRACTION_SYSTEM};
use crate::llm_client::prompts::GROUNDING_INSTRUCTION;
use crate::llm_client::LlmClient;
use crate::models::skill::{Proficiency, Skill};

pub const MIN_TEXT_CHARS: usize = 20;
pub const MAX_TEXT_CHARS: usize = 60_000;
const MAX_YEARS: f32 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSkill {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub proficiency: Proficiency,
    #[serde(default)]
    pub years_experience: Option<f32>,
    #[serde(default)]
    pub evidence: Option<String>,
}

impl ExtractedSkill {
    fn strength(&self) -> (Proficiency, f32) {
        (self.proficiency, self.years_experience.unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillExtraction {
    pub skills: Vec<ExtractedSkill>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub suggested_role_title: Option<String>,
    #[serde(default)]
    pub total_years_experience: Option<f32>,
}

fn clamp_years(years: Option<f32>) -> Option<f32> {
    years
        .filter(|y| y.is_finite())
        .map(|y| y.clamp(0.0, MAX_YEARS))
}

impl SkillExtraction {
    /// Trims names, drops blank ones, clamps years and collapses
    /// case-insensitive duplicates onto their strongest entry.
    pub fn sanitized(self) -> Self {
        let mut skills: Vec<ExtractedSkill> = Vec::new();
        for mut skill in self.skills {
            skill.name = skill.name.trim().to_string();
            if skill.name.is_empty() {
                continue;
            }
            skill.years_experience = clamp_years(skill.years_experience);
            skill.category = skill.category.filter(|c| !c.trim().is_empty());

            match skills
                .iter_mut()
                .find(|s| s.name.eq_ignore_ascii_case(&skill.name))
            {
                Some(existing) => {
                    if skill.strength() > existing.strength() {
                        *existing = skill;
                    }
                }
                None => skills.push(skill),
            }
        }

        Self {
            skills,
            summary: self.summary.trim().to_string(),
            suggested_role_title: self
                .suggested_role_title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            total_years_experience: clamp_years(self.total_years_experience),
        }
    }
}

pub fn check_text_length(text: &str) -> Result<(), AppError> {
    let len = text.trim().chars().count();
    if !(MIN_TEXT_CHARS..=MAX_TEXT_CHARS).contains(&len) {
        return Err(AppError::Validation(format!(
            "Resume text must be between {MIN_TEXT_CHARS} and {MAX_TEXT_CHARS} characters (got {len})"
        )));
    }
    Ok(())
}

/// Turns a stored document into plain text. PDF and plain text only.
pub async fn document_text(content_type: &str, data: Vec<u8>) -> Result<String, AppError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => {
            let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?
                .map_err(|e| AppError::UnprocessableEntity(format!("Could not read PDF: {e}")))?;
            Ok(text)
        }
        "text/plain" | "text/markdown" => String::from_utf8(data)
            .map_err(|_| AppError::UnprocessableEntity("Document is not valid UTF-8 text".to_string())),
        other => Err(AppError::Validation(format!(
            "Skills can only be extracted from PDF or plain-text documents, not {other}"
        ))),
    }
}

fn build_extraction_prompt(text: &str) -> String {
    format!(
        "{}\n\n{GROUNDING_INSTRUCTION}",
        EXTRACTION_PROMPT_TEMPLATE.replace("{resume_text}", text.trim())
    )
}

pub async fn extract_skills(llm: &LlmClient, text: &str) -> Result<SkillExtraction, AppError> {
    check_text_length(text)?;
    let raw: SkillExtraction = llm
        .call_json(&build_extraction_prompt(text), EXTRACTION_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Skill extraction failed: {e}")))?;
    let extraction = raw.sanitized();
    info!("Extracted {} skills from resume text", extraction.skills.len());
    Ok(extraction)
}

/// Folds extracted skills into an existing list. Matching names keep the
/// higher proficiency and the larger years value; new skills are appended.
pub fn merge_skills(existing: &[Skill], extracted: &[ExtractedSkill]) -> Vec<Skill> {
    let mut merged = existing.to_vec();
    for found in extracted {
        match merged.iter_mut().find(|s| s.matches(&found.name)) {
            Some(skill) => {
                skill.proficiency = skill.proficiency.max(found.proficiency);
                skill.years_experience = match (skill.years_experience, found.years_experience) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                if skill.category.is_none() {
                    skill.category = found.category.clone();
                }
            }
            None => merged.push(Skill {
                name: found.name.clone(),
                category: found.category.clone(),
                proficiency: found.proficiency,
                years_experience: found.years_experience,
            }),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(name: &str, proficiency: Proficiency, years: Option<f32>) -> ExtractedSkill {
        ExtractedSkill {
            name: name.to_string(),
            category: None,
            proficiency,
            years_experience: years,
            evidence: None,
        }
    }

    #[test]
    fn test_sanitize_dedupes_keeping_strongest() {
        let raw = SkillExtraction {
            skills: vec![
                extracted(" rust ", Proficiency::Intermediate, Some(2.0)),
                extracted("", Proficiency::Expert, None),
                extracted("Rust", Proficiency::Expert, Some(5.0)),
                extracted("Go", Proficiency::Beginner, Some(90.0)),
                extracted("RUST", Proficiency::Advanced, Some(9.0)),
            ],
            summary: "  Systems engineer ".to_string(),
            suggested_role_title: Some("  ".to_string()),
            total_years_experience: Some(-3.0),
        };
        let clean = raw.sanitized();

        assert_eq!(clean.skills.len(), 2);
        assert_eq!(clean.skills[0].name, "Rust");
        assert_eq!(clean.skills[0].proficiency, Proficiency::Expert);
        assert_eq!(clean.skills[1].years_experience, Some(60.0));
        assert_eq!(clean.summary, "Systems engineer");
        assert_eq!(clean.suggested_role_title, None);
        assert_eq!(clean.total_years_experience, Some(0.0));
    }

    #[test]
    fn test_equal_proficiency_prefers_more_years() {
        let clean = SkillExtraction {
            skills: vec![
                extracted("SQL", Proficiency::Advanced, Some(3.0)),
                extracted("sql", Proficiency::Advanced, Some(6.0)),
            ],
            summary: String::new(),
            suggested_role_title: None,
            total_years_experience: None,
        }
        .sanitized();
        assert_eq!(clean.skills.len(), 1);
        assert_eq!(clean.skills[0].years_experience, Some(6.0));
    }

    #[test]
    fn test_merge_keeps_stronger_values_and_appends_new() {
        let existing = vec![
            Skill {
                name: "Rust".to_string(),
                category: Some("Languages".to_string()),
                proficiency: Proficiency::Expert,
                years_experience: Some(2.0),
            },
            Skill {
                name: "Docker".to_string(),
                category: None,
                proficiency: Proficiency::Beginner,
                years_experience: None,
            },
        ];
        let found = vec![
            extracted("rust", Proficiency::Intermediate, Some(6.0)),
            extracted("docker", Proficiency::Advanced, Some(1.0)),
            extracted("Terraform", Proficiency::Intermediate, None),
        ];
        let merged = merge_skills(&existing, &found);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].name, "Rust");
        assert_eq!(merged[0].proficiency, Proficiency::Expert);
        assert_eq!(merged[0].years_experience, Some(6.0));
        assert_eq!(merged[1].proficiency, Proficiency::Advanced);
        assert_eq!(merged[1].years_experience, Some(1.0));
        assert_eq!(merged[2].name, "Terraform");
    }

    #[test]
    fn test_text_length_bounds() {
        assert!(check_text_length("too short").is_err());
        assert!(check_text_length(&"a".repeat(MIN_TEXT_CHARS)).is_ok());
        assert!(check_text_length(&"a".repeat(MAX_TEXT_CHARS + 1)).is_err());
    }

    #[tokio::test]
    async fn test_document_text_accepts_plain_text_only() {
        let text = document_text("text/plain; charset=utf-8", b"Rust developer".to_vec())
            .await
            .unwrap();
        assert_eq!(text, "Rust developer");

        let err = document_text("image/png", vec![0x89, 0x50]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_prompt_embeds_resume_text() {
        let prompt = build_extraction_prompt("  Ten years of Kotlin.  ");
        assert!(prompt.contains("RESUME:\nTen years of Kotlin."));
        assert!(!prompt.contains("{resume_text}"));
    }
}
