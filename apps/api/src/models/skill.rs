use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

text_enum!(
    /// Ordered from weakest to strongest; comparisons follow declaration order.
    #[derive(PartialOrd, Ord)]
    Proficiency {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
);

impl Default for Proficiency {
    fn default() -> Self {
        Proficiency::Intermediate
    }
}

/// A skill held by an employee or resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub proficiency: Proficiency,
    #[serde(default)]
    pub years_experience: Option<f32>,
}

impl Skill {
    pub fn matches(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

text_enum!(DocumentKind {
    Resume => "resume",
    Contract => "contract",
    Certification => "certification",
    Other => "other",
});

/// Metadata for a file held in object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: Uuid,
    pub name: String,
    pub kind: DocumentKind,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub uploaded_by: Option<Uuid>,
}

/// Finds a skill by case-insensitive name.
pub fn find_skill<'a>(skills: &'a [Skill], name: &str) -> Option<&'a Skill> {
    skills.iter().find(|s| s.matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proficiency_ordering() {
        assert!(Proficiency::Beginner < Proficiency::Intermediate);
        assert!(Proficiency::Advanced < Proficiency::Expert);
        assert_eq!(
            Proficiency::ALL.iter().max(),
            Some(&Proficiency::Expert)
        );
    }

    #[test]
    fn test_find_skill_ignores_case_and_whitespace() {
        let skills = vec![Skill {
            name: "PostgreSQL".to_string(),
            category: None,
            proficiency: Proficiency::Advanced,
            years_experience: Some(4.0),
        }];
        assert!(find_skill(&skills, " postgresql").is_some());
        assert!(find_skill(&skills, "mysql").is_none());
    }

    #[test]
    fn test_skill_deserializes_without_optional_fields() {
        let skill: Skill =
            serde_json::from_str(r#"{"name": "Rust", "proficiency": "expert"}"#).unwrap();
        assert_eq!(skill.proficiency, Proficiency::Expert);
        assert!(skill.category.is_none());
    }
}
