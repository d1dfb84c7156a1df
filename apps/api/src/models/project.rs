use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::skill::Proficiency;
use super::text_enum;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub client_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub required_skills: Json<Vec<RequiredSkill>>,
    pub team: Json<Vec<TeamAssignment>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredSkill {
    pub name: String,
    #[serde(default)]
    pub min_proficiency: Proficiency,
    #[serde(default)]
    pub importance: Importance,
}

impl RequiredSkill {
    pub fn weight(&self) -> f64 {
        match self.importance {
            Importance::Required => 1.0,
            Importance::NiceToHave => 0.5,
        }
    }
}

text_enum!(Importance {
    Required => "required",
    NiceToHave => "nice_to_have",
});

impl Default for Importance {
    fn default() -> Self {
        Importance::Required
    }
}

/// A resource listed on the project team. References are not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAssignment {
    pub resource_id: Uuid,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub allocation_percent: Option<i32>,
}

text_enum!(ProjectStatus {
    Planning => "planning",
    Active => "active",
    OnHold => "on_hold",
    Completed => "completed",
    Cancelled => "cancelled",
});
