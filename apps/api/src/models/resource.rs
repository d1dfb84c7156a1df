use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::skill::{DocumentRef, Skill};
use super::text_enum;

/// A staffable profile: what someone can do and how much of their time is bookable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResourceRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub role_title: String,
    pub seniority: String,
    pub skills: Json<Vec<Skill>>,
    /// Share of a full working week this person can be booked for (0–100).
    pub availability_percent: i32,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub status: String,
    pub documents: Json<Vec<DocumentRef>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRow {
    pub fn is_unavailable(&self) -> bool {
        self.status == ResourceStatus::Unavailable.as_str()
    }
}

text_enum!(Seniority {
    Junior => "junior",
    Mid => "mid",
    Senior => "senior",
    Lead => "lead",
    Principal => "principal",
});

text_enum!(ResourceStatus {
    Available => "available",
    PartiallyAllocated => "partially_allocated",
    FullyAllocated => "fully_allocated",
    Unavailable => "unavailable",
});
