use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::skill::{DocumentRef, Skill};
use super::text_enum;

/// HR record for a person employed or contracted by the tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmployeeRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub job_title: String,
    pub department: Option<String>,
    pub employment_type: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Cleared before responding to callers who may not see pay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation: Option<Json<Compensation>>,
    pub skills: Json<Vec<Skill>>,
    pub documents: Json<Vec<DocumentRef>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    pub amount: f64,
    pub currency: String,
    pub period: PayPeriod,
}

text_enum!(PayPeriod {
    Annual => "annual",
    Monthly => "monthly",
    Hourly => "hourly",
});

text_enum!(EmploymentType {
    FullTime => "full_time",
    PartTime => "part_time",
    Contractor => "contractor",
});

text_enum!(EmployeeStatus {
    Active => "active",
    OnLeave => "on_leave",
    Terminated => "terminated",
});
