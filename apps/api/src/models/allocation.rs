use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A booking of part of a resource's time on a project, inclusive of both dates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllocationRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub resource_id: Uuid,
    pub project_id: Uuid,
    pub percent: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub role: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AllocationRow {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}
