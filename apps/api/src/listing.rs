//! Search, filter and sort for list endpoints.
//!
//! Tenants are small enough that a list endpoint loads the tenant's rows and
//! shapes them in memory.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::skill::Skill;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    /// Case-insensitive substring matched against the entity's search fields.
    pub q: Option<String>,
    pub status: Option<String>,
    /// Only rows holding this skill (entities without skills ignore it).
    pub skill: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A comparable value pulled out of a row for sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Text(String),
    Number(f64),
    Date(Option<NaiveDate>),
    Time(DateTime<Utc>),
}

impl SortKey {
    pub fn text(value: &str) -> Self {
        SortKey::Text(value.to_lowercase())
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            // Missing dates sort last in ascending order.
            (SortKey::Date(a), SortKey::Date(b)) => match (a, b) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

pub trait Listable {
    const SORT_FIELDS: &'static [&'static str];
    const DEFAULT_SORT: &'static str;

    fn search_fields(&self) -> Vec<&str>;
    fn status(&self) -> &str;
    fn sort_key(&self, field: &str) -> SortKey;

    fn skills(&self) -> Option<&[Skill]> {
        None
    }
}

/// Applies search, status/skill filters and a stable sort.
pub fn apply<T: Listable>(items: Vec<T>, params: &ListParams) -> Result<Vec<T>, AppError> {
    let sort_field = params.sort.as_deref().unwrap_or(T::DEFAULT_SORT);
    if !T::SORT_FIELDS.contains(&sort_field) {
        return Err(AppError::Validation(format!(
            "Cannot sort by '{sort_field}'. Allowed: {}",
            T::SORT_FIELDS.join(", ")
        )));
    }

    let needle = params
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());
    let status = params.status.as_deref().filter(|s| !s.is_empty());
    let skill = params
        .skill
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut filtered: Vec<T> = items
        .into_iter()
        .filter(|item| match &needle {
            Some(n) => item
                .search_fields()
                .iter()
                .any(|f| f.to_lowercase().contains(n.as_str())),
            None => true,
        })
        .filter(|item| status.map_or(true, |s| item.status() == s))
        .filter(|item| match (skill, item.skills()) {
            (Some(wanted), Some(skills)) => skills.iter().any(|s| s.matches(wanted)),
            _ => true,
        })
        .collect();

    let descending = params.order.unwrap_or_default() == SortOrder::Desc;
    filtered.sort_by(|a, b| {
        let ord = a.sort_key(sort_field).compare(&b.sort_key(sort_field));
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::skill::Proficiency;

    #[derive(Debug, Clone)]
    struct Row {
        name: &'static str,
        status: &'static str,
        rate: f64,
        start: Option<NaiveDate>,
        skills: Vec<Skill>,
    }

    impl Listable for Row {
        const SORT_FIELDS: &'static [&'static str] = &["name", "rate", "start"];
        const DEFAULT_SORT: &'static str = "name";

        fn search_fields(&self) -> Vec<&str> {
            vec![self.name]
        }
        fn status(&self) -> &str {
            self.status
        }
        fn sort_key(&self, field: &str) -> SortKey {
            match field {
                "rate" => SortKey::Number(self.rate),
                "start" => SortKey::Date(self.start),
                _ => SortKey::text(self.name),
            }
        }
        fn skills(&self) -> Option<&[Skill]> {
            Some(&self.skills)
        }
    }

    fn row(name: &'static str, status: &'static str, rate: f64, skill: &str) -> Row {
        Row {
            name,
            status,
            rate,
            start: None,
            skills: vec![Skill {
                name: skill.to_string(),
                category: None,
                proficiency: Proficiency::Advanced,
                years_experience: None,
            }],
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            row("Carla", "available", 120.0, "Rust"),
            row("alan", "unavailable", 90.0, "Go"),
            row("Bea", "available", 150.0, "rust"),
        ]
    }

    fn names(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_default_sort_is_case_insensitive_name() {
        let out = apply(rows(), &ListParams::default()).unwrap();
        assert_eq!(names(&out), vec!["alan", "Bea", "Carla"]);
    }

    #[test]
    fn test_search_matches_substring_ignoring_case() {
        let params = ListParams {
            q: Some("  CAR ".to_string()),
            ..Default::default()
        };
        assert_eq!(names(&apply(rows(), &params).unwrap()), vec!["Carla"]);
    }

    #[test]
    fn test_status_and_skill_filters_combine() {
        let params = ListParams {
            status: Some("available".to_string()),
            skill: Some("RUST".to_string()),
            ..Default::default()
        };
        assert_eq!(names(&apply(rows(), &params).unwrap()), vec!["Bea", "Carla"]);
    }

    #[test]
    fn test_numeric_sort_descending() {
        let params = ListParams {
            sort: Some("rate".to_string()),
            order: Some(SortOrder::Desc),
            ..Default::default()
        };
        assert_eq!(names(&apply(rows(), &params).unwrap()), vec!["Bea", "Carla", "alan"]);
    }

    #[test]
    fn test_missing_dates_sort_last() {
        let mut data = rows();
        data[1].start = NaiveDate::from_ymd_opt(2024, 1, 1);
        let params = ListParams {
            sort: Some("start".to_string()),
            ..Default::default()
        };
        let out = apply(data, &params).unwrap();
        assert_eq!(out[0].name, "alan");
    }

    #[test]
    fn test_unknown_sort_field_is_rejected() {
        let params = ListParams {
            sort: Some("salary".to_string()),
            ..Default::default()
        };
        assert!(matches!(apply(rows(), &params), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let data = vec![
            row("Same", "available", 1.0, "A"),
            row("same", "unavailable", 2.0, "B"),
        ];
        let out = apply(data, &ListParams::default()).unwrap();
        assert_eq!(out[0].status, "available");
    }
}
