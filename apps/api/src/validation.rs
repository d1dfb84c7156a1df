//! Form validation shared by every create/update payload.
//!
//! Validators never stop at the first problem: a `Validator` collects every
//! failing field so the caller can show all of them at once.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Accumulates field errors for one payload.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
        self
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.push(field, format!("must be at most {max} characters"));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_valid_email(value) {
            self.push(field, "must be a valid email address");
        }
        self
    }

    pub fn optional_email(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            self.email(field, v);
        }
        self
    }

    pub fn range_i32(&mut self, field: &str, value: i32, min: i32, max: i32) -> &mut Self {
        if value < min || value > max {
            self.push(field, format!("must be between {min} and {max}"));
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: Option<f64>) -> &mut Self {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                self.push(field, "must be zero or a positive number");
            }
        }
        self
    }

    pub fn date_order(
        &mut self,
        field: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> &mut Self {
        if let (Some(s), Some(e)) = (start, end) {
            if e < s {
                self.push(field, "must not be before the start date");
            }
        }
        self
    }

    pub fn currency(&mut self, field: &str, value: &str) -> &mut Self {
        if value.len() != 3 || !value.chars().all(|c| c.is_ascii_uppercase()) {
            self.push(field, "must be a 3-letter ISO currency code");
        }
        self
    }

    /// Rejects empty names and case-insensitive duplicates.
    pub fn unique_names<'a>(
        &mut self,
        field: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> &mut Self {
        let mut seen = HashSet::new();
        for (i, name) in names.into_iter().enumerate() {
            let key = name.trim().to_lowercase();
            if key.is_empty() {
                self.push(&format!("{field}[{i}].name"), "is required");
            } else if !seen.insert(key) {
                self.push(
                    &format!("{field}[{i}].name"),
                    format!("'{}' is listed more than once", name.trim()),
                );
            }
        }
        self
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Converts the collected errors into a result.
    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidFields(self.errors))
        }
    }
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || local.len() > 64 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|l| {
            !l.is_empty()
                && !l.starts_with('-')
                && !l.ends_with('-')
                && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Lowercases and trims an email for storage and comparison.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trims an optional text field, mapping blank input to `None`.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_accepts_common_addresses() {
        assert!(is_valid_email("jane.doe@example.com"));
        assert!(is_valid_email("ops+alerts@sub.example.co.uk"));
    }

    #[test]
    fn test_email_rejects_malformed_input() {
        for bad in [
            "",
            "plainaddress",
            "@example.com",
            "jane@",
            "jane@example",
            "jane@@example.com",
            "jane doe@example.com",
            "jane@exa mple.com",
            "jane@-example.com",
            "jane@example..com",
        ] {
            assert!(!is_valid_email(bad), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_validator_collects_all_errors() {
        let mut v = Validator::new();
        v.required("name", "  ")
            .email("email", "nope")
            .range_i32("percent", 120, 1, 100);
        assert_eq!(v.errors().len(), 3);
        let err = v.finish().unwrap_err();
        assert!(matches!(err, AppError::InvalidFields(ref f) if f.len() == 3));
    }

    #[test]
    fn test_date_order_allows_same_day() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1);
        let mut v = Validator::new();
        v.date_order("end_date", d, d);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_date_order_rejects_end_before_start() {
        let mut v = Validator::new();
        v.date_order(
            "end_date",
            NaiveDate::from_ymd_opt(2024, 5, 2),
            NaiveDate::from_ymd_opt(2024, 5, 1),
        );
        assert_eq!(v.errors()[0].field, "end_date");
    }

    #[test]
    fn test_currency_code() {
        let mut v = Validator::new();
        v.currency("currency", "USD").currency("currency", "usd").currency("currency", "EURO");
        assert_eq!(v.errors().len(), 2);
    }

    #[test]
    fn test_unique_names_is_case_insensitive() {
        let mut v = Validator::new();
        v.unique_names("skills", ["Rust", "rust ", ""]);
        let fields: Vec<_> = v.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["skills[1].name", "skills[2].name"]);
    }

    #[test]
    fn test_non_negative_rejects_nan_and_negative() {
        let mut v = Validator::new();
        v.non_negative("budget", Some(-1.0))
            .non_negative("budget", Some(f64::NAN))
            .non_negative("budget", None)
            .non_negative("budget", Some(0.0));
        assert_eq!(v.errors().len(), 2);
    }

    #[test]
    fn test_clean_optional_maps_blank_to_none() {
        assert_eq!(clean_optional(Some("   ".to_string())), None);
        assert_eq!(clean_optional(Some(" x ".to_string())), Some("x".to_string()));
    }
}
