//! Booking arithmetic over allocations: peak load in a window, free capacity,
//! utilization labels and the advisory warnings returned when booking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::allocation::AllocationRow;
use crate::models::project::ProjectRow;
use crate::models::resource::ResourceRow;

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The project's dates, open ends filled in: a missing start means `today`
    /// (or the end date, if that is earlier); a missing end is unbounded.
    pub fn for_project(project: &ProjectRow, today: NaiveDate) -> Self {
        let end = project.end_date.unwrap_or(NaiveDate::MAX);
        let start = project.start_date.unwrap_or_else(|| today.min(end));
        Self { start, end }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }
}

/// Highest combined percentage booked on any single day of `window`.
///
/// The peak always falls on the first day of some allocation (clipped to the
/// window), so only those days are checked.
pub fn peak_load<'a>(
    allocations: impl IntoIterator<Item = &'a AllocationRow>,
    window: Window,
) -> i32 {
    let in_window: Vec<&AllocationRow> = allocations
        .into_iter()
        .filter(|a| a.overlaps(window.start, window.end))
        .collect();

    in_window
        .iter()
        .map(|a| a.start_date.max(window.start))
        .map(|day| {
            in_window
                .iter()
                .filter(|a| a.covers(day))
                .map(|a| a.percent)
                .sum::<i32>()
        })
        .max()
        .unwrap_or(0)
}

/// Percentage of the resource still bookable across `window`, ignoring
/// allocations on `exclude_project`. Never negative.
pub fn free_capacity(
    resource: &ResourceRow,
    allocations: &[AllocationRow],
    window: Window,
    exclude_project: Option<Uuid>,
) -> i32 {
    let booked = peak_load(
        allocations
            .iter()
            .filter(|a| a.resource_id == resource.id)
            .filter(|a| Some(a.project_id) != exclude_project),
        window,
    );
    (resource.availability_percent - booked).max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationStatus {
    Available,
    PartiallyAllocated,
    FullyAllocated,
    OverAllocated,
    Unavailable,
}

impl UtilizationStatus {
    pub fn classify(resource: &ResourceRow, allocated: i32) -> Self {
        if allocated == 0 && (resource.is_unavailable() || resource.availability_percent == 0) {
            return UtilizationStatus::Unavailable;
        }
        if allocated > resource.availability_percent {
            UtilizationStatus::OverAllocated
        } else if allocated == 0 {
            UtilizationStatus::Available
        } else if allocated == resource.availability_percent {
            UtilizationStatus::FullyAllocated
        } else {
            UtilizationStatus::PartiallyAllocated
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceUtilization {
    pub resource_id: Uuid,
    pub name: String,
    pub availability_percent: i32,
    pub allocated_percent: i32,
    pub free_percent: i32,
    pub status: UtilizationStatus,
    pub allocation_ids: Vec<Uuid>,
}

/// Per-resource load on `date`, in the order the resources were given.
pub fn utilization_on(
    resources: &[ResourceRow],
    allocations: &[AllocationRow],
    date: NaiveDate,
) -> Vec<ResourceUtilization> {
    resources
        .iter()
        .map(|r| {
            let active: Vec<&AllocationRow> = allocations
                .iter()
                .filter(|a| a.resource_id == r.id && a.covers(date))
                .collect();
            let allocated: i32 = active.iter().map(|a| a.percent).sum();
            ResourceUtilization {
                resource_id: r.id,
                name: r.name.clone(),
                availability_percent: r.availability_percent,
                allocated_percent: allocated,
                free_percent: (r.availability_percent - allocated).max(0),
                status: UtilizationStatus::classify(r, allocated),
                allocation_ids: active.iter().map(|a| a.id).collect(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    OverAllocation,
    ExceedsAvailability,
    OutsideProjectDates,
    DuplicateAllocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Advisory,
    Warning,
}

/// A non-blocking problem with a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationWarning {
    pub kind: WarningKind,
    pub severity: WarningSeverity,
    pub message: String,
    pub related_allocation_ids: Vec<Uuid>,
}

/// The booking being checked.
#[derive(Debug, Clone, Copy)]
pub struct Booking {
    /// Set when an existing allocation is being edited, so it is not compared with itself.
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    pub percent: i32,
    pub window: Window,
}

/// Checks a booking against the resource's other allocations and the project dates.
pub fn check_booking(
    booking: &Booking,
    resource: &ResourceRow,
    project: &ProjectRow,
    existing: &[AllocationRow],
) -> Vec<AllocationWarning> {
    let mut warnings = Vec::new();
    let window = booking.window;

    let overlapping: Vec<&AllocationRow> = existing
        .iter()
        .filter(|a| a.resource_id == resource.id)
        .filter(|a| Some(a.id) != booking.id)
        .filter(|a| a.overlaps(window.start, window.end))
        .collect();
    let overlapping_ids: Vec<Uuid> = overlapping.iter().map(|a| a.id).collect();

    let peak = peak_load(overlapping.iter().copied(), window) + booking.percent;
    if peak > 100 {
        warnings.push(AllocationWarning {
            kind: WarningKind::OverAllocation,
            severity: WarningSeverity::Warning,
            message: format!(
                "{} would be booked at {peak}% during this period",
                resource.name
            ),
            related_allocation_ids: overlapping_ids.clone(),
        });
    } else if peak > resource.availability_percent {
        warnings.push(AllocationWarning {
            kind: WarningKind::ExceedsAvailability,
            severity: WarningSeverity::Advisory,
            message: format!(
                "{} is available for {}% but would be booked at {peak}%",
                resource.name, resource.availability_percent
            ),
            related_allocation_ids: overlapping_ids.clone(),
        });
    }

    let starts_early = project.start_date.is_some_and(|s| window.start < s);
    let ends_late = project.end_date.is_some_and(|e| window.end > e);
    if starts_early || ends_late {
        warnings.push(AllocationWarning {
            kind: WarningKind::OutsideProjectDates,
            severity: WarningSeverity::Advisory,
            message: format!(
                "Allocation runs {} to {}, outside the dates of project {}",
                window.start, window.end, project.name
            ),
            related_allocation_ids: Vec::new(),
        });
    }

    let duplicates: Vec<Uuid> = overlapping
        .iter()
        .filter(|a| a.project_id == booking.project_id)
        .map(|a| a.id)
        .collect();
    if !duplicates.is_empty() {
        warnings.push(AllocationWarning {
            kind: WarningKind::DuplicateAllocation,
            severity: WarningSeverity::Warning,
            message: format!(
                "{} already has an overlapping allocation on project {}",
                resource.name, project.name
            ),
            related_allocation_ids: duplicates,
        });
    }

    warnings
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    use crate::staffing::resources::tests::resource;

    pub(crate) fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    pub(crate) fn alloc(
        resource_id: Uuid,
        project_id: Uuid,
        percent: i32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AllocationRow {
        let now = Utc::now();
        AllocationRow {
            id: Uuid::new_v4(),
            company_id: Uuid::nil(),
            resource_id,
            project_id,
            percent,
            start_date: start,
            end_date: end,
            role: None,
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn project(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ProjectRow {
        let now = Utc::now();
        ProjectRow {
            id: Uuid::new_v4(),
            company_id: Uuid::nil(),
            client_id: None,
            name: "Apollo".to_string(),
            description: None,
            status: "active".to_string(),
            start_date: start,
            end_date: end,
            budget: None,
            required_skills: Json(Vec::new()),
            team: Json(Vec::new()),
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_peak_load_sums_only_simultaneous_bookings() {
        let r = Uuid::new_v4();
        let p = Uuid::new_v4();
        let allocations = vec![
            alloc(r, p, 50, d(2024, 1, 1), d(2024, 1, 31)),
            alloc(r, p, 40, d(2024, 2, 1), d(2024, 2, 28)),
            alloc(r, p, 30, d(2024, 1, 20), d(2024, 2, 10)),
        ];
        let window = Window::new(d(2024, 1, 1), d(2024, 3, 1));
        assert_eq!(peak_load(&allocations, window), 80);
        assert_eq!(peak_load(&allocations, Window::day(d(2024, 1, 5))), 50);
        assert_eq!(peak_load(&allocations, Window::day(d(2024, 6, 1))), 0);
    }

    #[test]
    fn test_peak_load_counts_bookings_starting_before_window() {
        let r = Uuid::new_v4();
        let p = Uuid::new_v4();
        let allocations = vec![
            alloc(r, p, 60, d(2023, 12, 1), d(2024, 1, 15)),
            alloc(r, p, 20, d(2023, 11, 1), d(2024, 1, 10)),
        ];
        assert_eq!(peak_load(&allocations, Window::new(d(2024, 1, 1), d(2024, 1, 31))), 80);
    }

    #[test]
    fn test_free_capacity_ignores_excluded_project_and_floors_at_zero() {
        let res = resource("Kim", 80, Vec::new());
        let target = Uuid::new_v4();
        let other = Uuid::new_v4();
        let allocations = vec![
            alloc(res.id, other, 50, d(2024, 1, 1), d(2024, 12, 31)),
            alloc(res.id, target, 30, d(2024, 1, 1), d(2024, 12, 31)),
            alloc(Uuid::new_v4(), other, 100, d(2024, 1, 1), d(2024, 12, 31)),
        ];
        let window = Window::new(d(2024, 3, 1), d(2024, 4, 1));
        assert_eq!(free_capacity(&res, &allocations, window, Some(target)), 30);
        assert_eq!(free_capacity(&res, &allocations, window, None), 0);
    }

    #[test]
    fn test_utilization_labels() {
        let mut res = resource("Kim", 80, Vec::new());
        assert_eq!(UtilizationStatus::classify(&res, 0), UtilizationStatus::Available);
        assert_eq!(
            UtilizationStatus::classify(&res, 40),
            UtilizationStatus::PartiallyAllocated
        );
        assert_eq!(
            UtilizationStatus::classify(&res, 80),
            UtilizationStatus::FullyAllocated
        );
        assert_eq!(
            UtilizationStatus::classify(&res, 90),
            UtilizationStatus::OverAllocated
        );
        res.status = "unavailable".to_string();
        assert_eq!(UtilizationStatus::classify(&res, 0), UtilizationStatus::Unavailable);
    }

    #[test]
    fn test_utilization_on_date() {
        let res = resource("Kim", 100, Vec::new());
        let p = Uuid::new_v4();
        let allocations = vec![
            alloc(res.id, p, 60, d(2024, 1, 1), d(2024, 1, 31)),
            alloc(res.id, p, 60, d(2024, 1, 15), d(2024, 2, 15)),
        ];
        let report = utilization_on(std::slice::from_ref(&res), &allocations, d(2024, 1, 20));
        assert_eq!(report[0].allocated_percent, 120);
        assert_eq!(report[0].free_percent, 0);
        assert_eq!(report[0].status, UtilizationStatus::OverAllocated);
        assert_eq!(report[0].allocation_ids.len(), 2);
    }

    #[test]
    fn test_booking_over_hundred_percent_warns() {
        let res = resource("Kim", 100, Vec::new());
        let proj = project(None, None);
        let existing = vec![alloc(res.id, Uuid::new_v4(), 70, d(2024, 1, 1), d(2024, 1, 31))];
        let booking = Booking {
            id: None,
            project_id: proj.id,
            percent: 50,
            window: Window::new(d(2024, 1, 20), d(2024, 2, 20)),
        };
        let warnings = check_booking(&booking, &res, &proj, &existing);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::OverAllocation);
        assert_eq!(warnings[0].related_allocation_ids, vec![existing[0].id]);
    }

    #[test]
    fn test_booking_above_availability_is_advisory() {
        let res = resource("Kim", 50, Vec::new());
        let proj = project(None, None);
        let booking = Booking {
            id: None,
            project_id: proj.id,
            percent: 60,
            window: Window::new(d(2024, 1, 1), d(2024, 1, 31)),
        };
        let warnings = check_booking(&booking, &res, &proj, &[]);
        assert_eq!(warnings[0].kind, WarningKind::ExceedsAvailability);
        assert_eq!(warnings[0].severity, WarningSeverity::Advisory);
    }

    #[test]
    fn test_booking_outside_project_dates_and_duplicate() {
        let res = resource("Kim", 100, Vec::new());
        let proj = project(Some(d(2024, 2, 1)), Some(d(2024, 3, 31)));
        let existing = vec![alloc(res.id, proj.id, 20, d(2024, 2, 1), d(2024, 2, 28))];
        let booking = Booking {
            id: None,
            project_id: proj.id,
            percent: 20,
            window: Window::new(d(2024, 1, 15), d(2024, 2, 15)),
        };
        let kinds: Vec<WarningKind> = check_booking(&booking, &res, &proj, &existing)
            .into_iter()
            .map(|w| w.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![WarningKind::OutsideProjectDates, WarningKind::DuplicateAllocation]
        );
    }

    #[test]
    fn test_editing_a_booking_does_not_compare_with_itself() {
        let res = resource("Kim", 100, Vec::new());
        let proj = project(None, None);
        let existing = vec![alloc(res.id, proj.id, 80, d(2024, 1, 1), d(2024, 1, 31))];
        let booking = Booking {
            id: Some(existing[0].id),
            project_id: proj.id,
            percent: 90,
            window: Window::new(d(2024, 1, 1), d(2024, 1, 31)),
        };
        assert!(check_booking(&booking, &res, &proj, &existing).is_empty());
    }

    #[test]
    fn test_project_window_fills_open_ends() {
        let today = d(2024, 5, 1);
        let w = Window::for_project(&project(None, None), today);
        assert_eq!(w.start, today);
        assert_eq!(w.end, NaiveDate::MAX);
        let w = Window::for_project(&project(None, Some(d(2024, 1, 1))), today);
        assert_eq!(w.start, d(2024, 1, 1));
    }
}
