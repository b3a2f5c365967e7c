//! Pure derivations over the merged technology list.
//!
//! Everything here is recomputed from a `&[Technology]` on demand; nothing is
//! cached between calls.

use chrono::{DateTime, NaiveTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{Status, StatusParseError, Technology};

pub const DEFAULT_UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StatsError {
    #[error("every item is already completed")]
    NoRemainingItems,
}

//
// ─── COUNTS ────────────────────────────────────────────────────────────────────
//

/// Per-status counts. The three buckets always sum to `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
}

impl ProgressStats {
    #[must_use]
    pub fn from_technologies(technologies: &[Technology]) -> Self {
        technologies
            .iter()
            .fold(Self::default(), |mut stats, tech| {
                stats.total += 1;
                match tech.status {
                    Status::Completed => stats.completed += 1,
                    Status::InProgress => stats.in_progress += 1,
                    Status::NotStarted => stats.not_started += 1,
                }
                stats
            })
    }

    /// Rounded completion percentage, 0 for an empty roadmap.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let rounded = (self.completed * 200 + self.total) / (self.total * 2);
        u8::try_from(rounded.min(100)).unwrap_or(100)
    }
}

#[must_use]
pub fn progress_percent(technologies: &[Technology]) -> u8 {
    ProgressStats::from_technologies(technologies).percent()
}

//
// ─── DEADLINES ─────────────────────────────────────────────────────────────────
//

/// An unfinished item whose deadline (midnight UTC of that date) is before `now`.
#[must_use]
pub fn is_overdue(tech: &Technology, now: DateTime<Utc>) -> bool {
    match tech.deadline {
        Some(deadline) if !tech.status.is_completed() => {
            deadline.and_time(NaiveTime::MIN).and_utc() < now
        }
        _ => false,
    }
}

#[must_use]
pub fn overdue(technologies: &[Technology], now: DateTime<Utc>) -> Vec<Technology> {
    technologies
        .iter()
        .filter(|tech| is_overdue(tech, now))
        .cloned()
        .collect()
}

/// Unfinished items with a deadline, earliest first, at most `limit`.
///
/// Equal deadlines keep roadmap order.
#[must_use]
pub fn upcoming_deadlines(technologies: &[Technology], limit: usize) -> Vec<Technology> {
    let mut upcoming: Vec<Technology> = technologies
        .iter()
        .filter(|tech| tech.deadline.is_some() && !tech.status.is_completed())
        .cloned()
        .collect();
    upcoming.sort_by_key(|tech| tech.deadline);
    upcoming.truncate(limit);
    upcoming
}

//
// ─── FILTERS ───────────────────────────────────────────────────────────────────
//

/// Case-insensitive substring match on title or description.
///
/// `None` or an empty query returns everything.
#[must_use]
pub fn search(technologies: &[Technology], query: Option<&str>) -> Vec<Technology> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return technologies.to_vec();
    };
    let needle = query.to_lowercase();
    technologies
        .iter()
        .filter(|tech| {
            tech.title.to_lowercase().contains(&needle)
                || tech.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

#[must_use]
pub fn filter_by_status(technologies: &[Technology], status: Status) -> Vec<Technology> {
    technologies
        .iter()
        .filter(|tech| tech.status == status)
        .cloned()
        .collect()
}

/// Status selector of the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Status(Status),
    Overdue,
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Status(status) => fmt::Display::fmt(status, f),
            StatusFilter::Overdue => f.write_str("overdue"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatusFilter::All),
            "overdue" => Ok(StatusFilter::Overdue),
            other => other.parse().map(StatusFilter::Status),
        }
    }
}

/// Status filter combined with a free-text search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TechnologyQuery {
    pub filter: StatusFilter,
    pub search: Option<String>,
}

impl TechnologyQuery {
    #[must_use]
    pub fn apply(&self, technologies: &[Technology], now: DateTime<Utc>) -> Vec<Technology> {
        let filtered = match self.filter {
            StatusFilter::All => technologies.to_vec(),
            StatusFilter::Status(status) => filter_by_status(technologies, status),
            StatusFilter::Overdue => overdue(technologies, now),
        };
        // Whitespace-only input means "no search".
        let query = self.search.as_deref().filter(|q| !q.trim().is_empty());
        search(&filtered, query)
    }
}

//
// ─── RANDOM PICK ───────────────────────────────────────────────────────────────
//

/// Uniformly pick one item that is not completed.
///
/// # Errors
///
/// Returns `StatsError::NoRemainingItems` when every item is completed or
/// the list is empty.
pub fn random_unfinished<R: Rng + ?Sized>(
    technologies: &[Technology],
    rng: &mut R,
) -> Result<Technology, StatsError> {
    let unfinished: Vec<&Technology> = technologies
        .iter()
        .filter(|tech| !tech.status.is_completed())
        .collect();
    if unfinished.is_empty() {
        return Err(StatsError::NoRemainingItems);
    }
    let index = rng.random_range(0..unfinished.len());
    Ok(unfinished[index].clone())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, ItemId, ProgressEntry};
    use crate::time::fixed_now;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tech(id: &str, status: Status) -> Technology {
        Technology::merge(
            &Item::new(id, id.to_uppercase()),
            Some(&ProgressEntry {
                status,
                ..ProgressEntry::default()
            }),
        )
    }

    fn with_deadline(mut tech: Technology, y: i32, m: u32, d: u32) -> Technology {
        tech.deadline = NaiveDate::from_ymd_opt(y, m, d);
        tech
    }

    fn ids(list: &[Technology]) -> Vec<&str> {
        list.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn empty_list_has_zero_percent() {
        assert_eq!(progress_percent(&[]), 0);
        assert_eq!(ProgressStats::from_technologies(&[]), ProgressStats::default());
    }

    #[test]
    fn stats_partition_is_exhaustive() {
        let list = vec![
            tech("a", Status::Completed),
            tech("b", Status::InProgress),
            tech("c", Status::NotStarted),
            tech("d", Status::NotStarted),
        ];
        let stats = ProgressStats::from_technologies(&list);
        assert_eq!(
            stats,
            ProgressStats {
                total: 4,
                completed: 1,
                in_progress: 1,
                not_started: 2
            }
        );
        assert_eq!(
            stats.total,
            stats.completed + stats.in_progress + stats.not_started
        );
        assert_eq!(stats.percent(), 25);
    }

    #[test]
    fn percent_rounds_half_up() {
        let list = vec![
            tech("a", Status::Completed),
            tech("b", Status::NotStarted),
            tech("c", Status::NotStarted),
        ];
        assert_eq!(progress_percent(&list), 33);

        let list = vec![
            tech("a", Status::Completed),
            tech("b", Status::Completed),
            tech("c", Status::NotStarted),
        ];
        assert_eq!(progress_percent(&list), 67);

        let mut list: Vec<Technology> = (0..8).map(|i| tech(&i.to_string(), Status::NotStarted)).collect();
        list[0].status = Status::Completed;
        // 12.5 rounds to 13
        assert_eq!(progress_percent(&list), 13);
    }

    #[test]
    fn overdue_requires_past_deadline_and_unfinished() {
        let now = fixed_now();
        let past = with_deadline(tech("a", Status::NotStarted), 2020, 1, 1);
        let done = with_deadline(tech("b", Status::Completed), 2020, 1, 1);
        let future = with_deadline(tech("c", Status::InProgress), 2030, 1, 1);
        let none = tech("d", Status::NotStarted);

        assert!(is_overdue(&past, now));
        assert!(!is_overdue(&done, now));
        assert!(!is_overdue(&future, now));
        assert!(!is_overdue(&none, now));
        assert_eq!(ids(&overdue(&[past, done, future, none], now)), ["a"]);
    }

    #[test]
    fn deadline_today_is_overdue_after_midnight() {
        // fixed_now() is 2023-11-14T22:13:20Z
        let today = with_deadline(tech("a", Status::NotStarted), 2023, 11, 14);
        assert!(is_overdue(&today, fixed_now()));

        let midnight = NaiveDate::from_ymd_opt(2023, 11, 14)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc();
        assert!(!is_overdue(&today, midnight));
    }

    #[test]
    fn upcoming_sorts_and_truncates() {
        let list = vec![
            with_deadline(tech("late", Status::NotStarted), 2024, 6, 1),
            tech("none", Status::NotStarted),
            with_deadline(tech("done", Status::Completed), 2024, 1, 1),
            with_deadline(tech("early", Status::InProgress), 2024, 2, 1),
            with_deadline(tech("tie", Status::NotStarted), 2024, 6, 1),
        ];
        assert_eq!(ids(&upcoming_deadlines(&list, 5)), ["early", "late", "tie"]);
        assert_eq!(ids(&upcoming_deadlines(&list, 1)), ["early"]);
        assert!(upcoming_deadlines(&list, 0).is_empty());
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let mut a = tech("a", Status::NotStarted);
        a.title = "Ownership".into();
        let mut b = tech("b", Status::NotStarted);
        b.description = "Learn about OWNERSHIP rules".into();
        let c = tech("c", Status::NotStarted);
        let list = vec![a, b, c];

        assert_eq!(ids(&search(&list, Some("ownership"))), ["a", "b"]);
        assert_eq!(search(&list, None).len(), 3);
        assert_eq!(search(&list, Some("")).len(), 3);
        assert!(search(&list, Some("lifetimes")).is_empty());
    }

    #[test]
    fn filter_by_status_is_exact() {
        let list = vec![
            tech("a", Status::Completed),
            tech("b", Status::InProgress),
            tech("c", Status::Completed),
        ];
        assert_eq!(ids(&filter_by_status(&list, Status::Completed)), ["a", "c"]);
        assert!(filter_by_status(&list, Status::NotStarted).is_empty());
    }

    #[test]
    fn status_filter_parses() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!("overdue".parse::<StatusFilter>().unwrap(), StatusFilter::Overdue);
        assert_eq!(
            "in_progress".parse::<StatusFilter>().unwrap(),
            StatusFilter::Status(Status::InProgress)
        );
        assert!("later".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn query_combines_filter_and_search() {
        let mut a = with_deadline(tech("a", Status::NotStarted), 2020, 1, 1);
        a.title = "Traits".into();
        let b = with_deadline(tech("b", Status::NotStarted), 2020, 1, 1);
        let c = tech("c", Status::Completed);
        let list = vec![a, b, c];

        let query = TechnologyQuery {
            filter: StatusFilter::Overdue,
            search: Some("trait".into()),
        };
        assert_eq!(ids(&query.apply(&list, fixed_now())), ["a"]);

        let query = TechnologyQuery {
            filter: StatusFilter::All,
            search: Some("   ".into()),
        };
        assert_eq!(query.apply(&list, fixed_now()).len(), 3);
    }

    #[test]
    fn random_pick_skips_completed() {
        let list = vec![
            tech("a", Status::Completed),
            tech("b", Status::InProgress),
            tech("c", Status::Completed),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let picked = random_unfinished(&list, &mut rng).unwrap();
            assert_eq!(picked.id, ItemId::new("b"));
        }
    }

    #[test]
    fn random_pick_reaches_every_unfinished_item() {
        let list = vec![
            tech("a", Status::NotStarted),
            tech("b", Status::InProgress),
            tech("c", Status::Completed),
        ];
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(random_unfinished(&list, &mut rng).unwrap().id);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn random_pick_fails_when_all_done() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            random_unfinished(&[tech("a", Status::Completed)], &mut rng),
            Err(StatsError::NoRemainingItems)
        );
        assert_eq!(
            random_unfinished(&[], &mut rng),
            Err(StatsError::NoRemainingItems)
        );
    }
}
