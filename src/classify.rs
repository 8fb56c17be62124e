use crate::types::{Age, Direction, FileEntry, LastUsed};
use crate::usage::UsageRecord;
use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub entry: FileEntry,
    pub age: Age,
    pub selected: bool,
}

/// Every evaluated file with its decision, in listing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepPlan {
    pub evaluated: Vec<Evaluated>,
}

impl SweepPlan {
    pub fn selected(&self) -> impl Iterator<Item = &FileEntry> {
        self.evaluated
            .iter()
            .filter(|e| e.selected)
            .map(|e| &e.entry)
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.evaluated.iter().filter(|e| e.selected).count()
    }

    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.evaluated
            .iter()
            .filter(|e| e.age == Age::Never)
            .count()
    }
}

/// Whole days between `last_used` and `now`, rounded down.
///
/// `now` is viewed in the offset of `last_used` before subtracting.
#[must_use]
pub fn age_in_days(last_used: LastUsed, now: DateTime<Utc>) -> Age {
    match last_used {
        None => Age::Never,
        Some(last_used) => {
            let now = now.with_timezone(&last_used.timezone());
            let elapsed = now.signed_duration_since(last_used);
            // num_seconds truncates toward zero; a negative remainder is one more second back
            let seconds = elapsed.num_seconds() - i64::from(elapsed.subsec_nanos() < 0);
            Age::Days(seconds.div_euclid(SECONDS_PER_DAY))
        }
    }
}

#[must_use]
pub fn is_selected(age: Age, direction: Direction, cutoff_days: i64) -> bool {
    match (direction, age) {
        (Direction::OlderThan, Age::Never) => true,
        (Direction::NewerThan, Age::Never) => false,
        (Direction::OlderThan, Age::Days(days)) => days > cutoff_days,
        (Direction::NewerThan, Age::Days(days)) => days < cutoff_days,
    }
}

#[must_use]
pub fn build_plan(
    files: &[FileEntry],
    usage: &UsageRecord,
    now: DateTime<Utc>,
    cutoff_days: i64,
    direction: Direction,
) -> SweepPlan {
    let evaluated = files
        .iter()
        .filter(|entry| !usage.is_skipped(&entry.path))
        .map(|entry| {
            let age = age_in_days(usage.last_used(&entry.path), now);
            Evaluated {
                entry: entry.clone(),
                age,
                selected: is_selected(age, direction, cutoff_days),
            }
        })
        .collect();

    SweepPlan { evaluated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};
    use std::path::PathBuf;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            path: PathBuf::from(format!("/in/{name}")),
            name: name.to_string(),
            size: 10,
        }
    }

    fn days_ago(days: i64) -> DateTime<FixedOffset> {
        (now() - Duration::days(days)).fixed_offset()
    }

    #[test]
    fn test_age_whole_days() {
        assert_eq!(age_in_days(Some(days_ago(10)), now()), Age::Days(10));
        assert_eq!(age_in_days(Some(days_ago(0)), now()), Age::Days(0));

        let almost_two = (now() - Duration::hours(47)).fixed_offset();
        assert_eq!(age_in_days(Some(almost_two), now()), Age::Days(1));
    }

    #[test]
    fn test_age_independent_of_offset() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let last_used = (now() - Duration::days(3)).with_timezone(&tokyo);
        assert_eq!(age_in_days(Some(last_used), now()), Age::Days(3));
    }

    #[test]
    fn test_future_date_rounds_down() {
        let future = (now() + Duration::hours(2)).fixed_offset();
        assert_eq!(age_in_days(Some(future), now()), Age::Days(-1));

        let just_ahead = (now() + Duration::milliseconds(500)).fixed_offset();
        assert_eq!(age_in_days(Some(just_ahead), now()), Age::Days(-1));

        let just_behind = (now() - Duration::milliseconds(500)).fixed_offset();
        assert_eq!(age_in_days(Some(just_behind), now()), Age::Days(0));
    }

    #[test]
    fn test_sub_second_future_selected_by_newer_zero() {
        let just_ahead = (now() + Duration::milliseconds(500)).fixed_offset();
        let age = age_in_days(Some(just_ahead), now());
        assert!(is_selected(age, Direction::NewerThan, 0));
    }

    #[test]
    fn test_unknown_is_never() {
        assert_eq!(age_in_days(None, now()), Age::Never);
    }

    #[test]
    fn test_older_than_uses_strict_comparison() {
        assert!(is_selected(Age::Days(8), Direction::OlderThan, 7));
        assert!(!is_selected(Age::Days(7), Direction::OlderThan, 7));
        assert!(!is_selected(Age::Days(1), Direction::OlderThan, 7));
    }

    #[test]
    fn test_newer_than_uses_strict_comparison() {
        assert!(is_selected(Age::Days(6), Direction::NewerThan, 7));
        assert!(!is_selected(Age::Days(7), Direction::NewerThan, 7));
        assert!(!is_selected(Age::Days(30), Direction::NewerThan, 7));
    }

    #[test]
    fn test_never_used_for_any_cutoff() {
        for cutoff in [0, 1, 7, 365, i64::from(u32::MAX)] {
            assert!(is_selected(Age::Never, Direction::OlderThan, cutoff));
            assert!(!is_selected(Age::Never, Direction::NewerThan, cutoff));
        }
    }

    #[test]
    fn test_plan_older_and_newer() {
        let files = vec![entry("a.txt"), entry("b.txt"), entry("c.txt")];
        let usage: UsageRecord = [
            (files[0].path.clone(), Some(days_ago(10))),
            (files[1].path.clone(), Some(days_ago(1))),
            (files[2].path.clone(), None),
        ]
        .into_iter()
        .collect();

        let older = build_plan(&files, &usage, now(), 7, Direction::OlderThan);
        let names: Vec<_> = older.selected().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
        assert_eq!(older.unknown_count(), 1);

        let newer = build_plan(&files, &usage, now(), 7, Direction::NewerThan);
        let names: Vec<_> = newer.selected().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt"]);
        assert_eq!(newer.selected_count(), 1);
    }

    #[test]
    fn test_plan_leaves_out_skipped_lookups() {
        struct Exploding;
        impl crate::usage::UsageMetadataProvider for Exploding {
            fn last_used_at(&self, path: &std::path::Path) -> LastUsed {
                assert!(!path.ends_with("bad.txt"), "lookup blew up");
                None
            }
        }

        let files = vec![entry("good.txt"), entry("bad.txt")];
        let usage = crate::usage::resolve_all(&Exploding, &files, 1);

        let plan = build_plan(&files, &usage, now(), 7, Direction::OlderThan);
        let names: Vec<_> = plan.selected().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["good.txt"]);
        assert_eq!(plan.evaluated.len(), 1);
    }

    #[test]
    fn test_plan_is_repeatable() {
        let files = vec![entry("a.txt"), entry("b.txt")];
        let usage: UsageRecord = [(files[0].path.clone(), Some(days_ago(9)))]
            .into_iter()
            .collect();

        let first = build_plan(&files, &usage, now(), 7, Direction::OlderThan);
        let second = build_plan(&files, &usage, now(), 7, Direction::OlderThan);
        assert_eq!(first, second);
        assert_eq!(first.evaluated[1].age, Age::Never);
    }
}
