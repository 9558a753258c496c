//! Experience calculator: total non-overlapping time across roles.
//!
//! Dates are reduced to month indexes (`year * 12 + month - 1`) and every
//! role becomes a half-open `[start, end)` span. Overlapping spans are
//! unioned before summing, so concurrent roles are never double-counted.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{Datelike, Month, NaiveDate};
use tracing::{debug, warn};

use crate::models::analysis::Role;

/// Allowed relative gap between stated and computed experience.
const STATED_TOLERANCE: f64 = 0.2;

/// Longest duration accepted from a single phrase; anything above is noise.
const MAX_DURATION_MONTHS: u32 = 80 * 12;

const PRESENT_WORDS: &[&str] = &["present", "current", "currently", "now", "today", "ongoing"];

/// Month-granular `[start, end)` interval derived from one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExperienceSpan {
    pub start: i32,
    pub end: i32,
}

impl ExperienceSpan {
    pub fn months(&self) -> u32 {
        (self.end - self.start).max(0) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleTime {
    Span(ExperienceSpan),
    /// Only a length is known; it cannot be placed on the timeline.
    Standalone(u32),
    Unknown,
}

fn month_index(year: i32, month: u32) -> i32 {
    year * 12 + month as i32 - 1
}

/// Exclusive end used for "present": the reference month itself counts.
fn present_end(today: NaiveDate) -> i32 {
    month_index(today.year(), today.month()) + 1
}

fn plausible_year(text: &str) -> Option<i32> {
    if text.len() != 4 || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = text.parse().ok()?;
    (1900..=2100).contains(&year).then_some(year)
}

fn plausible_month(text: &str) -> Option<u32> {
    if text.is_empty() || text.len() > 2 || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let month: u32 = text.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

/// Parses a role date into a month index; "present" and friends resolve to
/// `present`.
fn parse_date(text: &str, present: i32) -> Option<i32> {
    let text = text.trim().trim_end_matches('.').to_lowercase();
    if text.is_empty() {
        return None;
    }
    if PRESENT_WORDS.contains(&text.as_str())
        || text.starts_with("till ")
        || text.starts_with("to date")
    {
        return Some(present);
    }

    if let Some(year) = plausible_year(&text) {
        return Some(month_index(year, 1));
    }

    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        return Some(month_index(date.year(), date.month()));
    }

    let numeric: Vec<&str> = text.split(['-', '/', '.']).map(str::trim).collect();
    if numeric.len() == 2 {
        // YYYY-MM
        if let (Some(year), Some(month)) =
            (plausible_year(numeric[0]), plausible_month(numeric[1]))
        {
            return Some(month_index(year, month));
        }
        // MM/YYYY
        if let (Some(month), Some(year)) =
            (plausible_month(numeric[0]), plausible_year(numeric[1]))
        {
            return Some(month_index(year, month));
        }
    }

    // "Mar 2021", "March, 2021"
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();
    if let [name, year] = words.as_slice() {
        let name = name.trim_end_matches('.');
        let name = if name == "sept" { "sep" } else { name };
        if let (Ok(month), Some(year)) = (Month::from_str(name), plausible_year(year)) {
            return Some(month_index(year, month.number_from_month()));
        }
    }

    None
}

/// Reads a free-text duration such as "1 year, 9 months", "2 yrs" or
/// "1.5 years" into whole months. Totals above 80 years are rejected.
pub fn parse_duration_months(text: &str) -> Option<u32> {
    let months = measure_duration(text)?;
    (months <= f64::from(MAX_DURATION_MONTHS)).then(|| months.round() as u32)
}

fn measure_duration(text: &str) -> Option<f64> {
    let text = text.to_lowercase();
    let chars: Vec<char> = text.chars().collect();
    let mut total = 0.0_f64;
    let mut found = false;
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let mut number = String::new();
        while i < chars.len()
            && (chars[i].is_ascii_digit()
                || ((chars[i] == '.' || chars[i] == ',')
                    && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())))
        {
            number.push(if chars[i] == ',' { '.' } else { chars[i] });
            i += 1;
        }
        while i < chars.len() && (chars[i].is_whitespace() || chars[i] == '+') {
            i += 1;
        }
        let unit: String = chars[i..]
            .iter()
            .take_while(|c| c.is_alphabetic())
            .collect();
        i += unit.chars().count();

        let Ok(value) = number.parse::<f64>() else {
            continue;
        };
        if unit.starts_with('y') {
            total += value * 12.0;
            found = true;
        } else if unit.starts_with("mo") || unit == "m" {
            total += value;
            found = true;
        }
    }

    found.then_some(total)
}

fn role_time(role: &Role, present: i32) -> RoleTime {
    let start = role.start.as_deref().and_then(|s| parse_date(s, present));
    let end = role.end.as_deref().and_then(|s| parse_date(s, present));
    // Both dates known: the duration is not needed.
    let measured = match (start, end) {
        (Some(_), Some(_)) => None,
        _ => role.duration.as_deref().and_then(measure_duration),
    };
    let duration = match measured {
        Some(months) if months > f64::from(MAX_DURATION_MONTHS) => return RoleTime::Unknown,
        Some(months) => Some(months.round() as u32).filter(|&d| d > 0),
        None => None,
    };

    let span = match (start, end, duration) {
        (Some(start), Some(end), _) => Some(ExperienceSpan { start, end }),
        (Some(start), None, Some(months)) => i32::try_from(months)
            .ok()
            .and_then(|m| start.checked_add(m))
            .map(|end| ExperienceSpan { start, end }),
        (Some(start), None, None) => Some(ExperienceSpan {
            start,
            end: present,
        }),
        (None, Some(end), Some(months)) => i32::try_from(months)
            .ok()
            .and_then(|m| end.checked_sub(m))
            .map(|start| ExperienceSpan { start, end }),
        (None, None, Some(months)) => return RoleTime::Standalone(months),
        (None, _, None) => None,
    };

    match span {
        Some(span) if span.end > span.start => RoleTime::Span(span),
        _ => RoleTime::Unknown,
    }
}

/// Unions spans: a span merges into the running one when it starts at or
/// before the running end.
pub fn merge_spans(mut spans: Vec<ExperienceSpan>) -> Vec<ExperienceSpan> {
    spans.sort();
    let mut merged: Vec<ExperienceSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(running) if span.start <= running.end => {
                running.end = running.end.max(span.end);
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// Total months of non-overlapping experience, or `None` when no role could
/// be placed or measured.
pub fn total_months(roles: &[Role], today: NaiveDate) -> Option<u32> {
    let present = present_end(today);
    let mut spans = Vec::new();
    // Undated durations count once per employer.
    let mut standalone: HashMap<String, u32> = HashMap::new();

    for role in roles {
        match role_time(role, present) {
            RoleTime::Span(span) => spans.push(span),
            RoleTime::Standalone(months) => {
                let slot = standalone
                    .entry(role.employer.trim().to_lowercase())
                    .or_insert(0);
                *slot = (*slot).max(months);
            }
            RoleTime::Unknown => {
                debug!(
                    "Role '{}' at '{}' has no usable dates, excluded from experience",
                    role.title, role.employer
                );
            }
        }
    }

    if spans.is_empty() && standalone.is_empty() {
        return None;
    }

    let total = merge_spans(spans)
        .iter()
        .map(ExperienceSpan::months)
        .chain(standalone.into_values())
        .fold(0u32, u32::saturating_add);
    Some(total)
}

/// Renders a month count: "8 months", "3 years", "3+ years".
pub fn format_experience(months: u32) -> String {
    let (years, rest) = (months / 12, months % 12);
    match (years, rest) {
        (0, 1) => "1 month".to_string(),
        (0, m) => format!("{m} months"),
        (1, 0) => "1 year".to_string(),
        (y, 0) => format!("{y} years"),
        (1, _) => "1+ year".to_string(),
        (y, _) => format!("{y}+ years"),
    }
}

/// Final experience figure for a resume.
///
/// The computed total wins when available; a stated figure that differs by
/// more than 20% is logged. Without any usable role the stated figure is
/// used instead.
pub fn total_experience(roles: &[Role], stated: Option<&str>, today: NaiveDate) -> String {
    let computed = total_months(roles, today);
    let stated_text = stated.map(str::trim).filter(|s| !s.is_empty());
    let stated_months = stated_text.and_then(parse_duration_months);

    match (computed, stated_months) {
        (Some(computed), Some(stated)) => {
            if stated > 0 {
                let deviation = (computed as f64 - stated as f64).abs() / stated as f64;
                if deviation > STATED_TOLERANCE {
                    warn!(
                        "Stated experience ({stated} months) differs from computed \
                         ({computed} months) by {:.0}%",
                        deviation * 100.0
                    );
                }
            }
            format_experience(computed)
        }
        (Some(computed), None) => format_experience(computed),
        (None, Some(stated)) => format_experience(stated),
        (None, None) => stated_text
            .map(str::to_string)
            .unwrap_or_else(|| format_experience(0)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn role(start: Option<&str>, end: Option<&str>, duration: Option<&str>) -> Role {
        Role {
            title: "Engineer".into(),
            employer: "Acme".into(),
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            duration: duration.map(str::to_string),
            score: None,
            category: BTreeSet::new(),
        }
    }

    fn ranged(start: &str, end: &str) -> Role {
        role(Some(start), Some(end), None)
    }

    #[test]
    fn test_overlapping_roles_counted_once() {
        let roles = vec![ranged("2020-01", "2021-10"), ranged("2021-06", "2023-06")];
        assert_eq!(total_months(&roles, today()), Some(41));
        assert_eq!(total_experience(&roles, None, today()), "3+ years");
    }

    #[test]
    fn test_adjacent_roles_merge() {
        let spans = merge_spans(vec![
            ExperienceSpan { start: 10, end: 20 },
            ExperienceSpan { start: 20, end: 30 },
            ExperienceSpan { start: 40, end: 45 },
        ]);
        assert_eq!(
            spans,
            vec![
                ExperienceSpan { start: 10, end: 30 },
                ExperienceSpan { start: 40, end: 45 }
            ]
        );
    }

    #[test]
    fn test_total_non_decreasing_and_bounded_by_naive_sum() {
        let all = vec![
            ranged("2015-03", "2017-01"),
            ranged("2016-06", "2016-12"),
            ranged("2018-01", "2020-01"),
            ranged("2019-05", "2022-02"),
            ranged("2010", "2024"),
        ];
        let mut previous = 0;
        let mut naive = 0;
        for n in 1..=all.len() {
            let total = total_months(&all[..n], today()).unwrap();
            let last = role_time(&all[n - 1], present_end(today()));
            if let RoleTime::Span(span) = last {
                naive += span.months();
            }
            assert!(total >= previous);
            assert!(total <= naive);
            previous = total;
        }
    }

    #[test]
    fn test_date_formats() {
        let present = present_end(today());
        assert_eq!(parse_date("2021", present), Some(month_index(2021, 1)));
        assert_eq!(parse_date("2021-03", present), Some(month_index(2021, 3)));
        assert_eq!(parse_date("2021-03-17", present), Some(month_index(2021, 3)));
        assert_eq!(parse_date("03/2021", present), Some(month_index(2021, 3)));
        assert_eq!(parse_date("Mar 2021", present), Some(month_index(2021, 3)));
        assert_eq!(parse_date("September 2021", present), Some(month_index(2021, 9)));
        assert_eq!(parse_date("Sept. 2021", present), Some(month_index(2021, 9)));
        assert_eq!(parse_date("Present", present), Some(present));
        assert_eq!(parse_date("sometime", present), None);
        assert_eq!(parse_date("2021-13", present), None);
    }

    #[test]
    fn test_duration_phrases() {
        assert_eq!(parse_duration_months("1 year 9 months"), Some(21));
        assert_eq!(parse_duration_months("1 year, 9 months"), Some(21));
        assert_eq!(parse_duration_months("2 yrs"), Some(24));
        assert_eq!(parse_duration_months("18 mo"), Some(18));
        assert_eq!(parse_duration_months("1.5 years"), Some(18));
        assert_eq!(parse_duration_months("5+ years"), Some(60));
        assert_eq!(parse_duration_months("a while"), None);
    }

    #[test]
    fn test_present_end_counts_current_month() {
        let roles = vec![role(Some("2024-01"), Some("present"), None)];
        assert_eq!(total_months(&roles, today()), Some(6));
    }

    #[test]
    fn test_duration_fills_missing_end() {
        let roles = vec![
            role(Some("2019-01"), None, Some("1 year")),
            role(Some("2019-06"), Some("2020-06"), None),
        ];
        assert_eq!(total_months(&roles, today()), Some(17));
    }

    #[test]
    fn test_duration_fills_missing_start() {
        let roles = vec![role(None, Some("2022-01"), Some("6 months"))];
        assert_eq!(total_months(&roles, today()), Some(6));
    }

    #[test]
    fn test_undated_durations_count_once_per_employer() {
        let mut other = role(None, None, Some("2 years"));
        other.employer = "Globex".into();
        let roles = vec![
            role(None, None, Some("1 year")),
            role(None, None, Some("18 months")),
            other,
        ];
        assert_eq!(total_months(&roles, today()), Some(18 + 24));
    }

    #[test]
    fn test_unparseable_and_inverted_roles_excluded() {
        let roles = vec![
            role(Some("whenever"), Some("later"), None),
            ranged("2022-01", "2021-01"),
            ranged("2020-01", "2021-01"),
        ];
        assert_eq!(total_months(&roles, today()), Some(12));
        assert_eq!(total_months(&roles[..2], today()), None);
    }

    #[test]
    fn test_absurd_durations_are_excluded() {
        assert_eq!(parse_duration_months("178956970 years"), None);
        assert_eq!(parse_duration_months("81 years"), None);
        assert_eq!(parse_duration_months("80 years"), Some(960));

        let dated = vec![
            role(Some("2020-01"), None, Some("178956970 years")),
            role(None, Some("2020-01"), Some("300000000 years")),
        ];
        assert_eq!(total_months(&dated, today()), None);

        let mut other = role(None, None, Some("300000000 years"));
        other.employer = "Globex".into();
        let undated = vec![
            role(None, None, Some("300000000 years")),
            other,
            ranged("2020-01", "2021-01"),
        ];
        assert_eq!(total_months(&undated, today()), Some(12));

        let both_dates = vec![role(Some("2020-01"), Some("2021-01"), Some("300000000 years"))];
        assert_eq!(total_months(&both_dates, today()), Some(12));
    }

    #[test]
    fn test_format_buckets() {
        assert_eq!(format_experience(0), "0 months");
        assert_eq!(format_experience(1), "1 month");
        assert_eq!(format_experience(11), "11 months");
        assert_eq!(format_experience(12), "1 year");
        assert_eq!(format_experience(13), "1+ year");
        assert_eq!(format_experience(36), "3 years");
        assert_eq!(format_experience(245), "20+ years");
    }

    #[test]
    fn test_stated_experience_used_when_nothing_computed() {
        assert_eq!(total_experience(&[], Some("5 years"), today()), "5 years");
        assert_eq!(
            total_experience(&[], Some("over a decade"), today()),
            "over a decade"
        );
        assert_eq!(total_experience(&[], None, today()), "0 months");
    }

    #[test]
    fn test_computed_experience_wins_over_stated() {
        let roles = vec![ranged("2018-01", "2020-01")];
        assert_eq!(total_experience(&roles, Some("10 years"), today()), "2 years");
    }
}
