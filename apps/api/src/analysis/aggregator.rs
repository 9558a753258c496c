use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::info;

use crate::analysis::experience::total_experience;
use crate::analysis::skill_merger::merge_skills;
use crate::analysis::AnalysisError;
use crate::models::analysis::{AnalysisResult, BlockResult, LanguageEntry, Role, Skill};

/// Title keyword → category tag. Matched against whole title words.
const TITLE_CATEGORIES: &[(&str, &str)] = &[
    ("developer", "Development"),
    ("engineer", "Development"),
    ("programmer", "Development"),
    ("architect", "Development"),
    ("frontend", "Development"),
    ("backend", "Development"),
    ("fullstack", "Development"),
    ("manager", "Management"),
    ("lead", "Management"),
    ("head", "Management"),
    ("director", "Management"),
    ("supervisor", "Management"),
    ("coordinator", "Management"),
    ("owner", "Management"),
    ("cto", "Management"),
    ("ceo", "Management"),
    ("designer", "Design"),
    ("ux", "Design"),
    ("ui", "Design"),
    ("analyst", "Data"),
    ("scientist", "Data"),
    ("data", "Data"),
    ("qa", "QA"),
    ("tester", "QA"),
    ("quality", "QA"),
    ("devops", "DevOps"),
    ("sre", "DevOps"),
    ("sysadmin", "DevOps"),
    ("administrator", "DevOps"),
    ("infrastructure", "DevOps"),
    ("sales", "Sales"),
    ("account", "Sales"),
    ("marketing", "Marketing"),
    ("marketer", "Marketing"),
    ("seo", "Marketing"),
    ("accountant", "Finance"),
    ("financial", "Finance"),
    ("finance", "Finance"),
    ("auditor", "Finance"),
    ("nurse", "Healthcare"),
    ("physician", "Healthcare"),
    ("doctor", "Healthcare"),
    ("pharmacist", "Healthcare"),
    ("teacher", "Education"),
    ("tutor", "Education"),
    ("lecturer", "Education"),
    ("professor", "Education"),
    ("instructor", "Education"),
    ("consultant", "Consulting"),
    ("advisor", "Consulting"),
    ("recruiter", "HR"),
    ("hr", "HR"),
];

/// Returns a copy of `role` whose categories include the keyword tags
/// derived from its title.
pub fn categorize(role: &Role) -> Role {
    let title = role.title.to_lowercase();
    let words: HashSet<&str> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut category: BTreeSet<String> = role.category.clone();
    for (keyword, tag) in TITLE_CATEGORIES {
        if words.contains(keyword) {
            category.insert((*tag).to_string());
        }
    }

    Role {
        category,
        ..role.clone()
    }
}

fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}

fn role_key(role: &Role) -> (String, String, String, String) {
    (
        fold(&role.title),
        fold(&role.employer),
        role.start.as_deref().map(fold).unwrap_or_default(),
        role.end.as_deref().map(fold).unwrap_or_default(),
    )
}

/// Most frequent non-empty value (case-insensitive); ties go to the value
/// seen first, reported in its first spelling.
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: Vec<(String, &'a str, usize)> = Vec::new();
    for value in values.map(str::trim).filter(|v| !v.is_empty()) {
        let key = value.to_lowercase();
        match counts.iter_mut().find(|(k, _, _)| *k == key) {
            Some(entry) => entry.2 += 1,
            None => counts.push((key, value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (_, value, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Builds the final record from ordered block results.
///
/// Pure: the same results and `today` always give the same record.
pub fn aggregate(
    results: &[BlockResult],
    today: NaiveDate,
) -> Result<AnalysisResult, AnalysisError> {
    if results.is_empty() {
        return Err(AnalysisError::Aggregation(
            "no block results to aggregate".to_string(),
        ));
    }

    let skills_from_resume: Vec<Skill> = results
        .iter()
        .flat_map(|r| r.skills().iter().cloned())
        .collect();
    let skills_merged = merge_skills(&skills_from_resume);

    let mut seen_roles = HashSet::new();
    let roles: Vec<Role> = results
        .iter()
        .flat_map(|r| r.roles())
        .filter(|role| seen_roles.insert(role_key(role)))
        .map(categorize)
        .collect();

    let mut seen_languages = HashSet::new();
    let languages: Vec<LanguageEntry> = results
        .iter()
        .flat_map(|r| r.languages())
        .filter(|l| seen_languages.insert((fold(&l.language), fold(&l.level))))
        .cloned()
        .collect();

    let summaries: Vec<_> = results.iter().filter_map(BlockResult::summary).collect();
    let location = most_frequent(summaries.iter().filter_map(|s| s.location.as_deref()))
        .unwrap_or_default();
    let stated = summaries.iter().find_map(|s| s.experience.as_deref());
    let experience = total_experience(&roles, stated, today);

    let result = AnalysisResult {
        skills_merged,
        roles,
        languages,
        experience,
        location,
        ready_to_remote: summaries.iter().any(|s| s.ready_to_remote),
        ready_to_trip: summaries.iter().any(|s| s.ready_to_trip),
        skills_from_resume,
    };

    info!(
        "Aggregated {} skills into {} clusters, {} roles, {} languages, experience {}",
        result.skills_from_resume.len(),
        result.skills_merged.len(),
        result.roles.len(),
        result.languages.len(),
        result.experience
    );

    Ok(result)
}
