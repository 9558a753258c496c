use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::block::BlockType;

/// A skill as reported for one block, score clamped to 0–100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_score")]
    pub score: u8,
}

impl Skill {
    pub fn new(name: impl Into<String>, score: u8) -> Self {
        Self {
            name: name.into(),
            score: score.min(100),
        }
    }
}

/// One cluster of equivalent skills folded into a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedSkill {
    pub name: String,
    pub score: u8,
    /// Number of raw skill mentions in the cluster (always ≥ 1).
    pub merged: usize,
}

/// A position held on one project or at one employer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub title: String,
    #[serde(default, alias = "project", alias = "company")]
    pub employer: String,
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub start: Option<String>,
    /// Either a date or "present".
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub end: Option<String>,
    /// Free-text duration as stated, e.g. "1 year, 9 months".
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_score")]
    pub score: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub category: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub language: String,
    #[serde(default, alias = "proficiency")]
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub field: String,
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub end: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Per-type payloads (the strict schema each completion must satisfy)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectsPayload {
    #[serde(default)]
    pub skills: Vec<Skill>,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillsPayload {
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationPayload {
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguagesPayload {
    pub languages: Vec<LanguageEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub location: Option<String>,
    /// Total experience as the candidate states it.
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub experience: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub ready_to_remote: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub ready_to_trip: bool,
}

/// Structured answer for one successfully processed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockResult {
    Projects(ProjectsPayload),
    Skills(SkillsPayload),
    Education(EducationPayload),
    Languages(LanguagesPayload),
    Summary(SummaryPayload),
}

impl BlockResult {
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockResult::Projects(_) => BlockType::Projects,
            BlockResult::Skills(_) => BlockType::Skills,
            BlockResult::Education(_) => BlockType::Education,
            BlockResult::Languages(_) => BlockType::Languages,
            BlockResult::Summary(_) => BlockType::Summary,
        }
    }

    pub fn skills(&self) -> &[Skill] {
        match self {
            BlockResult::Projects(p) => &p.skills,
            BlockResult::Skills(p) => &p.skills,
            BlockResult::Education(p) => &p.skills,
            BlockResult::Summary(p) => &p.skills,
            BlockResult::Languages(_) => &[],
        }
    }

    pub fn roles(&self) -> &[Role] {
        match self {
            BlockResult::Projects(p) => &p.roles,
            _ => &[],
        }
    }

    pub fn languages(&self) -> &[LanguageEntry] {
        match self {
            BlockResult::Languages(p) => &p.languages,
            _ => &[],
        }
    }

    pub fn summary(&self) -> Option<&SummaryPayload> {
        match self {
            BlockResult::Summary(p) => Some(p),
            _ => None,
        }
    }

    /// Drops entries without a usable name. Called once after parsing.
    pub fn sanitized(self) -> Self {
        fn keep_skills(skills: Vec<Skill>) -> Vec<Skill> {
            skills
                .into_iter()
                .filter_map(|s| {
                    let name = s.name.trim();
                    (!name.is_empty()).then(|| Skill::new(name, s.score))
                })
                .collect()
        }

        match self {
            BlockResult::Projects(p) => BlockResult::Projects(ProjectsPayload {
                skills: keep_skills(p.skills),
                roles: p
                    .roles
                    .into_iter()
                    .filter(|r| !r.title.trim().is_empty())
                    .collect(),
            }),
            BlockResult::Skills(p) => BlockResult::Skills(SkillsPayload {
                skills: keep_skills(p.skills),
            }),
            BlockResult::Education(p) => BlockResult::Education(EducationPayload {
                skills: keep_skills(p.skills),
                education: p.education,
            }),
            BlockResult::Languages(p) => BlockResult::Languages(LanguagesPayload {
                languages: p
                    .languages
                    .into_iter()
                    .filter(|l| !l.language.trim().is_empty())
                    .collect(),
            }),
            BlockResult::Summary(p) => BlockResult::Summary(SummaryPayload {
                skills: keep_skills(p.skills),
                ..p
            }),
        }
    }
}

/// Final, immutable record returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub skills_from_resume: Vec<Skill>,
    pub skills_merged: Vec<MergedSkill>,
    pub roles: Vec<Role>,
    pub languages: Vec<LanguageEntry>,
    pub experience: String,
    pub location: String,
    pub ready_to_remote: bool,
    pub ready_to_trip: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient scalar decoding for model output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
}

fn score_from_scalar(value: Scalar) -> Option<u8> {
    let number = match value {
        Scalar::Number(n) => n,
        Scalar::Text(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        Scalar::Bool(_) => return None,
    };
    number
        .is_finite()
        .then(|| number.round().clamp(0.0, 100.0) as u8)
}

fn deserialize_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(0),
        Some(value) => score_from_scalar(value)
            .ok_or_else(|| serde::de::Error::custom("score is not a number")),
    }
}

fn deserialize_opt_score<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u8>, D::Error> {
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value.and_then(score_from_scalar))
}

fn deserialize_opt_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(match value {
        Some(Scalar::Text(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Scalar::Number(n)) => Some(n.to_string()),
        Some(Scalar::Bool(_)) | None => None,
    })
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(match value {
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Text(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        Some(Scalar::Number(_)) | None => false,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Tags {
    One(String),
    Many(Vec<String>),
}

fn deserialize_tags<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeSet<String>, D::Error> {
    let tags = Option::<Tags>::deserialize(deserializer)?;
    let raw = match tags {
        Some(Tags::One(s)) => s.split(',').map(str::to_string).collect(),
        Some(Tags::Many(v)) => v,
        None => Vec::new(),
    };
    Ok(raw
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}
