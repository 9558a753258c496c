use std::collections::HashMap;

use crate::models::analysis::{MergedSkill, Skill};

/// Spelling variants folded onto one canonical form before comparison.
/// Keys and values are compact keys / space-separated canonical tokens.
const ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ecmascript", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("python3", "python"),
    ("golang", "go"),
    ("node", "nodejs"),
    ("reactjs", "react"),
    ("vuejs", "vue"),
    ("angularjs", "angular"),
    ("k8s", "kubernetes"),
    ("postgres", "postgresql"),
    ("psql", "postgresql"),
    ("mssql", "sql server"),
    ("ml", "machine learning"),
    ("ai", "artificial intelligence"),
    ("ci cd", "cicd"),
    ("csharp", "c#"),
    ("cpp", "c++"),
    ("aws", "amazon web services"),
    ("gcp", "google cloud platform"),
];

/// Words too broad to link two skills on their own
/// ("Management" must not swallow "Project Management").
const GENERIC: &[&str] = &[
    "management",
    "development",
    "programming",
    "engineering",
    "design",
    "analysis",
    "systems",
    "system",
    "skills",
    "software",
    "web",
    "data",
    "testing",
    "team",
    "tools",
];

/// Comparison key for one skill name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SkillKey {
    tokens: Vec<String>,
    /// Tokens concatenated without separators.
    compact: String,
}

fn skill_key(name: &str) -> SkillKey {
    let lowered: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '+' || c == '#' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut tokens: Vec<String> = lowered.split_whitespace().map(str::to_string).collect();
    if let Some(canonical) = alias_of(&tokens.concat()) {
        tokens = canonical.split_whitespace().map(str::to_string).collect();
    }

    // Names made only of punctuation compare by their folded spelling.
    let compact = if tokens.is_empty() {
        name.split_whitespace().collect::<String>().to_lowercase()
    } else {
        tokens.concat()
    };
    SkillKey { tokens, compact }
}

fn alias_of(key: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(alias, _)| alias.replace(' ', "") == key)
        .map(|(_, canonical)| *canonical)
}

/// Keys match exactly, or one key spells out a contiguous run of the
/// other's tokens ("elasticsearch" inside "elastic search management").
fn equivalent(a: &SkillKey, b: &SkillKey) -> bool {
    if a.compact.is_empty() || b.compact.is_empty() {
        return false;
    }
    a.compact == b.compact || spells_run_of(a, b) || spells_run_of(b, a)
}

fn spells_run_of(short: &SkillKey, long: &SkillKey) -> bool {
    if short.compact.chars().count() < 2 || GENERIC.contains(&short.compact.as_str()) {
        return false;
    }

    for start in 0..long.tokens.len() {
        let mut run = String::new();
        for token in &long.tokens[start..] {
            run.push_str(token);
            if run == short.compact {
                return true;
            }
            if run.len() >= short.compact.len() {
                break;
            }
        }
    }
    false
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Keeps the smaller index as root so roots are first occurrences.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Clusters equivalent skills into merged entries.
///
/// Each cluster reports the name and score of its highest-scoring member
/// (first occurrence wins a tie) and the number of members folded in.
/// Clusters are ordered by their earliest member, and the `merged` counts
/// always sum to `skills.len()`.
pub fn merge_skills(skills: &[Skill]) -> Vec<MergedSkill> {
    let keys: Vec<SkillKey> = skills.iter().map(|s| skill_key(&s.name)).collect();
    let mut clusters = DisjointSet::new(skills.len());

    for i in 0..keys.len() {
        for j in (i + 1)..keys.len() {
            if equivalent(&keys[i], &keys[j]) {
                clusters.union(i, j);
            }
        }
    }

    let mut merged: Vec<MergedSkill> = Vec::new();
    let mut position: HashMap<usize, usize> = HashMap::new();

    for (i, skill) in skills.iter().enumerate() {
        let root = clusters.find(i);
        match position.get(&root) {
            Some(&at) => {
                let entry = &mut merged[at];
                entry.merged += 1;
                if skill.score > entry.score {
                    entry.name = skill.name.clone();
                    entry.score = skill.score;
                }
            }
            None => {
                position.insert(root, merged.len());
                merged.push(MergedSkill {
                    name: skill.name.clone(),
                    score: skill.score,
                    merged: 1,
                });
            }
        }
    }

    merged
}
