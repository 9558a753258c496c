use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five section kinds a resume is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Projects,
    Skills,
    Education,
    Languages,
    Summary,
}

impl BlockType {
    #[cfg(test)]
    pub const ALL: [BlockType; 5] = [
        BlockType::Projects,
        BlockType::Skills,
        BlockType::Education,
        BlockType::Languages,
        BlockType::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Projects => "projects",
            BlockType::Skills => "skills",
            BlockType::Education => "education",
            BlockType::Languages => "languages",
            BlockType::Summary => "summary",
        }
    }

    /// Projects are one block per job; every other type is a single section.
    pub fn is_repeatable(&self) -> bool {
        matches!(self, BlockType::Projects)
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous, typed section of one resume.
///
/// Produced by the segmenter and never modified afterwards; `order` runs
/// `0..n-1` across the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub order: usize,
    pub content: String,
}

impl Block {
    pub fn new(block_type: BlockType, order: usize, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_type,
            order,
            content: content.into(),
        }
    }
}
