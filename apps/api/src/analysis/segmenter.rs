//! Segmenter: splits a normalized resume into ordered, typed blocks.
//!
//! One completion call per page. Resumes longer than the configured
//! threshold are cut into line-bounded pages first, each segmented in turn,
//! and the combined answer is standardized into a single block list.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, info};

use crate::analysis::prompts::SEGMENTATION_PROMPT;
use crate::analysis::AnalysisError;
use crate::config::PipelineConfig;
use crate::llm_client::prompts::render;
use crate::llm_client::retry::{complete_with_retry, RetryPolicy};
use crate::llm_client::{parse_json, CompletionError, CompletionPort, CompletionRequest};
use crate::models::block::{Block, BlockType};

/// How far back from a page boundary to look for a natural break.
const BREAK_LOOKBACK_LINES: usize = 10;

#[derive(Debug, Deserialize)]
struct SegmentationResponse {
    blocks: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    #[serde(rename = "type")]
    block_type: BlockType,
    order: u32,
    #[serde(default)]
    content: String,
}

/// Segments `text` into blocks whose orders run `0..n-1`.
pub async fn segment(
    port: &dyn CompletionPort,
    config: &PipelineConfig,
    text: &str,
) -> Result<Vec<Block>, AnalysisError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::Segmentation(
            "document contains no text".to_string(),
        ));
    }

    let pages = split_into_pages(text, config);
    if pages.len() > 1 {
        info!(
            "Large resume ({} lines), segmenting {} pages of up to {} lines",
            text.lines().count(),
            pages.len(),
            config.page_size_lines
        );
    }

    let policy = RetryPolicy::from_config(config);
    let mut raw = Vec::new();
    for (index, page) in pages.iter().enumerate() {
        let request = CompletionRequest {
            prompt: render(SEGMENTATION_PROMPT, page),
            params: config.generation.segmentation,
            timeout: config.request_timeout,
        };
        let label = format!("segmentation page {}/{}", index + 1, pages.len());
        let done = complete_with_retry(port, &request, policy, &label, parse_segmentation)
            .await
            .map_err(|e| {
                AnalysisError::Segmentation(format!(
                    "{label} failed after {} attempts: {}",
                    e.attempts, e.last_error
                ))
            })?;
        debug!("{label}: {} raw blocks", done.value.len());
        raw.extend(done.value);
    }

    let blocks = standardize(raw);
    if blocks.is_empty() {
        return Err(AnalysisError::Segmentation(
            "no non-empty blocks in segmentation response".to_string(),
        ));
    }

    info!("Resume segmented into {} blocks", blocks.len());
    Ok(blocks)
}

/// Parses one page's answer; orders must be strictly increasing.
fn parse_segmentation(text: &str) -> Result<Vec<RawBlock>, CompletionError> {
    let response: SegmentationResponse = parse_json(text)?;

    if let Some(pair) = response
        .blocks
        .windows(2)
        .find(|pair| pair[1].order <= pair[0].order)
    {
        return Err(CompletionError::MalformedResponse(format!(
            "block order not increasing: {} then {}",
            pair[0].order, pair[1].order
        )));
    }

    Ok(response.blocks)
}

/// Drops blank blocks, folds repeated single-section types into their first
/// occurrence, and renumbers orders densely.
fn standardize(raw: Vec<RawBlock>) -> Vec<Block> {
    let mut sections: Vec<(BlockType, String)> = Vec::new();
    let mut first_seen: HashMap<BlockType, usize> = HashMap::new();

    for block in raw {
        let content = block.content.trim();
        if content.is_empty() {
            continue;
        }

        if !block.block_type.is_repeatable() {
            if let Some(&index) = first_seen.get(&block.block_type) {
                let existing = &mut sections[index].1;
                existing.push_str("\n\n");
                existing.push_str(content);
                continue;
            }
            first_seen.insert(block.block_type, sections.len());
        }
        sections.push((block.block_type, content.to_string()));
    }

    sections
        .into_iter()
        .enumerate()
        .map(|(order, (block_type, content))| Block::new(block_type, order, content))
        .collect()
}

/// Splits text into pages of at most `page_size_lines`, preferring to end a
/// page just after a blank line, an all-caps header, or a line ending in ':'.
fn split_into_pages(text: &str, config: &PipelineConfig) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= config.large_resume_threshold {
        return vec![text.to_string()];
    }

    let page_size = config.page_size_lines;
    let mut pages = Vec::new();
    let mut current: Vec<&str> = Vec::with_capacity(page_size);

    for line in lines {
        current.push(line);
        if current.len() < page_size {
            continue;
        }

        let lowest = current.len().saturating_sub(BREAK_LOOKBACK_LINES) + 1;
        let break_point = (lowest..current.len())
            .rev()
            .find(|&j| is_natural_break(current[j]))
            .map(|j| j + 1)
            .unwrap_or(current.len());

        push_page(&mut pages, &current[..break_point]);
        current.drain(..break_point);
    }
    push_page(&mut pages, &current);

    pages
}

fn push_page(pages: &mut Vec<String>, lines: &[&str]) {
    let page = lines.join("\n");
    if !page.trim().is_empty() {
        pages.push(page.trim().to_string());
    }
}

fn is_natural_break(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.ends_with(':') {
        return true;
    }
    let mut letters = line.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm_client::testing::{Scripted, ScriptedCompletion};

    const RESUME: &str = "John Doe | Yerevan, Armenia\n\n\
                          Senior Developer, Acme 2020-2023\n\n\
                          Skills: Rust, Go";

    fn raw(block_type: BlockType, order: u32, content: &str) -> RawBlock {
        RawBlock {
            block_type,
            order,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_standardize_renumbers_and_drops_blank() {
        let blocks = standardize(vec![
            raw(BlockType::Summary, 0, "John Doe"),
            raw(BlockType::Projects, 3, "Acme"),
            raw(BlockType::Education, 5, "   "),
            raw(BlockType::Projects, 9, "Globex"),
        ]);
        let orders: Vec<usize> = blocks.iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(blocks[2].content, "Globex");
    }

    #[test]
    fn test_standardize_folds_repeated_sections() {
        let blocks = standardize(vec![
            raw(BlockType::Skills, 0, "Rust"),
            raw(BlockType::Projects, 1, "Acme"),
            raw(BlockType::Skills, 2, "Go"),
        ]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_type, BlockType::Skills);
        assert_eq!(blocks[0].content, "Rust\n\nGo");
        assert_eq!(blocks[1].order, 1);
    }

    #[test]
    fn test_parse_rejects_non_monotonic_order() {
        let result = parse_segmentation(
            r#"{"blocks": [{"type": "summary", "order": 1, "content": "a"},
                           {"type": "skills", "order": 1, "content": "b"}]}"#,
        );
        assert!(matches!(result, Err(CompletionError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_rejects_missing_type() {
        let result = parse_segmentation(r#"{"blocks": [{"order": 0, "content": "a"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_short_text_is_single_page() {
        let config = PipelineConfig::default();
        assert_eq!(split_into_pages(RESUME, &config).len(), 1);
    }

    #[test]
    fn test_large_text_paged_at_natural_breaks() {
        let config = PipelineConfig {
            large_resume_threshold: 10,
            page_size_lines: 6,
            ..PipelineConfig::default()
        };
        let text = "a\nb\nEXPERIENCE\nc\nd\ne\nf\ng\nh\ni\nj\nk";
        let pages = split_into_pages(text, &config);
        assert_eq!(pages[0], "a\nb\nEXPERIENCE");
        assert_eq!(pages.concat().replace('\n', ""), text.replace('\n', ""));
        assert!(pages
            .iter()
            .all(|p| p.lines().count() <= config.page_size_lines));
    }

    #[test]
    fn test_natural_break_detection() {
        assert!(is_natural_break(""));
        assert!(is_natural_break("WORK EXPERIENCE"));
        assert!(is_natural_break("Education:"));
        assert!(!is_natural_break("Senior Developer"));
        assert!(!is_natural_break("2020 - 2023"));
    }

    #[tokio::test]
    async fn test_segment_produces_contiguous_orders() {
        let port = Arc::new(ScriptedCompletion::new(|_, _| {
            Scripted::ok(
                r#"```json
                {"blocks": [
                    {"type": "summary", "order": 0, "content": "John Doe | Yerevan, Armenia"},
                    {"type": "projects", "order": 2, "content": "Senior Developer, Acme 2020-2023"},
                    {"type": "skills", "order": 5, "content": "Skills: Rust, Go"}
                ]}
                ```"#,
            )
        }));

        let blocks = segment(port.as_ref(), &PipelineConfig::default(), RESUME)
            .await
            .unwrap();

        let orders: Vec<usize> = blocks.iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(blocks[1].block_type, BlockType::Projects);
        assert_eq!(port.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_segment_empty_input_fails_without_calling_port() {
        let port = ScriptedCompletion::new(|_, _| Scripted::ok("{}"));
        let result = segment(&port, &PipelineConfig::default(), "   \n ").await;
        assert!(matches!(result, Err(AnalysisError::Segmentation(_))));
        assert_eq!(port.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_segment_unparseable_response_is_fatal() {
        let port = ScriptedCompletion::new(|_, _| Scripted::ok("I cannot help with that."));
        let result = segment(&port, &PipelineConfig::default(), RESUME).await;
        assert!(matches!(result, Err(AnalysisError::Segmentation(_))));
        assert_eq!(port.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_segment_all_blank_blocks_is_fatal() {
        let port = ScriptedCompletion::new(|_, _| {
            Scripted::ok(r#"{"blocks": [{"type": "summary", "order": 0, "content": " "}]}"#)
        });
        let result = segment(&port, &PipelineConfig::default(), RESUME).await;
        assert!(matches!(result, Err(AnalysisError::Segmentation(_))));
    }

    #[tokio::test]
    async fn test_segment_pages_are_combined() {
        let config = PipelineConfig {
            large_resume_threshold: 4,
            page_size_lines: 3,
            ..PipelineConfig::default()
        };
        let text = "SUMMARY\nJane\nSKILLS\nRust\nGo\nSKILLS\nKafka";
        let port = ScriptedCompletion::new(|prompt, _| {
            if prompt.contains("Jane") {
                Scripted::ok(
                    r#"{"blocks": [{"type": "summary", "order": 0, "content": "Jane"},
                                   {"type": "skills", "order": 1, "content": "Rust"}]}"#,
                )
            } else {
                Scripted::ok(r#"{"blocks": [{"type": "skills", "order": 0, "content": "Kafka"}]}"#)
            }
        });

        let blocks = segment(&port, &config, text).await.unwrap();

        assert!(port.total_calls() >= 2);
        let skills: Vec<_> = blocks
            .iter()
            .filter(|b| b.block_type == BlockType::Skills)
            .collect();
        assert_eq!(skills.len(), 1);
        assert!(skills[0].content.contains("Rust") && skills[0].content.contains("Kafka"));
        assert_eq!(blocks.last().unwrap().order, blocks.len() - 1);
    }
}
