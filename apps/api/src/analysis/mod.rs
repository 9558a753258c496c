// Resume analysis pipeline.
// Segmenter → Block Processor → {Skill Merger, Experience Calculator} → Aggregator.
// Every completion call goes through the CompletionPort; nothing here talks HTTP.

pub mod aggregator;
pub mod block_processor;
pub mod experience;
pub mod handlers;
pub mod prompts;
pub mod segmenter;
pub mod skill_merger;

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::time::Instant;
use tracing::info;

use crate::config::PipelineConfig;
use crate::document::{self, DocumentError};
use crate::llm_client::CompletionPort;
use crate::models::analysis::AnalysisResult;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    InputValidation(#[from] DocumentError),

    #[error("segmentation failed: {0}")]
    Segmentation(String),

    #[error("block processing failed: {0}")]
    BlockProcessing(String),

    #[error("aggregation failed: {0}")]
    Aggregation(String),
}

/// Runs the full pipeline over already-extracted resume text.
///
/// `pipeline_timeout` bounds segmentation and block processing together;
/// blocks still pending at the deadline are dropped from the result.
pub async fn analyze_text(
    port: Arc<dyn CompletionPort>,
    config: &PipelineConfig,
    text: &str,
    today: NaiveDate,
) -> Result<AnalysisResult, AnalysisError> {
    let started = Instant::now();
    let deadline = started + config.pipeline_timeout;

    let blocks = tokio::time::timeout_at(deadline, segmenter::segment(port.as_ref(), config, text))
        .await
        .map_err(|_| {
            AnalysisError::Segmentation(format!(
                "pipeline deadline of {}s reached during segmentation",
                config.pipeline_timeout.as_secs()
            ))
        })??;

    let processed = block_processor::process_blocks(port, config, blocks, deadline).await?;
    let result = aggregator::aggregate(&processed.results, today)?;

    info!(
        "Analysis complete in {}ms ({} of {} blocks used)",
        started.elapsed().as_millis(),
        processed.report.succeeded,
        processed.report.total
    );
    Ok(result)
}

/// Extracts, normalizes and analyzes an uploaded document.
pub async fn analyze_document(
    port: Arc<dyn CompletionPort>,
    config: &PipelineConfig,
    bytes: Bytes,
    mime: &str,
    today: NaiveDate,
) -> Result<AnalysisResult, AnalysisError> {
    let chunks = document::extract(bytes, mime).await?;
    let text = document::normalize_text(&chunks.join("\n\n"));
    if text.is_empty() {
        return Err(DocumentError::Empty.into());
    }

    info!(
        "Document text ready: {} chars, {} lines",
        text.len(),
        text.lines().count()
    );
    analyze_text(port, config, &text, today).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm_client::testing::{Scripted, ScriptedCompletion};

    const RESUME: &str = "Jane Roe, Yerevan\nOpen to remote work\n\n\
        Backend Developer, Acme, 2020-01 to 2021-10\n\n\
        Engineering Manager, Globex, 2021-06 to 2023-06\n\n\
        Skills: ElasticSearch, Go";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn scripted_resume() -> ScriptedCompletion {
        ScriptedCompletion::new(|prompt, _| {
            if prompt.contains("Divide the resume") {
                return Scripted::ok(
                    r#"{"blocks": [
                        {"type": "summary", "order": 0,
                         "content": "Jane Roe, Yerevan\nOpen to remote work"},
                        {"type": "projects", "order": 1,
                         "content": "Backend Developer, Acme, 2020-01 to 2021-10"},
                        {"type": "projects", "order": 2,
                         "content": "Engineering Manager, Globex, 2021-06 to 2023-06"},
                        {"type": "skills", "order": 3, "content": "Skills: ElasticSearch, Go"}
                    ]}"#,
                );
            }
            if prompt.contains("Skills: ElasticSearch") {
                Scripted::ok(
                    r#"{"skills": [{"name": "ElasticSearch", "score": 95},
                                   {"name": "Go", "score": 60}]}"#,
                )
            } else if prompt.contains("Acme") {
                Scripted::ok(
                    r#"{"skills": [{"name": "ElasticSearch", "score": 20}],
                        "roles": [{"title": "Backend Developer", "employer": "Acme",
                                   "start": "2020-01", "end": "2021-10"}]}"#,
                )
            } else if prompt.contains("Globex") {
                Scripted::ok("Sorry, I lost my train of thought.")
            } else {
                Scripted::ok(r#"{"location": "Yerevan", "ready_to_remote": true}"#)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_degrades_on_failed_block() {
        let port = Arc::new(scripted_resume());

        let result = analyze_text(port, &PipelineConfig::default(), RESUME, today())
            .await
            .unwrap();

        assert_eq!(result.roles.len(), 1);
        assert_eq!(result.roles[0].employer, "Acme");
        assert_eq!(result.experience, "1+ year");
        assert_eq!(result.location, "Yerevan");
        assert!(result.ready_to_remote);
        assert_eq!(result.skills_from_resume.len(), 3);
        assert_eq!(result.skills_merged[0].name, "ElasticSearch");
        assert_eq!(result.skills_merged[0].score, 95);
        assert_eq!(result.skills_merged[0].merged, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_segmentation_deadline() {
        let port = Arc::new(ScriptedCompletion::new(|_, _| {
            Scripted::ok("{}").after(Duration::from_secs(3600))
        }));
        let config = PipelineConfig {
            request_timeout: Duration::from_secs(7200),
            pipeline_timeout: Duration::from_secs(60),
            ..PipelineConfig::default()
        };

        let result = analyze_text(port, &config, RESUME, today()).await;
        assert!(matches!(result, Err(AnalysisError::Segmentation(_))));
    }

    #[tokio::test]
    async fn test_blank_document_rejected_before_any_call() {
        let port = Arc::new(ScriptedCompletion::new(|_, _| Scripted::ok("{}")));

        let result = analyze_document(
            port.clone(),
            &PipelineConfig::default(),
            Bytes::from_static(b" \r\n\t\n"),
            document::MIME_TEXT,
            today(),
        )
        .await;

        assert!(matches!(
            result,
            Err(AnalysisError::InputValidation(DocumentError::Empty))
        ));
        assert_eq!(port.total_calls(), 0);
    }
}
