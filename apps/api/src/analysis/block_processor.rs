//! Block processor: one completion call per block, at most K in flight.
//!
//! Each block is retried independently. A block that still fails after its
//! retries is excluded from the result set; the run only fails when no
//! block succeeds at all.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::analysis::prompts::template_for;
use crate::analysis::AnalysisError;
use crate::config::PipelineConfig;
use crate::llm_client::prompts::render;
use crate::llm_client::retry::{complete_with_retry, RetryPolicy};
use crate::llm_client::{parse_json, CompletionError, CompletionPort, CompletionRequest};
use crate::models::analysis::{
    BlockResult, EducationPayload, LanguagesPayload, ProjectsPayload, SkillsPayload,
    SummaryPayload,
};
use crate::models::block::{Block, BlockType};

/// Per-run counters, logged once the run finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingReport {
    pub total: usize,
    pub succeeded: usize,
    /// Blocks that succeeded only after at least one retry.
    pub retried: usize,
    pub excluded: usize,
    /// Blocks still pending when the pipeline deadline passed.
    pub cancelled: usize,
}

#[derive(Debug)]
pub struct ProcessedBlocks {
    /// Successful results in block order.
    pub results: Vec<BlockResult>,
    pub report: ProcessingReport,
}

enum Outcome {
    Succeeded { attempts: u32, result: BlockResult },
    Excluded { attempts: u32, error: CompletionError },
}

/// What a block task hands back: its slot, log label and outcome.
type Joined = (usize, String, Outcome);

/// Processes all blocks concurrently, bounded by `max_concurrent_requests`.
///
/// Tasks still running at `deadline` are aborted and counted as cancelled;
/// whatever finished before then is kept.
pub async fn process_blocks(
    port: Arc<dyn CompletionPort>,
    config: &PipelineConfig,
    blocks: Vec<Block>,
    deadline: Instant,
) -> Result<ProcessedBlocks, AnalysisError> {
    let mut report = ProcessingReport {
        total: blocks.len(),
        ..ProcessingReport::default()
    };
    if blocks.is_empty() {
        return Err(AnalysisError::BlockProcessing(
            "no blocks to process".to_string(),
        ));
    }

    let limiter = Arc::new(Semaphore::new(config.max_concurrent_requests));
    let policy = RetryPolicy::from_config(config);
    let mut tasks: JoinSet<Joined> = JoinSet::new();

    for (slot, block) in blocks.iter().enumerate() {
        let port = Arc::clone(&port);
        let limiter = Arc::clone(&limiter);
        let request = CompletionRequest {
            prompt: render(template_for(block.block_type), &block.content),
            params: config.generation.for_block(block.block_type),
            timeout: config.request_timeout,
        };
        let block_type = block.block_type;
        let label = format!("block {} ({})", block.order, block_type);

        tasks.spawn(async move {
            let outcome = match limiter.acquire_owned().await {
                Ok(_permit) => {
                    match complete_with_retry(port.as_ref(), &request, policy, &label, |text| {
                        parse_block(block_type, text)
                    })
                    .await
                    {
                        Ok(done) => Outcome::Succeeded {
                            attempts: done.attempts,
                            result: done.value,
                        },
                        Err(exhausted) => Outcome::Excluded {
                            attempts: exhausted.attempts,
                            error: exhausted.last_error,
                        },
                    }
                }
                Err(_) => Outcome::Excluded {
                    attempts: 0,
                    error: CompletionError::ConnectionFailure("request limiter closed".into()),
                },
            };
            (slot, label, outcome)
        });
    }

    let mut slots: Vec<Option<BlockResult>> = vec![None; blocks.len()];
    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(joined)) => record(joined, &mut slots, &mut report),
            Ok(None) => break,
            Err(_) => {
                cancel_pending(&mut tasks, &mut slots, &mut report);
                break;
            }
        }
    }

    info!(
        "Block processing finished: {} succeeded ({} after retry), {} excluded, {} cancelled of {}",
        report.succeeded, report.retried, report.excluded, report.cancelled, report.total
    );

    if report.succeeded == 0 {
        return Err(AnalysisError::BlockProcessing(format!(
            "all {} blocks failed",
            report.total
        )));
    }

    Ok(ProcessedBlocks {
        results: slots.into_iter().flatten().collect(),
        report,
    })
}

fn record(
    joined: Result<Joined, JoinError>,
    slots: &mut [Option<BlockResult>],
    report: &mut ProcessingReport,
) {
    match joined {
        Ok((slot, label, Outcome::Succeeded { attempts, result })) => {
            info!("{label}: processed in {attempts} attempt(s)");
            report.succeeded += 1;
            if attempts > 1 {
                report.retried += 1;
            }
            slots[slot] = Some(result);
        }
        Ok((_, label, Outcome::Excluded { attempts, error })) => {
            warn!("{label}: excluded after {attempts} attempt(s): {error}");
            report.excluded += 1;
        }
        Err(join_error) => {
            error!("Block task failed to complete: {join_error}");
            report.excluded += 1;
        }
    }
}

/// Keeps tasks that finished but were not yet joined, then aborts the rest.
fn cancel_pending(
    tasks: &mut JoinSet<Joined>,
    slots: &mut [Option<BlockResult>],
    report: &mut ProcessingReport,
) {
    while let Some(joined) = tasks.try_join_next() {
        record(joined, slots, report);
    }
    report.cancelled = tasks.len();
    warn!(
        "Pipeline deadline reached, cancelling {} pending block(s)",
        report.cancelled
    );
    tasks.abort_all();
}

/// Parses a completion into the payload shape its block type expects.
fn parse_block(block_type: BlockType, text: &str) -> Result<BlockResult, CompletionError> {
    let result = match block_type {
        BlockType::Projects => BlockResult::Projects(parse_json::<ProjectsPayload>(text)?),
        BlockType::Skills => BlockResult::Skills(parse_json::<SkillsPayload>(text)?),
        BlockType::Education => BlockResult::Education(parse_json::<EducationPayload>(text)?),
        BlockType::Languages => BlockResult::Languages(parse_json::<LanguagesPayload>(text)?),
        BlockType::Summary => BlockResult::Summary(parse_json::<SummaryPayload>(text)?),
    };
    Ok(result.sanitized())
}
