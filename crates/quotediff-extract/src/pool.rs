//! Bounded extraction pool.
//!
//! Every backend call holds a permit from one shared semaphore, so the
//! worker count bounds in-flight calls across all documents of a run.
//! Calls get a per-call timeout and exponential-backoff retries; the whole
//! batch runs under a single deadline. Results come back in block order
//! regardless of completion order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use quotediff_core::{
    DiffConfig, Error, ExtractionSchema, Record, UnresolvedBlock, UnresolvedReason,
};
use quotediff_ingest::Block;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{assemble, ExtractionBackend};

/// Backoff never grows past this multiple of the base delay.
const MAX_BACKOFF_FACTOR: u32 = 8;

/// Retry and timeout settings for backend calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub base_backoff: Duration,
    pub timeout_per_call: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DiffConfig) -> Self {
        Self {
            retries: config.retry_count,
            base_backoff: config.retry_backoff(),
            timeout_per_call: config.timeout_per_call(),
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry).min(MAX_BACKOFF_FACTOR);
        self.base_backoff * factor
    }
}

/// What became of one block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Resolved(Record),
    Unresolved(UnresolvedBlock),
}

/// Shared worker pool. Clones share the same permits.
#[derive(Clone)]
pub struct ExtractionPool {
    backend: Arc<dyn ExtractionBackend>,
    permits: Arc<Semaphore>,
    worker_count: usize,
    policy: RetryPolicy,
    schema: Arc<ExtractionSchema>,
}

impl ExtractionPool {
    pub fn new(
        backend: Arc<dyn ExtractionBackend>,
        worker_count: usize,
        policy: RetryPolicy,
        schema: ExtractionSchema,
    ) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            backend,
            permits: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            policy,
            schema: Arc::new(schema),
        }
    }

    pub fn from_config(backend: Arc<dyn ExtractionBackend>, config: &DiffConfig) -> Self {
        Self::new(
            backend,
            config.worker_count,
            RetryPolicy::from_config(config),
            ExtractionSchema::default(),
        )
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Extract every block. The result has one outcome per block, in block
    /// order. Blocks still pending at `deadline` come back as cancelled.
    pub async fn extract_blocks(&self, blocks: &[Block], deadline: Instant) -> Vec<BlockOutcome> {
        info!(
            "Extracting {} blocks with {} (workers={})",
            blocks.len(),
            self.backend.name(),
            self.worker_count
        );

        let tasks: Vec<_> = blocks
            .iter()
            .enumerate()
            .map(|(pos, block)| async move {
                let outcome =
                    match tokio::time::timeout_at(deadline, self.extract_one(block)).await {
                        Ok(outcome) => outcome,
                        Err(_) => BlockOutcome::Unresolved(unresolved(
                            block,
                            UnresolvedReason::Cancelled,
                            "run deadline elapsed".into(),
                        )),
                    };
                (pos, outcome)
            })
            .collect();

        let mut slots: Vec<Option<BlockOutcome>> = vec![None; blocks.len()];
        let mut finished = stream::iter(tasks).buffer_unordered(self.worker_count);
        while let Some((pos, outcome)) = finished.next().await {
            slots[pos] = Some(outcome);
        }

        let outcomes: Vec<BlockOutcome> = slots
            .into_iter()
            .zip(blocks)
            .map(|(slot, block)| {
                slot.unwrap_or_else(|| {
                    BlockOutcome::Unresolved(unresolved(
                        block,
                        UnresolvedReason::BackendFailed,
                        "no result produced".into(),
                    ))
                })
            })
            .collect();

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, BlockOutcome::Unresolved(_)))
            .count();
        info!(
            "Extraction done: {} resolved, {} unresolved",
            outcomes.len() - failed,
            failed
        );
        outcomes
    }

    async fn extract_one(&self, block: &Block) -> BlockOutcome {
        let mut retry = 0;
        loop {
            let result = match self.permits.acquire().await {
                Ok(_permit) => {
                    match tokio::time::timeout(
                        self.policy.timeout_per_call,
                        self.backend.extract(block, &self.schema),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(Error::BackendTimeout(
                            self.policy.timeout_per_call.as_millis() as u64,
                        )),
                    }
                }
                Err(e) => Err(Error::Internal(format!("worker pool closed: {}", e))),
            };

            let err = match result.and_then(|raw| assemble(block, raw, &self.schema)) {
                Ok(record) => {
                    debug!("Block {} resolved as {:?}", block.index, record.name);
                    return BlockOutcome::Resolved(record);
                }
                Err(e) => e,
            };

            if err.is_retryable() && retry < self.policy.retries {
                let delay = self.policy.delay(retry);
                warn!(
                    "Block {} attempt {} failed ({}), retrying in {:?}",
                    block.index,
                    retry + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                retry += 1;
                continue;
            }

            warn!("Block {} unresolved: {}", block.index, err);
            let reason = match &err {
                Error::Extraction { .. } => UnresolvedReason::MissingRequired,
                Error::BackendTimeout(_) => UnresolvedReason::TimedOut,
                _ => UnresolvedReason::BackendFailed,
            };
            return BlockOutcome::Unresolved(unresolved(block, reason, err.to_string()));
        }
    }
}

fn unresolved(block: &Block, reason: UnresolvedReason, detail: String) -> UnresolvedBlock {
    UnresolvedBlock {
        block_index: block.index,
        section: block.section.clone(),
        reason,
        detail,
        text: block.text.clone(),
    }
}
