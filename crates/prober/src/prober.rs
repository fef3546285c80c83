use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::{
    Identifier, IdentifierTemplate, PacingPolicy, PageFetcher, ProbeCandidate, ProbeResult, Result,
};

/// Receives `(settled, total)` after every chunk.
pub trait ProgressSink: Send + Sync {
    fn chunk_settled(&self, settled: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn chunk_settled(&self, settled: usize, total: usize) {
        self(settled, total)
    }
}

/// Runs probes in fixed-size chunks: every probe in a chunk is in flight at
/// once, and the chunk fully settles before the next one starts.
#[derive(Clone)]
pub struct BatchProber {
    fetcher: Arc<dyn PageFetcher>,
    pacing: Arc<dyn PacingPolicy>,
    concurrency_limit: usize,
}

impl BatchProber {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        pacing: Arc<dyn PacingPolicy>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            fetcher,
            pacing,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.fetcher
    }

    /// Templates every identifier into `base_url` and probes the lot.
    pub async fn probe_all(
        &self,
        template: &IdentifierTemplate,
        base_url: &str,
        identifiers: &[Identifier],
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Vec<ProbeResult>> {
        let candidates = identifiers
            .iter()
            .map(|identifier| ProbeCandidate::from_identifier(template, base_url, identifier))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.probe_candidates(candidates, progress).await)
    }

    /// One result per candidate, in candidate order.
    pub async fn probe_candidates(
        &self,
        candidates: Vec<ProbeCandidate>,
        progress: Option<&dyn ProgressSink>,
    ) -> Vec<ProbeResult> {
        let total = candidates.len();
        let chunk_count = total.div_ceil(self.concurrency_limit);
        let mut results = Vec::with_capacity(total);
        let started = Instant::now();

        for (index, chunk) in candidates.chunks(self.concurrency_limit).enumerate() {
            let outcomes = join_all(chunk.iter().map(|candidate| self.fetcher.fetch(&candidate.url))).await;

            let priced = outcomes.iter().filter(|o| o.price().is_some()).count();
            results.extend(
                chunk
                    .iter()
                    .cloned()
                    .zip(outcomes)
                    .map(|(candidate, outcome)| ProbeResult::new(candidate, outcome)),
            );

            debug!(
                chunk = index + 1,
                chunks = chunk_count,
                size = chunk.len(),
                priced,
                "Chunk settled"
            );

            if let Some(progress) = progress {
                progress.chunk_settled(results.len(), total);
            }

            if index + 1 < chunk_count {
                let delay = self.pacing.delay_after(index);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        info!(
            probes = total,
            chunks = chunk_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch complete"
        );

        results
    }
}
