//! Parallel record decoding for large result sets
//!
//! Records are split into contiguous chunks, decoded on scoped worker
//! threads and handed back in input order, so output stays identical to a
//! sequential run.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Execution statistics for a batch run
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExecutionStats {
    pub total_records: usize,
    pub failed_attributes: usize,
    pub workers: usize,
    pub total_duration_ms: u64,
}

/// Configuration for parallel execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Maximum worker threads; 1 decodes on the calling thread
    pub max_concurrency: usize,
    /// Batches smaller than this are decoded sequentially
    pub min_batch_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            min_batch_size: 64,
        }
    }
}

pub struct ParallelExecutor {
    config: ParallelConfig,
}

impl ParallelExecutor {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    /// Number of workers a batch of `len` items would use
    pub fn workers_for(&self, len: usize) -> usize {
        if len < self.config.min_batch_size.max(2) {
            1
        } else {
            self.config.max_concurrency.clamp(1, len)
        }
    }

    /// Apply `op` to every item, possibly in parallel, keeping input order.
    ///
    /// A panic in a worker is resumed on the calling thread.
    pub fn map_ordered<T, R, F>(&self, items: &[T], op: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        let start = Instant::now();
        let workers = self.workers_for(items.len());

        if workers <= 1 {
            return items.iter().map(&op).collect();
        }

        let chunk_size = items.len().div_ceil(workers);
        let op = &op;

        let results: Vec<R> = std::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || chunk.iter().map(op).collect::<Vec<R>>()))
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        });

        debug!(
            "Decoded {} records on {} workers in {}ms",
            items.len(),
            workers,
            start.elapsed().as_millis()
        );
        results
    }
}
