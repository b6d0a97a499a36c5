use serde::{Deserialize, Serialize};

/// Tuning knobs for the ordered-multiplexer streaming pipeline (C2/C3).
///
/// The canonical block size is fixed at 1 MiB; it is still a field (rather
/// than a bare constant) so tests can shrink it without touching the
/// pipeline code.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StreamingConfig {
    pub block_size_bytes: u64,
    /// Blocks fetched per upstream call (K).
    pub batch_blocks_k: u64,
    /// Max ready-but-unconsumed blocks held in memory per stream (M).
    pub buffer_blocks_m: usize,
    /// Upper bound on worker count for a single stream (W_max).
    pub worker_cap_w_max: usize,
    /// Requests at or below this length use a single worker (W = 1).
    pub small_request_threshold_bytes: u64,
    /// Global cap on concurrently in-flight streaming responses.
    pub max_concurrent_streams: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            block_size_bytes: 1024 * 1024,
            batch_blocks_k: 4,
            buffer_blocks_m: 16,
            worker_cap_w_max: 4,
            small_request_threshold_bytes: 50 * 1024 * 1024,
            max_concurrent_streams: 64,
        }
    }
}

impl StreamingConfig {
    /// Computes `(worker_count, batch_blocks, buffer_blocks)` for a request
    /// of `request_len` bytes, per spec's adaptive-sizing rule: small
    /// requests stay single-worker, larger ones scale workers with length
    /// and shrink the per-request buffer/batch sizes to hold peak memory
    /// roughly constant.
    pub fn adaptive_sizing(&self, request_len: u64) -> (usize, u64, usize) {
        if request_len <= self.small_request_threshold_bytes {
            return (1, self.batch_blocks_k, self.buffer_blocks_m);
        }

        let wanted = request_len.div_ceil(self.small_request_threshold_bytes);
        let workers = (wanted as usize).clamp(1, self.worker_cap_w_max);

        // Scale buffer/batch down as workers scale up so that
        // worker_count * batch * block_size stays within the same rough
        // memory envelope as the W=1 case.
        let scale = workers.max(1) as u64;
        let batch = (self.batch_blocks_k / scale).max(1);
        let buffer = (self.buffer_blocks_m / workers.max(1)).max(workers);

        (workers, batch, buffer)
    }
}
