use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::configs::Config;
use crate::core::upstream::UpstreamStore;
use crate::registry::LinkRegistry;

/// Top-level application state shared across every request, grounded on
/// the teacher's `AppState` (same role: one `Arc<AppState>` handed to
/// every axum handler via `with_state`).
pub struct AppState {
    pub registry: Arc<dyn LinkRegistry>,
    pub upstream: Arc<dyn UpstreamStore>,
    pub config: Config,
    /// Global admission gate: caps concurrently in-flight streaming
    /// responses so `workers_per_request * concurrent_requests` stays
    /// within the upstream connection pool's capacity (spec §5).
    pub stream_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(registry: Arc<dyn LinkRegistry>, upstream: Arc<dyn UpstreamStore>, config: Config) -> Self {
        let permits = config.streaming.max_concurrent_streams;
        Self {
            registry,
            upstream,
            config,
            stream_semaphore: Arc::new(Semaphore::new(permits)),
        }
    }
}
