use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Opaque handle identifying one remote object within the upstream store.
/// The real chat-based object store addresses objects by a
/// (container, message) pair; `HttpRangeUpstream` below repurposes the same
/// shape as `(base_url, object_id)` so C2/C3 never need to change when the
/// real transport is swapped in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocator {
    pub container: String,
    pub object_id: String,
}

impl ObjectLocator {
    pub fn new(container: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            object_id: object_id.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub size_bytes: u64,
    pub mime_type: Option<String>,
}

/// The four failure modes an upstream fetch can surface (spec §4.1).
/// Kept as a closed enum rather than a boxed `dyn Error` since C2's retry
/// policy needs to match on the variant, not just log it.
#[derive(Debug, thiserror::Error, Clone)]
pub enum UpstreamError {
    #[error("rate limited, retry after {retry_after_s}s")]
    RateLimited { retry_after_s: f64 },

    #[error("transient transport failure: {0}")]
    Transient(String),

    #[error("object not found")]
    NotFound,

    #[error("fatal upstream error: {0}")]
    Fatal(String),
}

impl UpstreamError {
    /// Transient and rate-limited failures are worth retrying; `NotFound`
    /// and `Fatal` are not (spec §4.1).
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. } | UpstreamError::Transient(_))
    }
}

pub type BlockStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// C1 — Upstream Fetcher. A sequential, block-based reader of one remote
/// object. Implementations need only support forward sequential reads
/// starting at an arbitrary block index; C2 never re-reads a block it
/// already fetched from a given call.
#[async_trait]
pub trait UpstreamStore: Send + Sync {
    /// Resolves current size and MIME type for `locator`. Fails with
    /// `UpstreamError::NotFound` if the object no longer exists upstream.
    async fn lookup(&self, locator: &ObjectLocator) -> Result<ObjectMetadata, UpstreamError>;

    /// Produces a lazy, strictly-in-order byte stream covering
    /// `[start_block, start_block + block_count)`. The concatenation of all
    /// yielded fragments equals `min(block_count * B, size - start_block * B)`
    /// bytes; fragment boundaries need not align to `B`.
    fn read_blocks(&self, locator: ObjectLocator, start_block: u64, block_count: u64) -> BlockStream;
}
