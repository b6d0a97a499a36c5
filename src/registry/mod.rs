pub mod memory;
pub mod token;

pub use memory::InMemoryLinkRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::common::LinkGateError;
use crate::configs::ServerConfig;
use crate::core::upstream::ObjectLocator;

/// A persisted token → object mapping (spec §3 "Link record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub token: String,
    pub locator: ObjectLocator,
    pub file_name: Option<String>,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl LinkRecord {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Synthesizes a self-referential stream URL for this token, for use
    /// by callers outside the streaming core (e.g. a bot layer posting a
    /// link). The streaming path itself never calls this.
    pub fn public_url(&self, server: &ServerConfig) -> String {
        let base = server
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", server.host, server.port));
        format!("{}/stream/{}", base.trim_end_matches('/'), self.token)
    }
}

/// C4 — Link Registry. Storage-agnostic so the sweep/eviction strategy can
/// be swapped (e.g. for a real database-backed TTL index) without touching
/// C5. `InMemoryLinkRegistry` is the one shipped implementation.
#[async_trait]
pub trait LinkRegistry: Send + Sync {
    /// Idempotent on `token`; fails with `LinkGateError::Conflict` if the
    /// token already has a live (non-expired) record.
    async fn save(
        &self,
        token: String,
        locator: ObjectLocator,
        file_name: Option<String>,
        size_bytes: u64,
        mime_type: Option<String>,
        expires_at: OffsetDateTime,
    ) -> Result<LinkRecord, LinkGateError>;

    /// Returns `NotFound` for absent tokens and for tokens whose
    /// `expires_at` has already passed, even if not yet swept.
    async fn get(&self, token: &str) -> Result<LinkRecord, LinkGateError>;

    /// No-op if the token is absent.
    async fn delete(&self, token: &str);

    /// Bulk purge; returns the number of records removed.
    async fn delete_all(&self) -> u64;

    async fn count(&self) -> u64;

    async fn list(&self, skip: usize, limit: usize) -> Vec<LinkRecord>;
}
