use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::debug;

use super::{LinkRecord, LinkRegistry};
use crate::common::LinkGateError;
use crate::core::upstream::ObjectLocator;

/// `DashMap`-backed link registry, grounded directly on the teacher's
/// `AppState.sessions: DashMap<String, Arc<Session>>`. A background sweep
/// task removes expired entries on an interval, playing the role of the
/// Mongo TTL index the original source used for its `users` collection;
/// `get` also performs the synchronous expiry check the spec requires so
/// correctness never depends on the sweep having run yet.
pub struct InMemoryLinkRegistry {
    records: DashMap<String, LinkRecord>,
}

impl InMemoryLinkRegistry {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Spawns the background sweeper. Returns the `JoinHandle` so callers
    /// may abort it on shutdown; dropping the handle leaves the task
    /// running detached, which is fine for the life of the process.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let now = OffsetDateTime::now_utc();
                let before = this.records.len();
                this.records.retain(|_, record| !record.is_expired(now));
                let evicted = before - this.records.len();
                if evicted > 0 {
                    debug!(evicted, "swept expired link records");
                }
            }
        })
    }
}

impl Default for InMemoryLinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkRegistry for InMemoryLinkRegistry {
    async fn save(
        &self,
        token: String,
        locator: ObjectLocator,
        file_name: Option<String>,
        size_bytes: u64,
        mime_type: Option<String>,
        expires_at: OffsetDateTime,
    ) -> Result<LinkRecord, LinkGateError> {
        let now = OffsetDateTime::now_utc();

        if let Some(existing) = self.records.get(&token) {
            if !existing.is_expired(now) {
                return Err(LinkGateError::Conflict);
            }
        }

        let record = LinkRecord {
            token: token.clone(),
            locator,
            file_name,
            size_bytes,
            mime_type,
            created_at: now,
            expires_at,
        };
        self.records.insert(token, record.clone());
        Ok(record)
    }

    async fn get(&self, token: &str) -> Result<LinkRecord, LinkGateError> {
        let record = self
            .records
            .get(token)
            .map(|r| r.value().clone())
            .ok_or(LinkGateError::NotFound)?;

        if record.is_expired(OffsetDateTime::now_utc()) {
            return Err(LinkGateError::NotFound);
        }
        Ok(record)
    }

    async fn delete(&self, token: &str) {
        self.records.remove(token);
    }

    async fn delete_all(&self) -> u64 {
        let count = self.records.len() as u64;
        self.records.clear();
        count
    }

    async fn count(&self) -> u64 {
        let now = OffsetDateTime::now_utc();
        self.records.iter().filter(|r| !r.is_expired(now)).count() as u64
    }

    async fn list(&self, skip: usize, limit: usize) -> Vec<LinkRecord> {
        let now = OffsetDateTime::now_utc();
        let mut records: Vec<LinkRecord> = self
            .records
            .iter()
            .filter(|r| !r.is_expired(now))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records.into_iter().skip(skip).take(limit).collect()
    }
}
