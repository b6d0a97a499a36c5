use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use super::block::BLOCK_SIZE;
use super::upstream::{BlockStream, ObjectLocator, ObjectMetadata, UpstreamError, UpstreamStore};

/// A byte-slice-backed `UpstreamStore`, for tests and local fixtures that
/// need a real implementation of the C1 contract without a network hop.
/// `object_id` is used as the lookup key; `container` is ignored.
///
/// Not used by the production binary — wired up only from test code and
/// from any future local-disk deployment of the gateway.
#[derive(Default)]
pub struct InMemoryUpstream {
    objects: Mutex<HashMap<String, (Bytes, Option<String>)>>,
}

impl InMemoryUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, object_id: impl Into<String>, data: impl Into<Bytes>, mime_type: Option<String>) {
        self.objects.lock().unwrap().insert(object_id.into(), (data.into(), mime_type));
    }
}

#[async_trait]
impl UpstreamStore for InMemoryUpstream {
    async fn lookup(&self, locator: &ObjectLocator) -> Result<ObjectMetadata, UpstreamError> {
        let objects = self.objects.lock().unwrap();
        let (data, mime_type) = objects.get(&locator.object_id).ok_or(UpstreamError::NotFound)?;
        Ok(ObjectMetadata {
            size_bytes: data.len() as u64,
            mime_type: mime_type.clone(),
        })
    }

    fn read_blocks(&self, locator: ObjectLocator, start_block: u64, block_count: u64) -> BlockStream {
        let data = {
            let objects = self.objects.lock().unwrap();
            objects.get(&locator.object_id).map(|(d, _)| d.clone())
        };

        let Some(data) = data else {
            return Box::pin(stream::once(async { Err(UpstreamError::NotFound) }));
        };

        let start = (start_block.saturating_mul(BLOCK_SIZE)).min(data.len() as u64) as usize;
        let end = ((start_block + block_count).saturating_mul(BLOCK_SIZE)).min(data.len() as u64) as usize;
        let slice = data.slice(start..end);
        Box::pin(stream::once(async move { Ok(slice) }))
    }
}
