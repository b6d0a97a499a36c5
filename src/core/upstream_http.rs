use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use reqwest::{Client, StatusCode, header};

use super::block::BLOCK_SIZE;
use super::upstream::{BlockStream, ObjectLocator, ObjectMetadata, UpstreamError, UpstreamStore};

/// A concrete `UpstreamStore` backed by plain HTTP range GETs, grounded on
/// the probe-then-fetch pattern of `SegmentedRemoteReader`/`HttpSource`:
/// a zero-length probe request to discover size and content type, then one
/// `Range: bytes=..` GET per batch. `ObjectLocator.container` is treated as
/// the base URL to fetch against, `object_id` is appended as a path segment
/// — a stand-in for the real chat-store transport named in the upstream
/// collaborator interface.
pub struct HttpRangeUpstream {
    client: Client,
}

impl HttpRangeUpstream {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn url_for(locator: &ObjectLocator) -> String {
        format!(
            "{}/{}",
            locator.container.trim_end_matches('/'),
            locator.object_id.trim_start_matches('/')
        )
    }

    fn classify_status(status: StatusCode, retry_after_s: Option<f64>) -> UpstreamError {
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            UpstreamError::NotFound
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            UpstreamError::RateLimited {
                retry_after_s: retry_after_s.unwrap_or(1.0),
            }
        } else if status.is_server_error() {
            UpstreamError::Transient(format!("upstream status {status}"))
        } else {
            UpstreamError::Fatal(format!("upstream status {status}"))
        }
    }

    fn parse_retry_after(headers: &header::HeaderMap) -> Option<f64> {
        headers
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok())
    }
}

#[async_trait]
impl UpstreamStore for HttpRangeUpstream {
    async fn lookup(&self, locator: &ObjectLocator) -> Result<ObjectMetadata, UpstreamError> {
        let url = Self::url_for(locator);
        let resp = self
            .client
            .get(&url)
            .header(header::RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| UpstreamError::Transient(e.to_string()))?;

        if !resp.status().is_success() && resp.status() != StatusCode::PARTIAL_CONTENT {
            let retry_after = Self::parse_retry_after(resp.headers());
            return Err(Self::classify_status(resp.status(), retry_after));
        }

        let size_bytes = resp
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|v| v.parse::<u64>().ok())
            .or_else(|| resp.content_length())
            .ok_or_else(|| UpstreamError::Fatal("upstream did not report object size".into()))?;

        let mime_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ObjectMetadata { size_bytes, mime_type })
    }

    fn read_blocks(&self, locator: ObjectLocator, start_block: u64, block_count: u64) -> BlockStream {
        let client = self.client.clone();
        let url = Self::url_for(&locator);
        let start = start_block * BLOCK_SIZE;
        let len = block_count * BLOCK_SIZE;
        let end = start + len - 1;
        let range = format!("bytes={start}-{end}");

        Box::pin(stream::once(async move {
            let resp = client
                .get(&url)
                .header(header::RANGE, range)
                .send()
                .await
                .map_err(|e| UpstreamError::Transient(e.to_string()))?;

            if !resp.status().is_success() && resp.status() != StatusCode::PARTIAL_CONTENT {
                let retry_after = Self::parse_retry_after(resp.headers());
                return Err(Self::classify_status(resp.status(), retry_after));
            }

            Ok(resp)
        }))
        .flat_map(|result: Result<reqwest::Response, UpstreamError>| match result {
            Ok(resp) => resp
                .bytes_stream()
                .map(|chunk: Result<Bytes, reqwest::Error>| {
                    chunk.map_err(|e| UpstreamError::Transient(e.to_string()))
                })
                .boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        })
        .boxed()
    }
}
