use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::Stream;
use tokio::sync::OwnedSemaphorePermit;

use crate::common::{LinkGateError, LinkGateErrorBody};
use crate::core::{self, StreamError};
use crate::range::{self, RangeError};
use crate::server::AppState;

/// Holds the streaming-admission permit for the lifetime of the response
/// body, releasing it back to `AppState::stream_semaphore` when the body
/// is fully drained or the client disconnects and the stream is dropped.
struct PermitGuardedStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>,
    _permit: OwnedSemaphorePermit,
}

impl Stream for PermitGuardedStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.inner.as_mut().poll_next(cx)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Download,
    Stream,
}

impl Intent {
    fn disposition(&self) -> &'static str {
        match self {
            Intent::Download => "attachment",
            Intent::Stream => "inline",
        }
    }
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    serve(state, token, method, headers, Intent::Download).await
}

pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    serve(state, token, method, headers, Intent::Stream).await
}

async fn serve(
    state: Arc<AppState>,
    token: String,
    method: Method,
    headers: HeaderMap,
    intent: Intent,
) -> Response {
    let path = match intent {
        Intent::Download => format!("/dl/{token}"),
        Intent::Stream => format!("/stream/{token}"),
    };

    let record = match state.registry.get(&token).await {
        Ok(r) => r,
        Err(e) => return error_response(e, &path),
    };

    let meta = match state.upstream.lookup(&record.locator).await {
        Ok(m) => m,
        Err(_) => return error_response(LinkGateError::NotFound, &path),
    };

    let size = if meta.size_bytes > 0 { meta.size_bytes } else { record.size_bytes };
    let mime = meta
        .mime_type
        .or_else(|| record.mime_type.clone())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    let resolved = match range_header {
        None => None,
        Some(raw) => match range::parse_range_header(raw).and_then(|spec| range::resolve(spec, size)) {
            Ok(r) => Some(r),
            // Multi-range requests are one of the two behaviors spec §4.5
            // step 3 explicitly permits for them; reuse the same 416 path
            // as an out-of-bounds single range rather than inventing a
            // status code the spec's taxonomy never lists.
            Err(RangeError::Unsatisfiable | RangeError::MultiRange) => {
                return unsatisfiable_response(size);
            }
            Err(_) => {
                return error_response(LinkGateError::InvalidRange(raw.to_string()), &path);
            }
        },
    };

    let (status, offset, limit) = match resolved {
        Some(r) => (StatusCode::PARTIAL_CONTENT, r.offset, r.limit),
        None => (StatusCode::OK, 0, size.saturating_sub(1)),
    };

    let mut builder = Response::builder().status(status);
    {
        let hdrs = builder.headers_mut().expect("builder has no error yet");
        hdrs.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        hdrs.insert(header::CONTENT_TYPE, HeaderValue::from_str(&mime).unwrap_or(HeaderValue::from_static("application/octet-stream")));
        if size > 0 {
            let content_length = limit.saturating_sub(offset) + 1;
            if let Ok(v) = HeaderValue::from_str(&content_length.to_string()) {
                hdrs.insert(header::CONTENT_LENGTH, v);
            }
        }
        if status == StatusCode::PARTIAL_CONTENT {
            let value = format!("bytes {offset}-{limit}/{size}");
            if let Ok(v) = HeaderValue::from_str(&value) {
                hdrs.insert(header::CONTENT_RANGE, v);
            }
        }
        let filename = record.file_name.clone().unwrap_or_else(|| token.clone());
        let disposition = format!("{}; filename=\"{}\"", intent.disposition(), sanitize_filename(&filename));
        if let Ok(v) = HeaderValue::from_str(&disposition) {
            hdrs.insert(header::CONTENT_DISPOSITION, v);
        }
        if intent == Intent::Stream {
            hdrs.insert(header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=31536000"));
            let etag = format!("W/\"{}-{}\"", record.locator.object_id, size);
            if let Ok(v) = HeaderValue::from_str(&etag) {
                hdrs.insert(header::ETAG, v);
            }
        }
    }

    if method == Method::HEAD {
        return builder.body(Body::empty()).unwrap_or_else(|_| internal_error_response(&path));
    }

    if size == 0 {
        return builder.body(Body::empty()).unwrap_or_else(|_| internal_error_response(&path));
    }

    let permit = match state.stream_semaphore.clone().try_acquire_owned() {
        Ok(p) => p,
        Err(_) => return error_response(LinkGateError::Busy, &path),
    };

    let body_stream = core::stream(
        state.upstream.clone(),
        record.locator.clone(),
        offset,
        limit,
        size,
        state.config.streaming.clone(),
    );

    let guarded = PermitGuardedStream {
        inner: Box::pin(body_stream),
        _permit: permit,
    };

    builder
        .body(Body::from_stream(guarded))
        .unwrap_or_else(|_| internal_error_response(&path))
}

fn sanitize_filename(name: &str) -> String {
    name.replace('"', "'")
}

fn unsatisfiable_response(size: u64) -> Response {
    let mut response = (
        StatusCode::RANGE_NOT_SATISFIABLE,
        axum::Json(LinkGateErrorBody::new(
            StatusCode::RANGE_NOT_SATISFIABLE,
            "requested range not satisfiable",
            None,
        )),
    )
        .into_response();
    if let Ok(v) = HeaderValue::from_str(&format!("bytes */{size}")) {
        response.headers_mut().insert(header::CONTENT_RANGE, v);
    }
    response
}

fn error_response(err: LinkGateError, path: &str) -> Response {
    let _ = path;
    err.into_response()
}

fn internal_error_response(path: &str) -> Response {
    error_response(LinkGateError::Internal(anyhow::anyhow!("failed to build response")), path)
}
