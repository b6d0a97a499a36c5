use std::sync::Arc;

use axum::{Router, routing::get};

use crate::server::AppState;
use crate::transport::routes::{misc, stream};

/// Assembles the gateway's route table, grounded on the teacher's
/// `transport::http_server::router()` assembly style.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(misc::liveness))
        .route("/dl/{token}", get(stream::download).head(stream::download))
        .route("/stream/{token}", get(stream::stream).head(stream::stream))
        .route("/watch/{token}", get(misc::watch_stub))
}
