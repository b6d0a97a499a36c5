use axum::http::StatusCode;

/// `GET /` liveness probe (spec §6): 200 with a short text body.
pub async fn liveness() -> &'static str {
    "linkgate: ok"
}

/// `GET /watch/{token}` — the HTML player page is explicitly out of scope
/// (spec §1); grounded on the teacher's routeplanner handlers, which
/// return a real not-implemented response rather than omitting the route
/// entirely.
pub async fn watch_stub(axum::extract::Path(_token): axum::extract::Path<String>) -> (StatusCode, &'static str) {
    (StatusCode::NOT_IMPLEMENTED, "watch page not implemented by this gateway")
}
