use std::{net::SocketAddr, sync::Arc};

use linkgate::{
    common::{HttpClient, types::AnyResult},
    core::HttpRangeUpstream,
    registry::InMemoryLinkRegistry,
    server::AppState,
    transport,
};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = linkgate::configs::Config::load().await?;

    linkgate::common::logger::init(&config);

    info!("linkgate starting...");

    let registry = Arc::new(InMemoryLinkRegistry::new());
    registry.spawn_sweeper(std::time::Duration::from_secs(config.registry.sweep_interval_secs));

    let http_client = HttpClient::new()?;
    let upstream = Arc::new(HttpRangeUpstream::new(http_client));

    let state = Arc::new(AppState::new(registry, upstream, config.clone()));

    let app = transport::http_server::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let ip: std::net::IpAddr = config.server.host.parse()?;
    let address = SocketAddr::from((ip, config.server.port));
    info!("linkgate listening on {}", address);

    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
