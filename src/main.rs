use std::net::SocketAddr;

use axum::http::{header, Method};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

mod claim;
mod config;
mod http;
mod i18n;
mod room;
mod telemetry;
mod util;

use crate::claim::{rest, ClaimOrchestrator};
use crate::http::routes::{self, AppState};
use crate::room::registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let store = config::store_from_env();
    let transport = rest::transport_from_config(store.as_ref(), config::store_timeout());
    let state = AppState::new(ClaimOrchestrator::new(transport), registry::lock_from_env);
    for (room, locked) in state.locks.iter() {
        tracing::info!(%room, locked, "room registered");
    }

    // Unknown paths fall through to the SPA entry point.
    let static_dir = config::static_dir();
    let frontend = ServeDir::new(&static_dir)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));

    let app = routes::router(state)
        .fallback_service(frontend)
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT_LANGUAGE])
                .allow_origin(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config::server_addr();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
