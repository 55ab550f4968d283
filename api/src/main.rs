mod auth;
mod client_ip;
mod error;
mod payloads;
mod routes;
mod state;

use event_assistant::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize environment variables and logging
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    log::info!("Starting with {:?}", config);

    let state = Arc::new(AppState::from_config(&config)?);

    // Idle in-memory windows are dropped once per window period.
    let purge_state = state.clone();
    let window = config.rate_limit.window;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(window);
        loop {
            ticker.tick().await;
            let purged = purge_state.proxy.rate_limiter().purge_expired().await;
            if purged > 0 {
                log::debug!("Purged {} idle rate-limit windows", purged);
            }
        }
    });

    let app = routes::router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
