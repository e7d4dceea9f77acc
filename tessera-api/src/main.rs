use std::net::SocketAddr;
use tessera_api::{app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tessera_api::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Tessera API on port {}", config.server.port);

    let state = AppState::build(config.business_rules.clone());

    // Background TTL sweep owns expiry; client-side release is an
    // optimization on top of it.
    tokio::spawn(tessera_api::worker::start_expiry_worker(
        state.holds.clone(),
        config.business_rules.sweep_interval_seconds,
    ));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
