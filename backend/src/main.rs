use std::sync::Arc;

use backend::config::AppConfig;
use backend::store::MemoryStore;
use backend::{app, registration, telemetry, AppState};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    let config = AppConfig::from_env().expect("invalid configuration");
    let store = match &config.persist_path {
        Some(path) => MemoryStore::with_persistence(path.clone())
            .await
            .expect("load store snapshot"),
        None => MemoryStore::default(),
    };
    let game = registration::ensure_active_game(&store)
        .await
        .expect("bootstrap game");
    tracing::info!(game_id = %game.id, draw_completed = game.draw_completed, "active game");

    let bind_addr = config.bind_addr.clone();
    let app = app(AppState::new(Arc::new(store), config));
    tracing::info!(%bind_addr, "starting server");
    axum::serve(
        tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("bind"),
        app,
    )
    .await
    .expect("server error");
}
