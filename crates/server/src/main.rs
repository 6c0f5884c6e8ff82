use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use session_api::ApiContext;
use shared::error::ApiError;
use storage::{DocumentStore, MemoryStore, SqliteStore};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod live;

use config::{load_settings, prepare_database_url, Settings, StoreBackend};

/// Request bodies are small JSON documents; anything larger is a client bug.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let store = open_store(&settings).await?;
    let state = AppState {
        api: ApiContext::new(store),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, backend = ?settings.store_backend, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match settings.store_backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store; sessions are lost on restart");
            Ok(Arc::new(MemoryStore::with_feed_capacity(
                settings.feed_capacity,
            )))
        }
        StoreBackend::Sqlite => {
            let database_url = prepare_database_url(&settings.database_url)?;
            let store = SqliteStore::with_feed_capacity(&database_url, settings.feed_capacity)
                .await
                .map_err(|error| {
                    error!(
                        %database_url,
                        %error,
                        "failed to open SQLite database; verify parent directory exists and permissions are correct"
                    );
                    error
                })?;
            Ok(Arc::new(store))
        }
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/boards", post(api::create_board).get(api::list_boards))
        .route("/boards/:board_id", get(api::get_board))
        .route("/boards/:board_id/sections", post(api::add_section))
        .route(
            "/boards/:board_id/sections/:section_id",
            patch(api::rename_section),
        )
        .route("/boards/:board_id/visibility", post(api::set_visibility))
        .route(
            "/boards/:board_id/visibility/toggle",
            post(api::toggle_visibility),
        )
        .route(
            "/boards/:board_id/sections/:section_id/notes",
            post(api::add_note),
        )
        .route(
            "/boards/:board_id/sections/:section_id/notes/:note_id",
            patch(api::edit_note).delete(api::delete_note),
        )
        .route(
            "/boards/:board_id/sections/:section_id/notes/:note_id/votes",
            post(api::vote_note),
        )
        .route(
            "/boards/:board_id/sections/:section_id/notes/:note_id/status",
            post(api::set_note_status),
        )
        .route("/rooms", post(api::create_room).get(api::list_rooms))
        .route("/rooms/:room_id", get(api::get_room))
        .route("/rooms/:room_id/join", post(api::join_room))
        .route("/rooms/:room_id/vote", post(api::cast_vote))
        .route("/rooms/:room_id/reveal", post(api::reveal))
        .route("/rooms/:room_id/reset", post(api::reset))
        .route("/rooms/:room_id/rename", post(api::rename_player))
        .route("/ws/boards/:board_id", get(live::board_socket))
        .route("/ws/rooms/:room_id", get(live::room_socket))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state
        .api
        .store
        .health_check()
        .await
        .map_err(|e| api::http_error(session_api::store_error(e)))?;
    Ok("ok")
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
