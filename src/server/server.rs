use anyhow::Result;
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::buyers::SessionStore;
use crate::catalog::CatalogStore;
use crate::downloads::{DownloadManager, DownloadManagerConfig, GrantStore};

use axum::{
    extract::State, middleware, response::IntoResponse, routing::get, Json, Router,
};
use serde::Serialize;

use super::download_routes::download_routes;
use super::hook_routes::hook_routes;
use super::session::Session;
use super::{log_requests, state::ServerState, RequestsLoggingLevel, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub name: String,
    pub uptime: String,
    pub hash: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        name: env!("CARGO_PKG_NAME").to_string(),
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

/// Assembles the complete router. Exposed for the e2e test harness.
pub fn make_app(
    config: ServerConfig,
    catalog_store: Arc<dyn CatalogStore>,
    grant_store: Arc<dyn GrantStore>,
    session_store: Arc<dyn SessionStore>,
    audit_tail_len: usize,
) -> Result<Router> {
    let download_manager = Arc::new(DownloadManager::new(
        grant_store,
        catalog_store,
        DownloadManagerConfig { audit_tail_len },
    ));
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        session_store,
        download_manager,
        hash: env!("GIT_HASH").to_string(),
    };

    let buyer_routes = download_routes().with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    let mut app: Router = home_router.nest("/v1", buyer_routes);

    if config.completion_hook_secret.is_some() {
        app = app.nest("/internal", hook_routes().with_state(state.clone()));
    }

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    catalog_store: Arc<dyn CatalogStore>,
    grant_store: Arc<dyn GrantStore>,
    session_store: Arc<dyn SessionStore>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    completion_hook_secret: Option<String>,
    audit_tail_len: usize,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        completion_hook_secret,
    };
    let app = make_app(
        config,
        catalog_store,
        grant_store,
        session_store,
        audit_tail_len,
    )?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?)
}
