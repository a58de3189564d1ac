use axum::extract::FromRef;

use crate::buyers::SessionStore;
use crate::downloads::DownloadManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedSessionStore = Arc<dyn SessionStore>;
pub type GuardedDownloadManager = Arc<DownloadManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub session_store: GuardedSessionStore,
    pub download_manager: GuardedDownloadManager,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedSessionStore {
    fn from_ref(input: &ServerState) -> Self {
        input.session_store.clone()
    }
}

impl FromRef<ServerState> for GuardedDownloadManager {
    fn from_ref(input: &ServerState) -> Self {
        input.download_manager.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
