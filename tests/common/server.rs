//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own set of databases.

use super::constants::*;
use super::fixtures::create_test_data_dir;
use bancarella_downloads_server::buyers::{SessionStore, SqliteSessionStore};
use bancarella_downloads_server::catalog::{CatalogStore, SqliteCatalogStore};
use bancarella_downloads_server::downloads::{GrantStore, SqliteGrantStore};
use bancarella_downloads_server::server::{server::make_app, RequestsLoggingLevel, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Number of audit entries the order listing reports per grant
const TEST_AUDIT_TAIL_LEN: usize = 10;

/// Test server instance with isolated databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Path of the catalog database, for direct SQL tweaks in tests
    pub catalog_db_path: PathBuf,

    /// Path of the downloads database, for direct SQL tweaks in tests
    pub downloads_db_path: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_data_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates a temporary data directory with seeded databases
    /// 2. Binds to a random port (127.0.0.1:0)
    /// 3. Spawns the server in a background task
    /// 4. Waits for the server to be ready
    ///
    /// The marketplace completion hook is enabled with `HOOK_SECRET`.
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Fixture creation fails
    /// - Port binding fails
    /// - Server fails to start
    /// - Server doesn't become ready within timeout
    pub async fn spawn() -> Self {
        let (temp_data_dir, catalog_db_path, downloads_db_path, buyers_db_path) =
            create_test_data_dir().expect("Failed to create test data dir");

        let catalog_store: Arc<dyn CatalogStore> = Arc::new(
            SqliteCatalogStore::new(&catalog_db_path).expect("Failed to open catalog store"),
        );
        let grant_store: Arc<dyn GrantStore> = Arc::new(
            SqliteGrantStore::new(&downloads_db_path).expect("Failed to open grant store"),
        );
        let session_store: Arc<dyn SessionStore> = Arc::new(
            SqliteSessionStore::new(&buyers_db_path).expect("Failed to open session store"),
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            completion_hook_secret: Some(HOOK_SECRET.to_string()),
        };

        let app = make_app(
            config,
            catalog_store,
            grant_store,
            session_store,
            TEST_AUDIT_TAIL_LEN,
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog_db_path,
            downloads_db_path,
            _temp_data_dir: temp_data_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir cleans up the databases automatically
    }
}
