pub mod config;
mod download_routes;
mod hook_routes;
mod http_layers;
pub mod server;
pub(self) mod session;
pub mod state;

pub use config::ServerConfig;
pub use hook_routes::HEADER_HOOK_SECRET_KEY;
pub use http_layers::*;
pub use server::run_server;
