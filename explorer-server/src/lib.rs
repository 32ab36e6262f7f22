pub mod config;
pub mod error;
pub mod http_server;

pub use config::ServerConfig;
pub use http_server::{build_router, spawn_session_sweeper, AppState, HttpServer};
