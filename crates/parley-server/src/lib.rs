pub mod app;
pub mod config;

pub use app::{ServerState, build_router};
pub use config::ServerConfig;
