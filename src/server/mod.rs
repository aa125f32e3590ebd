pub mod config;
mod http_layers;
mod identity;
pub mod metrics;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use identity::{AdminIdentity, Identity, UserRole};
#[allow(unused_imports)] // Used by main.rs
pub use server::run_server;
