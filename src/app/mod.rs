//! Application wiring: configuration, loading and component setup

mod completion;
pub mod config;
pub mod init;
pub mod loader;

pub use config::AppConfig;
pub use init::{build_app, App};
pub use loader::load_config;
