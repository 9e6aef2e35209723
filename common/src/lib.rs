pub mod config;
pub mod errors;
pub mod types;

pub use config::EngineConfig;
pub use errors::ConfigError;
pub use types::*;
