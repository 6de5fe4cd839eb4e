// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod strategy;
pub mod telemetry;

// Re-export commonly used types
pub use api::{BalanceReader, PriceSource, SwapExecutor};
pub use config::AppConfig;
pub use error::{ConfigError, ProviderError, RetryError, StartupError, SwapError};
pub use models::*;
