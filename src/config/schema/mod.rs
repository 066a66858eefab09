mod core;
mod database;
mod dootask;
mod gateway;
mod inference;
mod stream;

pub use core::Config;
pub use database::DatabaseConfig;
pub use dootask::{DefaultToolConfig, DooTaskConfig};
pub use gateway::GatewayConfig;
pub use inference::InferenceConfig;
pub use stream::StreamConfig;
