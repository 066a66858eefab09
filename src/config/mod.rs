pub mod schema;

pub use schema::{
    Config, DatabaseConfig, DefaultToolConfig, DooTaskConfig, GatewayConfig, InferenceConfig,
    StreamConfig,
};
