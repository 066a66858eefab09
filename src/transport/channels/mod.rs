pub mod dootask;

pub use dootask::{ChatPlatform, DooTaskClient, DooTaskConnector, PlatformConnector};
