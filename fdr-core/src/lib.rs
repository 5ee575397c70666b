pub mod codec;
mod config;
mod manager;
pub mod publisher;
pub mod registry;
mod types;

#[cfg(test)]
mod mock;

pub use config::{ManagerConfig, DEFAULT_APP_NAME};
pub use manager::SimConnectManager;
pub use publisher::EventSink;
pub use types::*;
