use std::time::Duration;

pub const DEFAULT_APP_NAME: &str = "MyCrew.online FDR";

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Client name announced to the simulator on open.
    pub app_name: String,
    /// Pause between connection attempts while offline.
    pub retry_interval: Duration,
    /// Period of the liveness probe while online.
    pub heartbeat_interval: Duration,
    /// Silence after the last probe response that counts as a disconnect.
    pub heartbeat_timeout: Duration,
    /// Longest a single receive call may block before the loop re-checks its deadlines.
    pub poll_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_owned(),
            retry_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
        }
    }
}
