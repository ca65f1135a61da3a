use std::time::Duration;

use clap::Args;

/// Timeouts and channel sizing for a device session.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SessionConfig {
    /// Seconds to wait for the response to a command
    #[arg(long, env = "STRAP_RESPONSE_TIMEOUT", default_value_t = 10)]
    pub response_timeout_secs: u64,
    /// Seconds to wait for the next metadata packet during a history transfer
    #[arg(long, env = "STRAP_METADATA_TIMEOUT", default_value_t = 30)]
    pub metadata_timeout_secs: u64,
    /// Capacity of each inbound channel
    #[arg(long, env = "STRAP_CHANNEL_CAPACITY", default_value_t = 256)]
    pub channel_capacity: usize,
}

impl SessionConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout_secs: 10,
            metadata_timeout_secs: 30,
            channel_capacity: 256,
        }
    }
}
