use std::time::Duration;

/// Timing knobs for session bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How long a disconnected player has to come back before their
    /// match is forfeited.
    ///
    /// Default: 10 seconds.
    pub disconnect_timeout: Duration,

    /// How often the disconnect monitor scans for expired entries.
    ///
    /// Default: 500 milliseconds.
    pub monitor_interval: Duration,

    /// How long a first "yes" to a rematch stays valid.
    ///
    /// Default: 30 seconds.
    pub rematch_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            disconnect_timeout: Duration::from_secs(10),
            monitor_interval: Duration::from_millis(500),
            rematch_ttl: Duration::from_secs(30),
        }
    }
}
