//! Server configuration.

use std::time::Duration;

use noughts_session::DEFAULT_CHANNEL_SIZE;

/// Environment variable holding the listen address.
pub const ENV_BIND: &str = "NOUGHTS_BIND";
/// Environment variable holding the idle timeout in seconds (`0` disables it).
pub const ENV_IDLE_TIMEOUT_SECS: &str = "NOUGHTS_IDLE_TIMEOUT_SECS";
/// Environment variable holding the unclaimed-session TTL in seconds.
pub const ENV_UNCLAIMED_TTL_SECS: &str = "NOUGHTS_UNCLAIMED_TTL_SECS";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },
}

/// Tunables for a [`NoughtsServer`](crate::NoughtsServer).
///
/// Every field has a default; override through
/// [`NoughtsServerBuilder`](crate::NoughtsServerBuilder) or
/// [`ServerConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is treated as gone.
    /// `None` waits forever.
    ///
    /// Default: 60 seconds.
    pub idle_timeout: Option<Duration>,

    /// Command queue length of each session actor.
    pub channel_size: usize,

    /// Sessions with no connection older than this are swept.
    ///
    /// Default: 10 minutes.
    pub unclaimed_ttl: Duration,

    /// How often the sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Some(Duration::from_secs(60)),
            channel_size: DEFAULT_CHANNEL_SIZE,
            unclaimed_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `NOUGHTS_BIND`, `NOUGHTS_IDLE_TIMEOUT_SECS`
    /// and `NOUGHTS_UNCLAIMED_TTL_SECS` where set.
    ///
    /// # Errors
    /// [`ConfigError::InvalidSeconds`] if a duration variable is not a
    /// non-negative integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_BIND) {
            config.bind_addr = addr;
        }
        if let Some(secs) = seconds(&lookup, ENV_IDLE_TIMEOUT_SECS)? {
            config.idle_timeout = (!secs.is_zero()).then_some(secs);
        }
        if let Some(secs) = seconds(&lookup, ENV_UNCLAIMED_TTL_SECS)? {
            config.unclaimed_ttl = secs;
        }
        Ok(config)
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| ConfigError::InvalidSeconds { var, value })
}
