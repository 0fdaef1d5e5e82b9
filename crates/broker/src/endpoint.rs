use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Address and socket policy of a broker.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BrokerEndpoint {
    /// Broker host name or address.
    pub host: String,

    /// Broker port.
    #[serde(default = "BrokerEndpoint::default_port")]
    pub port: u16,

    /// Socket timeout applied to every exchange.
    #[serde(default = "BrokerEndpoint::default_timeout", with = "crate::endpoint::secs")]
    pub timeout: Duration,
}

impl BrokerEndpoint {
    /// Creates an endpoint with the default port and timeout.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::default_port(),
            timeout: Self::default_timeout(),
        }
    }

    /// Replaces the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replaces the socket timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    const fn default_port() -> u16 {
        119
    }

    const fn default_timeout() -> Duration {
        Duration::from_secs(60)
    }
}

impl Default for BrokerEndpoint {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
