use std::collections::BTreeMap;
use std::time::Duration;

use newspool_broker::BrokerEndpoint;
use serde::Deserialize;

/// Configuration of one polling binding.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// Broker host.
    pub host: String,

    /// Broker port.
    pub port: u16,

    /// Topic name patterns to subscribe to. Globs are expanded against the
    /// live catalog once, at bind time.
    pub topics: Vec<String>,

    /// Patterns removed from glob expansions.
    pub exclude: Vec<String>,

    /// Delay between drain cycles.
    #[serde(with = "serde_duration")]
    pub rate: Duration,

    /// Where a new consumer starts reading: `0` resumes from the
    /// checkpoint, `1` skips everything currently queued, `-N` starts with
    /// at most the last N messages.
    pub catchup: i64,

    /// Re-apply the catchup policy at the start of every cycle instead of
    /// only once at startup.
    pub catchup_reset: bool,

    /// Delay before re-delivering a message whose handler requested retry.
    #[serde(with = "serde_duration")]
    pub retry_wait: Duration,

    /// Abort the process on any error detected during a drain cycle, and
    /// propagate handler failures instead of skipping the message.
    pub exit_on_error: bool,

    /// Process at most one message per drain cycle.
    pub single_shot: bool,

    /// Prefix for checkpoint keys, for processes that bind the same topic
    /// more than once.
    pub checkpoint_prefix: Option<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 119,
            topics: Vec::new(),
            exclude: Vec::new(),
            rate: Duration::from_secs(60),
            catchup: 0,
            catchup_reset: false,
            retry_wait: Duration::from_secs(60),
            exit_on_error: false,
            single_shot: false,
            checkpoint_prefix: None,
        }
    }
}

impl PollConfig {
    /// The broker endpoint this binding points at.
    #[must_use]
    pub fn endpoint(&self) -> BrokerEndpoint {
        BrokerEndpoint::new(self.host.clone()).with_port(self.port)
    }
}

/// Configuration of one publishing binding.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostConfig {
    /// Broker host.
    pub host: String,

    /// Broker port.
    pub port: u16,

    /// Target topics; more than one cross-posts a single envelope.
    pub topics: Vec<String>,

    /// Default From header.
    pub from: String,

    /// Default Subject header.
    pub subject: String,

    /// Extra default headers, merged under any per-post overrides.
    pub headers: BTreeMap<String, String>,

    /// A disabled poster accepts posts and does nothing, for dry-run and
    /// opt-out configurations.
    pub enable: bool,

    /// Create missing target topics at startup and wait until they are
    /// visible.
    pub create_topics: bool,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 119,
            topics: Vec::new(),
            from: "newspool@localhost".to_string(),
            subject: "Unknown".to_string(),
            headers: BTreeMap::new(),
            enable: true,
            create_topics: true,
        }
    }
}

impl PostConfig {
    /// The broker endpoint this binding points at.
    #[must_use]
    pub fn endpoint(&self) -> BrokerEndpoint {
        BrokerEndpoint::new(self.host.clone()).with_port(self.port)
    }
}

/// Duration fields accept plain integer seconds or strings like `"90s"`,
/// `"15m"`, `"2h30m"`, `"500ms"`.
mod serde_duration {
    use std::fmt;
    use std::time::Duration;

    use serde::de::{self, Visitor};
    use serde::Deserializer;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("seconds or a duration string like \"90s\" or \"15m\"")
            }

            fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Duration, E> {
                Ok(Duration::from_secs(secs))
            }

            fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Duration, E> {
                u64::try_from(secs)
                    .map(Duration::from_secs)
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
                parse(value).ok_or_else(|| E::custom(format!("invalid duration: {value:?}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }

    /// Handles `"500ms"` and `d`/`h`/`m`/`s` component strings.
    fn parse(value: &str) -> Option<Duration> {
        let value = value.trim();

        if value.is_empty() {
            return None;
        }

        if let Some(ms) = value.strip_suffix("ms") {
            return ms
                .parse::<f64>()
                .ok()
                .filter(|millis| *millis >= 0.0)
                .map(|millis| Duration::from_secs_f64(millis / 1000.0));
        }

        let mut total_secs = 0u64;
        let mut current = String::new();

        for ch in value.chars() {
            if ch.is_ascii_digit() {
                current.push(ch);
                continue;
            }

            let amount: u64 = current.parse().ok()?;
            current.clear();

            total_secs += match ch {
                'd' => amount * 86_400,
                'h' => amount * 3_600,
                'm' => amount * 60,
                's' => amount,
                _ => return None,
            };
        }

        if !current.is_empty() {
            // A bare trailing number counts as seconds.
            total_secs += current.parse::<u64>().ok()?;
        }

        Some(Duration::from_secs(total_secs))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_config_defaults_are_sensible() {
        let config = PollConfig::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 119);
        assert_eq!(config.rate, Duration::from_secs(60));
        assert_eq!(config.retry_wait, Duration::from_secs(60));
        assert_eq!(config.catchup, 0);
        assert!(!config.exit_on_error);
    }

    #[test]
    fn poll_config_parses_from_toml() {
        let config: PollConfig = toml::from_str(
            r#"
            host = "news.station.net"
            topics = ["transport.site.*"]
            exclude = ["transport.site.control"]
            rate = "5m"
            catchup = -10
            retry_wait = 30
            exit_on_error = true
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "news.station.net");
        assert_eq!(config.topics, vec!["transport.site.*"]);
        assert_eq!(config.rate, Duration::from_secs(300));
        assert_eq!(config.catchup, -10);
        assert_eq!(config.retry_wait, Duration::from_secs(30));
        assert!(config.exit_on_error);
    }

    #[test]
    fn post_config_parses_extra_headers() {
        let config: PostConfig = toml::from_str(
            r#"
            topics = ["transport.site.status"]
            from = "station@field.site"

            [headers]
            X-Station = "north-ridge"
            "#,
        )
        .unwrap();

        assert_eq!(config.from, "station@field.site");
        assert_eq!(
            config.headers.get("X-Station").map(String::as_str),
            Some("north-ridge")
        );
        assert!(config.enable);
        assert!(config.create_topics);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<PollConfig, _> = toml::from_str("retry_delay = 10");
        assert!(result.is_err());
    }
}
