//! NNTP driver for the newspool broker interface.
//!
//! Topics are newsgroups; sequence numbers are article numbers; publishing
//! is POST. Administration (create/remove/cancel) travels as control
//! messages, matching how INN-style servers are managed. One connection is
//! kept warm behind a mutex; an IO failure poisons it and the next
//! operation reconnects.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod conn;
mod error;

pub use error::Error;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use conn::{NntpConnection, Status};
use newspool_broker::{Broker, BrokerEndpoint, BrokerError, MessageId, TopicBounds, TopicInfo};
use newspool_envelope::{Envelope, header};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The pseudo-topic administrative messages are posted to.
const CONTROL_TOPIC: &str = "control";

/// Options for the NNTP broker client.
#[derive(Clone, Debug)]
pub struct NntpBrokerOptions {
    /// Sender identity stamped on articles that carry no From header,
    /// including generated control messages.
    pub from: String,
}

impl Default for NntpBrokerOptions {
    fn default() -> Self {
        Self {
            from: "newspool@localhost".to_string(),
        }
    }
}

/// An NNTP-backed broker client.
#[derive(Clone, Debug)]
pub struct NntpBroker {
    endpoint: BrokerEndpoint,
    options: NntpBrokerOptions,
    conn: Arc<Mutex<Option<NntpConnection>>>,
}

impl NntpBroker {
    /// Connects to the broker, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns an error when the broker is unreachable or refuses reader
    /// access.
    pub async fn connect(
        endpoint: BrokerEndpoint,
        options: NntpBrokerOptions,
    ) -> Result<Self, Error> {
        let conn = NntpConnection::open(&endpoint).await?;

        Ok(Self {
            endpoint,
            options,
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Connects to the broker, retrying transient failures indefinitely on
    /// a fixed interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when `token` fires before a connection
    /// is established; permanent failures surface immediately.
    pub async fn connect_with_retry(
        endpoint: BrokerEndpoint,
        options: NntpBrokerOptions,
        interval: Duration,
        token: &CancellationToken,
    ) -> Result<Self, Error> {
        loop {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match NntpConnection::open(&endpoint).await {
                Ok(conn) => {
                    return Ok(Self {
                        endpoint,
                        options,
                        conn: Arc::new(Mutex::new(Some(conn))),
                    });
                }
                Err(e) if e.is_transient() => {
                    warn!(endpoint = %endpoint, error = %e, "broker unavailable, retrying");
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                () = token.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn ensure<'a>(
        guard: &'a mut Option<NntpConnection>,
        endpoint: &BrokerEndpoint,
    ) -> Result<&'a mut NntpConnection, Error> {
        if guard.is_none() {
            *guard = Some(NntpConnection::open(endpoint).await?);
        }

        guard.as_mut().ok_or(Error::Closed)
    }

    /// Drops the connection after an IO-level failure so the next operation
    /// starts from a clean reconnect.
    fn poison_on_io<T>(guard: &mut Option<NntpConnection>, result: &Result<T, Error>) {
        if let Err(Error::Io(..) | Error::Timeout(_) | Error::Closed) = result {
            *guard = None;
        }
    }

    /// Issues GROUP and returns the reported bounds.
    async fn select_topic(
        conn: &mut NntpConnection,
        topic: &str,
    ) -> Result<TopicBounds, Error> {
        let status = conn.command(&format!("GROUP {topic}")).await?;

        match status.code {
            211 => {
                conn.current_topic = Some(topic.to_string());
                parse_group_bounds(&status)
            }
            411 => {
                conn.current_topic = None;
                Err(Error::MissingTopic(topic.to_string()))
            }
            code => Err(Error::Unexpected {
                command: "GROUP",
                code,
                text: status.text,
            }),
        }
    }

    async fn do_fetch(
        conn: &mut NntpConnection,
        topic: &str,
        seq: u64,
    ) -> Result<Envelope, Error> {
        if conn.current_topic.as_deref() != Some(topic) {
            Self::select_topic(conn, topic).await?;
        }

        let status = conn.command(&format!("ARTICLE {seq}")).await?;
        match status.code {
            220 => {}
            412 | 420 | 423 | 430 => {
                return Err(Error::MissingMessage {
                    topic: topic.to_string(),
                    seq,
                });
            }
            code => {
                return Err(Error::Unexpected {
                    command: "ARTICLE",
                    code,
                    text: status.text,
                });
            }
        }

        let lines = conn.read_multiline().await?;
        let wire = lines.join("\r\n");

        let mut envelope =
            Envelope::decode(wire.as_bytes()).map_err(|source| Error::Decode {
                topic: topic.to_string(),
                seq,
                source,
            })?;
        envelope.set_sequence(seq);

        Ok(envelope)
    }

    async fn do_publish(
        &self,
        conn: &mut NntpConnection,
        topics: &[String],
        envelope: &Envelope,
    ) -> Result<MessageId, Error> {
        let mut article = envelope.clone();

        article
            .headers_mut()
            .set(header::NEWSGROUPS, topics.join(","));

        if !article.headers().contains(header::FROM) {
            article
                .headers_mut()
                .set(header::FROM, self.options.from.clone());
        }
        if !article.headers().contains(header::DATE) {
            article
                .headers_mut()
                .set(header::DATE, Utc::now().to_rfc2822());
        }

        let message_id = match article.headers().get(header::MESSAGE_ID) {
            Some(id) => MessageId(id.to_string()),
            None => {
                let id = format!("<{}@{}>", Uuid::new_v4().simple(), self.endpoint.host);
                article.headers_mut().set(header::MESSAGE_ID, id.clone());
                MessageId(id)
            }
        };

        let status = conn.command("POST").await?;
        if status.code != 340 {
            return Err(Error::Unexpected {
                command: "POST",
                code: status.code,
                text: status.text,
            });
        }

        conn.send_article(&article.encode()).await?;

        let status = conn.read_status().await?;
        if status.code != 240 {
            return Err(Error::Unexpected {
                command: "POST",
                code: status.code,
                text: status.text,
            });
        }

        debug!(topics = %topics.join(","), id = %message_id, "published");

        Ok(message_id)
    }

    /// Builds an administrative control message in the form INN-style
    /// servers act on.
    fn control_envelope(&self, command: &str, body: String) -> Envelope {
        let mut envelope = Envelope::text(body);
        envelope
            .headers_mut()
            .set(header::SUBJECT, format!("cmsg {command}"));
        envelope.headers_mut().set(header::CONTROL, command);
        envelope
            .headers_mut()
            .set(header::APPROVED, self.options.from.clone());

        envelope
    }
}

#[async_trait]
impl Broker for NntpBroker {
    type Error = Error;

    async fn list_topics(&self) -> Result<Vec<TopicInfo>, Self::Error> {
        let mut guard = self.conn.lock().await;
        let conn = Self::ensure(&mut guard, &self.endpoint).await?;

        let result = async {
            let status = conn.command("LIST").await?;
            if status.code != 215 {
                return Err(Error::Unexpected {
                    command: "LIST",
                    code: status.code,
                    text: status.text,
                });
            }

            let lines = conn.read_multiline().await?;
            let mut catalog = Vec::with_capacity(lines.len());

            for line in &lines {
                // "name high low flags"
                let fields: Vec<&str> = line.split_whitespace().collect();
                let (Some(name), Some(Ok(high)), Some(Ok(low))) = (
                    fields.first(),
                    fields.get(1).map(|field| field.parse()),
                    fields.get(2).map(|field| field.parse()),
                ) else {
                    warn!(line = %line, "skipping malformed catalog entry");
                    continue;
                };

                catalog.push(TopicInfo {
                    name: (*name).to_string(),
                    bounds: TopicBounds::new(low, high),
                });
            }

            Ok(catalog)
        }
        .await;

        Self::poison_on_io(&mut guard, &result);
        result
    }

    async fn topic_exists(&self, topic: &str) -> Result<bool, Self::Error> {
        let mut guard = self.conn.lock().await;
        let conn = Self::ensure(&mut guard, &self.endpoint).await?;

        let result = match Self::select_topic(conn, topic).await {
            Ok(_) => Ok(true),
            Err(Error::MissingTopic(_)) => Ok(false),
            Err(e) => Err(e),
        };

        Self::poison_on_io(&mut guard, &result);
        result
    }

    async fn topic_bounds(&self, topic: &str) -> Result<TopicBounds, Self::Error> {
        let mut guard = self.conn.lock().await;
        let conn = Self::ensure(&mut guard, &self.endpoint).await?;

        // A nonexistent topic reads as empty so consumers just wait for it.
        let result = match Self::select_topic(conn, topic).await {
            Ok(bounds) => Ok(bounds),
            Err(Error::MissingTopic(_)) => Ok(TopicBounds::EMPTY),
            Err(e) => Err(e),
        };

        Self::poison_on_io(&mut guard, &result);
        result
    }

    async fn fetch(&self, topic: &str, seq: u64) -> Result<Envelope, Self::Error> {
        let mut guard = self.conn.lock().await;
        let conn = Self::ensure(&mut guard, &self.endpoint).await?;

        let result = Self::do_fetch(conn, topic, seq).await;

        Self::poison_on_io(&mut guard, &result);
        result
    }

    async fn publish(
        &self,
        topics: &[String],
        envelope: &Envelope,
    ) -> Result<MessageId, Self::Error> {
        let mut guard = self.conn.lock().await;
        let conn = Self::ensure(&mut guard, &self.endpoint).await?;

        let result = self.do_publish(conn, topics, envelope).await;

        Self::poison_on_io(&mut guard, &result);
        result
    }

    async fn create_topic(&self, topic: &str) -> Result<(), Self::Error> {
        let body = format!("For your newsgroups file:\n{topic} {topic}");
        let envelope = self.control_envelope(&format!("newgroup {topic}"), body);

        info!(topic = %topic, "requesting topic creation");
        self.publish(&[CONTROL_TOPIC.to_string()], &envelope)
            .await
            .map(|_| ())
    }

    async fn remove_topic(&self, topic: &str) -> Result<(), Self::Error> {
        let command = format!("rmgroup {topic}");
        let envelope = self.control_envelope(&command, command.clone());

        info!(topic = %topic, "requesting topic removal");
        self.publish(&[CONTROL_TOPIC.to_string()], &envelope)
            .await
            .map(|_| ())
    }

    async fn cancel(&self, topic: &str, message_id: &MessageId) -> Result<(), Self::Error> {
        let command = format!("cancel {message_id}");
        let envelope = self.control_envelope(&command, command.clone());

        // Cancels ride in the topic that holds the target message.
        self.publish(&[topic.to_string()], &envelope)
            .await
            .map(|_| ())
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, Self::Error> {
        let mut guard = self.conn.lock().await;
        let conn = Self::ensure(&mut guard, &self.endpoint).await?;

        let result = async {
            let status = conn.command("DATE").await?;
            if status.code != 111 {
                return Err(Error::Unexpected {
                    command: "DATE",
                    code: status.code,
                    text: status.text,
                });
            }

            // 111 YYYYMMDDhhmmss, always UTC.
            status
                .fields()
                .first()
                .and_then(|stamp| {
                    NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S").ok()
                })
                .map(|naive| naive.and_utc())
                .ok_or_else(|| Error::Protocol(status.text.clone()))
        }
        .await;

        Self::poison_on_io(&mut guard, &result);
        result
    }
}

fn parse_group_bounds(status: &Status) -> Result<TopicBounds, Error> {
    // 211 count low high name
    let fields = status.fields();

    let (Some(Ok(low)), Some(Ok(high))) = (
        fields.get(1).map(|field| field.parse()),
        fields.get(2).map(|field| field.parse()),
    ) else {
        return Err(Error::Protocol(status.text.clone()));
    };

    Ok(TopicBounds::new(low, high))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_bounds_parse_low_and_high() {
        let status = Status::parse("211 42 10 51 transport.site.data").unwrap();
        assert_eq!(parse_group_bounds(&status).unwrap(), TopicBounds::new(10, 51));
    }

    #[test]
    fn group_bounds_reject_short_responses() {
        let status = Status::parse("211 42").unwrap();
        assert!(matches!(
            parse_group_bounds(&status),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn empty_group_parses_as_empty_bounds() {
        let status = Status::parse("211 0 1 0 transport.site.data").unwrap();
        let bounds = parse_group_bounds(&status).unwrap();
        assert!(bounds.is_empty());
    }

    #[test]
    fn control_envelope_carries_command_and_approval() {
        let broker = NntpBroker {
            endpoint: BrokerEndpoint::default(),
            options: NntpBrokerOptions::default(),
            conn: Arc::new(Mutex::new(None)),
        };

        let envelope =
            broker.control_envelope("newgroup transport.site.data", "body".to_string());

        assert_eq!(
            envelope.headers().get(header::CONTROL),
            Some("newgroup transport.site.data")
        );
        assert_eq!(
            envelope.headers().get(header::APPROVED),
            Some("newspool@localhost")
        );
        assert_eq!(
            envelope.headers().get(header::SUBJECT),
            Some("cmsg newgroup transport.site.data")
        );
    }
}
