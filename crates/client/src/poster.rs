use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use newspool_broker::{Broker, BrokerError, MessageId};
use newspool_envelope::{Body, Envelope, HeaderMap, Part, content_type_for_name, header};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PostConfig;
use crate::error::Error;
use crate::util::wait;

/// How long to wait between checks for a newly created topic to appear.
const CREATE_RECHECK: Duration = Duration::from_secs(15);

/// One file-like payload to attach to a post.
#[derive(Clone, Debug)]
pub struct PostFile {
    /// Attachment file name; its extension drives content-type inference.
    pub name: String,
    /// Payload bytes.
    pub content: Bytes,
}

impl PostFile {
    /// Creates a post file.
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Publishes envelopes to a fixed set of topics.
///
/// A disabled poster is a deliberate no-op: every post reports `Ok(None)`
/// without touching the broker, so dry-run configurations keep the calling
/// code unchanged.
#[derive(Clone, Debug)]
pub struct Poster<B> {
    broker: B,
    topics: Vec<String>,
    defaults: HeaderMap,
    enabled: bool,
}

impl<B> Poster<B>
where
    B: Broker,
{
    /// Creates a poster from configuration.
    ///
    /// With `create_topics` set, missing target topics are created here and
    /// this call does not return until each is observably present on the
    /// broker; publishing before the topic exists is a setup error, not a
    /// per-post runtime error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] when a required topic cannot be created and
    /// [`Error::Cancelled`] when shutdown fires during the wait.
    pub async fn new(
        broker: B,
        config: &PostConfig,
        token: &CancellationToken,
    ) -> Result<Self, Error> {
        let topics: Vec<String> = config
            .topics
            .iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        if topics.is_empty() {
            warn!("no posting topic configured, poster disabled");
        }

        let mut defaults = HeaderMap::new();
        defaults.set(header::FROM, config.from.clone());
        defaults.set(header::SUBJECT, config.subject.clone());
        for (name, value) in &config.headers {
            defaults.set(name.clone(), value.clone());
        }

        let enabled = config.enable && !topics.is_empty();

        if enabled && config.create_topics {
            Self::ensure_topics(&broker, &topics, token).await?;
        }

        Ok(Self {
            broker,
            topics,
            defaults,
            enabled,
        })
    }

    async fn ensure_topics(
        broker: &B,
        topics: &[String],
        token: &CancellationToken,
    ) -> Result<(), Error> {
        for topic in topics {
            let exists = broker
                .topic_exists(topic)
                .await
                .map_err(|e| Error::Setup(format!("cannot check topic {topic}: {e}")))?;
            if exists {
                continue;
            }

            info!(topic = %topic, "creating posting topic");
            broker
                .create_topic(topic)
                .await
                .map_err(|e| Error::Setup(format!("cannot create topic {topic}: {e}")))?;

            loop {
                match broker.topic_exists(topic).await {
                    Ok(true) => break,
                    Ok(false) => info!(topic = %topic, "waiting for topic to show up"),
                    Err(e) if e.is_transient() => {
                        warn!(topic = %topic, error = %e, "broker unavailable while waiting for topic");
                    }
                    Err(e) => {
                        return Err(Error::Setup(format!("cannot check topic {topic}: {e}")));
                    }
                }

                if !wait(CREATE_RECHECK, token).await {
                    return Err(Error::Cancelled);
                }
            }

            info!(topic = %topic, "topic is ready");
        }

        Ok(())
    }

    /// True when posts will actually reach the broker.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The resolved target topics.
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Publishes one envelope built from `files` and/or `comment`.
    ///
    /// With no files the body is the comment text; otherwise each file
    /// becomes a part with its content type inferred from the name, and the
    /// comment becomes the multipart preamble. `date` stamps the effective
    /// application timestamp. `extra` headers are merged over the
    /// configured defaults, overrides winning.
    ///
    /// # Errors
    ///
    /// Broker failures surface as [`Error::Broker`].
    pub async fn post(
        &self,
        files: &[PostFile],
        comment: Option<&str>,
        date: Option<DateTime<Utc>>,
        extra: Option<&HeaderMap>,
    ) -> Result<Option<MessageId>, Error> {
        if !self.enabled {
            debug!("poster disabled, dropping post");
            return Ok(None);
        }

        let body = if files.is_empty() {
            Body::Single(Bytes::from(comment.unwrap_or_default().to_string()))
        } else {
            Body::Multipart {
                preamble: comment.map(String::from),
                parts: files
                    .iter()
                    .map(|file| Part {
                        filename: Some(file.name.clone()),
                        content_type: content_type_for_name(&file.name),
                        content: file.content.clone(),
                    })
                    .collect(),
            }
        };

        let mut headers = self.defaults.clone();

        if let Some(date) = date {
            headers.set(header::TRANSPORT_DATE, date.to_rfc3339());
        }

        if let Some(extra) = extra {
            for (name, value) in extra.iter() {
                headers.set(name, value);
            }
        }

        let envelope = Envelope::new(headers, body);

        self.broker
            .publish(&self.topics, &envelope)
            .await
            .map(Some)
            .map_err(Error::broker)
    }

    /// Publishes a text-only envelope.
    ///
    /// # Errors
    ///
    /// See [`Poster::post`].
    pub async fn post_text(&self, text: &str) -> Result<Option<MessageId>, Error> {
        self.post(&[], Some(text), None, None).await
    }

    /// Reads files from disk and publishes them as named parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when a file cannot be read; otherwise see
    /// [`Poster::post`].
    pub async fn post_files(
        &self,
        paths: &[impl AsRef<Path>],
        comment: Option<&str>,
        date: Option<DateTime<Utc>>,
        extra: Option<&HeaderMap>,
    ) -> Result<Option<MessageId>, Error> {
        if !self.enabled {
            debug!("poster disabled, dropping post");
            return Ok(None);
        }

        let mut files = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();

            let content = tokio::fs::read(path)
                .await
                .map_err(|e| Error::Io("error reading file for posting", e))?;

            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |name| {
                    name.to_string_lossy().into_owned()
                });

            files.push(PostFile::new(name, content));
        }

        self.post(&files, comment, date, extra).await
    }
}
