//! In-memory (single process) broker for tests and local development.
//!
//! Topics keep their messages in a sequence-ordered map, so cancelled
//! messages leave holes and the low mark advances naturally, the same shape
//! a real broker presents after expiry.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newspool_broker::{Broker, MessageId, TopicBounds, TopicInfo};
use newspool_envelope::{Envelope, header};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct TopicState {
    next_seq: u64,
    messages: BTreeMap<u64, Envelope>,
}

impl TopicState {
    fn new() -> Self {
        Self {
            next_seq: 1,
            messages: BTreeMap::new(),
        }
    }

    fn bounds(&self) -> TopicBounds {
        self.messages.first_key_value().map_or(
            TopicBounds::new(self.next_seq, self.next_seq.saturating_sub(1)),
            |(low, _)| TopicBounds::new(*low, self.next_seq - 1),
        )
    }
}

/// In-memory broker.
///
/// Handles are cheap to clone and share the same topic catalog.
#[derive(Clone, Debug, Default)]
pub struct MemoryBroker {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
}

impl MemoryBroker {
    /// Creates a new `MemoryBroker` with an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the oldest messages of `topic` until at most `keep` remain,
    /// advancing the low mark the way broker-side expiry does.
    pub async fn expire_to(&self, topic: &str, keep: usize) {
        let mut topics = self.topics.lock().await;
        if let Some(state) = topics.get_mut(topic) {
            while state.messages.len() > keep {
                state.messages.pop_first();
            }
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    type Error = Error;

    async fn list_topics(&self) -> Result<Vec<TopicInfo>, Self::Error> {
        let topics = self.topics.lock().await;

        let mut catalog: Vec<TopicInfo> = topics
            .iter()
            .map(|(name, state)| TopicInfo {
                name: name.clone(),
                bounds: state.bounds(),
            })
            .collect();
        catalog.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(catalog)
    }

    async fn topic_exists(&self, topic: &str) -> Result<bool, Self::Error> {
        Ok(self.topics.lock().await.contains_key(topic))
    }

    async fn topic_bounds(&self, topic: &str) -> Result<TopicBounds, Self::Error> {
        Ok(self
            .topics
            .lock()
            .await
            .get(topic)
            .map_or(TopicBounds::EMPTY, TopicState::bounds))
    }

    async fn fetch(&self, topic: &str, seq: u64) -> Result<Envelope, Self::Error> {
        let topics = self.topics.lock().await;

        let state = topics
            .get(topic)
            .ok_or_else(|| Error::MissingTopic(topic.to_string()))?;

        let mut envelope = state
            .messages
            .get(&seq)
            .cloned()
            .ok_or_else(|| Error::MissingMessage {
                topic: topic.to_string(),
                seq,
            })?;
        envelope.set_sequence(seq);

        Ok(envelope)
    }

    async fn publish(
        &self,
        topics: &[String],
        envelope: &Envelope,
    ) -> Result<MessageId, Self::Error> {
        let mut catalog = self.topics.lock().await;

        for topic in topics {
            if !catalog.contains_key(topic) {
                return Err(Error::MissingTopic(topic.clone()));
            }
        }

        let mut stored = envelope.clone();

        let message_id = match stored.headers().get(header::MESSAGE_ID) {
            Some(id) => MessageId(id.to_string()),
            None => {
                let id = format!("<{}@memory>", Uuid::new_v4().simple());
                stored.headers_mut().set(header::MESSAGE_ID, id.clone());
                MessageId(id)
            }
        };

        stored
            .headers_mut()
            .set(header::NEWSGROUPS, topics.join(","));
        stored
            .headers_mut()
            .set(header::POSTING_DATE, Utc::now().to_rfc2822());

        for topic in topics {
            if let Some(state) = catalog.get_mut(topic) {
                let seq = state.next_seq;
                state.next_seq += 1;
                state.messages.insert(seq, stored.clone());
            }
        }

        Ok(message_id)
    }

    async fn create_topic(&self, topic: &str) -> Result<(), Self::Error> {
        self.topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_insert_with(TopicState::new);
        Ok(())
    }

    async fn remove_topic(&self, topic: &str) -> Result<(), Self::Error> {
        self.topics.lock().await.remove(topic);
        Ok(())
    }

    async fn cancel(&self, topic: &str, message_id: &MessageId) -> Result<(), Self::Error> {
        let mut topics = self.topics.lock().await;

        let state = topics
            .get_mut(topic)
            .ok_or_else(|| Error::MissingTopic(topic.to_string()))?;

        state.messages.retain(|_, envelope| {
            envelope.headers().get(header::MESSAGE_ID) != Some(message_id.0.as_str())
        });

        Ok(())
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, Self::Error> {
        Ok(Utc::now())
    }
}
