//! Shared fixtures for the behavioral tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use newspool_broker::Broker;
use newspool_broker_memory::MemoryBroker;
use newspool_client::{Handler, Outcome, PollConfig};
use newspool_envelope::{Envelope, header};

/// Records every delivered envelope and reports success.
#[derive(Clone, Debug, Default)]
pub struct Collector {
    seen: Arc<Mutex<Vec<Envelope>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelopes(&self) -> Vec<Envelope> {
        self.seen.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.envelopes()
            .iter()
            .map(|envelope| envelope.as_text().unwrap_or_default().to_string())
            .collect()
    }

    pub fn seqs(&self) -> Vec<u64> {
        self.envelopes()
            .iter()
            .filter_map(Envelope::sequence)
            .collect()
    }
}

#[async_trait]
impl Handler for Collector {
    async fn handle(&self, envelope: Envelope) -> Outcome {
        self.seen.lock().unwrap().push(envelope);
        Outcome::Success
    }
}

/// A scripted step for one delivery attempt.
#[derive(Clone, Copy, Debug)]
pub enum Step {
    Retry,
    Fail,
}

/// Records every call and plays back scripted outcomes per sequence number
/// before settling into success.
#[derive(Clone, Debug, Default)]
pub struct Scripted {
    calls: Arc<Mutex<Vec<u64>>>,
    plan: Arc<Mutex<HashMap<u64, VecDeque<Step>>>>,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `steps` for deliveries of message `seq`.
    pub fn plan(self, seq: u64, steps: &[Step]) -> Self {
        self.plan
            .lock()
            .unwrap()
            .insert(seq, steps.iter().copied().collect());
        self
    }

    /// Sequence numbers of every handler invocation, retries included.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler for Scripted {
    async fn handle(&self, envelope: Envelope) -> Outcome {
        let seq = envelope.sequence().unwrap_or_default();
        self.calls.lock().unwrap().push(seq);

        let step = self
            .plan
            .lock()
            .unwrap()
            .get_mut(&seq)
            .and_then(VecDeque::pop_front);

        match step {
            Some(Step::Retry) => Outcome::Retry,
            Some(Step::Fail) => Outcome::Failed(format!("scripted failure for {seq}").into()),
            None => Outcome::Success,
        }
    }
}

/// A broker preloaded with `topics`.
pub async fn broker_with_topics(topics: &[&str]) -> MemoryBroker {
    let broker = MemoryBroker::new();
    for topic in topics {
        broker.create_topic(topic).await.unwrap();
    }
    broker
}

/// Publishes one text message per entry, in order.
pub async fn publish_texts(broker: &MemoryBroker, topic: &str, texts: &[&str]) {
    for text in texts {
        broker
            .publish(&[topic.to_string()], &Envelope::text(*text))
            .await
            .unwrap();
    }
}

/// Publishes a text message carrying an explicit transport date.
pub async fn publish_dated(broker: &MemoryBroker, topic: &str, text: &str, date: &str) {
    let mut envelope = Envelope::text(text);
    envelope.headers_mut().set(header::TRANSPORT_DATE, date);
    broker
        .publish(&[topic.to_string()], &envelope)
        .await
        .unwrap();
}

/// A poll configuration with test-friendly timings.
pub fn poll_config(topics: &[&str]) -> PollConfig {
    PollConfig {
        topics: topics.iter().map(ToString::to_string).collect(),
        rate: std::time::Duration::from_millis(10),
        retry_wait: std::time::Duration::from_millis(10),
        ..PollConfig::default()
    }
}
