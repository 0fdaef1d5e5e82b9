//! Tests of the round-robin poller set and its process outer loop.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use newspool_checkpoint_memory::MemoryCheckpointStore;
use newspool_client::{Error, Handler, Idle, Outcome, PollConfig, PollerSet};
use newspool_envelope::Envelope;
use support::{Collector, Scripted, Step, broker_with_topics, poll_config, publish_texts};
use tokio_util::sync::CancellationToken;

const TOPIC_A: &str = "transport.site.alpha";
const TOPIC_B: &str = "transport.site.beta";

/// Succeeds on every message and cancels the token once `remaining`
/// deliveries have been seen.
#[derive(Clone)]
struct CancelAfter {
    inner: Collector,
    remaining: Arc<AtomicUsize>,
    token: CancellationToken,
}

#[async_trait]
impl Handler for CancelAfter {
    async fn handle(&self, envelope: Envelope) -> Outcome {
        let outcome = self.inner.handle(envelope).await;
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.token.cancel();
        }
        outcome
    }
}

#[derive(Clone, Default)]
struct CountingIdle(Arc<AtomicUsize>);

#[async_trait]
impl Idle for CountingIdle {
    async fn idle(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn bind_resolves_globs_against_the_catalog() {
    let broker = broker_with_topics(&[TOPIC_A, TOPIC_B, "transport.other.gamma"]).await;

    let set = PollerSet::bind(
        broker,
        MemoryCheckpointStore::new(),
        &poll_config(&["transport.site.*"]),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(set.topics(), vec![TOPIC_A, TOPIC_B]);
}

#[tokio::test]
async fn run_once_drains_pollers_round_robin() {
    let broker = broker_with_topics(&[TOPIC_A, TOPIC_B]).await;
    publish_texts(&broker, TOPIC_A, &["a1", "a2"]).await;
    publish_texts(&broker, TOPIC_B, &["b1"]).await;

    let set = PollerSet::bind(
        broker,
        MemoryCheckpointStore::new(),
        &poll_config(&[TOPIC_A, TOPIC_B]),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let collector = Collector::new();
    set.run_once(&collector).await.unwrap();

    // The first poller drains fully before the second starts.
    assert_eq!(collector.texts(), vec!["a1", "a2", "b1"]);
}

#[tokio::test]
async fn main_drains_and_idles_until_cancelled() {
    let broker = broker_with_topics(&[TOPIC_A]).await;
    publish_texts(&broker, TOPIC_A, &["one", "two", "three"]).await;

    let token = CancellationToken::new();
    let handler = CancelAfter {
        inner: Collector::new(),
        remaining: Arc::new(AtomicUsize::new(3)),
        token: token.clone(),
    };
    let idle = CountingIdle::default();

    let set = PollerSet::bind(
        broker,
        MemoryCheckpointStore::new(),
        &poll_config(&[TOPIC_A]),
        token,
    )
    .await
    .unwrap();

    set.main(&handler, &idle).await.unwrap();

    assert_eq!(handler.inner.texts(), vec!["one", "two", "three"]);
    // Cancellation during the drain means the loop never reached idle.
    assert_eq!(idle.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn main_exits_with_the_error_when_exit_on_error_is_set() {
    let broker = broker_with_topics(&[TOPIC_A]).await;
    publish_texts(&broker, TOPIC_A, &["one", "two"]).await;

    let config = PollConfig {
        exit_on_error: true,
        ..poll_config(&[TOPIC_A])
    };

    let set = PollerSet::bind(
        broker,
        MemoryCheckpointStore::new(),
        &config,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let handler = Scripted::new().plan(2, &[Step::Fail]);
    let error = set
        .main(&handler, &newspool_client::NoIdle)
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Fatal { seq: 2, .. }));
}

#[tokio::test]
async fn catchup_reset_reapplies_every_cycle() {
    let broker = broker_with_topics(&[TOPIC_A]).await;
    publish_texts(&broker, TOPIC_A, &["stale1", "stale2", "stale3"]).await;

    let config = PollConfig {
        catchup: -1,
        catchup_reset: true,
        ..poll_config(&[TOPIC_A])
    };

    let set = PollerSet::bind(
        broker.clone(),
        MemoryCheckpointStore::new(),
        &config,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    // Only the most recent message survives the initial catchup.
    let collector = Collector::new();
    set.run_once(&collector).await.unwrap();
    assert_eq!(collector.texts(), vec!["stale3"]);

    // More backlog arrives; the reset skips to the newest again even
    // though the checkpoint already advanced past the earlier ones.
    publish_texts(&broker, TOPIC_A, &["new1", "new2"]).await;
    let fresh = Collector::new();
    set.run_once(&fresh).await.unwrap();
    assert_eq!(fresh.texts(), vec!["new2"]);
}
