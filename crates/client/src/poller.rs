use std::time::Duration;

use newspool_broker::{Broker, BrokerError};
use newspool_checkpoint::{CheckpointKey, CheckpointStore};
use newspool_envelope::Envelope;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::outcome::{Handler, Outcome};
use crate::util::wait;

/// Options for a single-topic poller.
#[derive(Clone, Debug)]
pub struct PollerOptions {
    /// Checkpoint key prefix, for processes binding a topic more than once.
    pub checkpoint_prefix: Option<String>,

    /// Delay before re-delivering a message whose handler requested retry.
    pub retry_wait: Duration,

    /// Propagate handler failures instead of skipping the message.
    pub strict: bool,

    /// Process at most one message per drain cycle.
    pub single_shot: bool,

    /// Shutdown signal, consulted before each fetch and inside every wait.
    pub token: CancellationToken,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            checkpoint_prefix: None,
            retry_wait: Duration::from_secs(60),
            strict: false,
            single_shot: false,
            token: CancellationToken::new(),
        }
    }
}

/// How one envelope left the processing loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Processed {
    /// The envelope was handled (or deliberately skipped) and the
    /// checkpoint advanced past it.
    Done,

    /// Shutdown was requested before processing finished; the checkpoint
    /// was not advanced.
    Stopped,
}

/// A single-topic consumer with a durable cursor.
///
/// The poller owns its checkpoint key exclusively: no other consumer may
/// track the same `(prefix, topic)` pair. Delivery is strictly in sequence
/// order and at-least-once; the checkpoint moves only after the handler
/// reports success (or a poison message is skipped).
#[derive(Clone, Debug)]
pub struct Poller<B, C> {
    broker: B,
    checkpoints: C,
    topic: String,
    key: CheckpointKey,
    retry_wait: Duration,
    strict: bool,
    single_shot: bool,
    token: CancellationToken,
}

impl<B, C> Poller<B, C>
where
    B: Broker,
    C: CheckpointStore,
{
    /// Creates a poller bound to one topic.
    #[must_use]
    pub fn new(broker: B, checkpoints: C, topic: impl Into<String>, options: PollerOptions) -> Self {
        let topic = topic.into();

        let key = match &options.checkpoint_prefix {
            Some(prefix) => CheckpointKey::prefixed(prefix.clone(), topic.clone()),
            None => CheckpointKey::topic(topic.clone()),
        };

        Self {
            broker,
            checkpoints,
            topic,
            key,
            retry_wait: options.retry_wait,
            strict: options.strict,
            single_shot: options.single_shot,
            token: options.token,
        }
    }

    /// The topic this poller drains.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Fetches the next unseen message, if one is currently available.
    ///
    /// Returns `Ok(None)` when the topic has nothing new, when a transient
    /// broker failure defers work to the next cycle, or when a vanished or
    /// undecodable message was stepped over (its sequence number is
    /// checkpointed so it is never retried as new).
    ///
    /// # Errors
    ///
    /// Permanent broker failures and checkpoint store failures surface to
    /// the caller.
    pub async fn next_message(&self) -> Result<Option<Envelope>, Error> {
        let bounds = match self.broker.topic_bounds(&self.topic).await {
            Ok(bounds) => bounds,
            Err(e) if e.is_transient() => {
                debug!(topic = %self.topic, error = %e, "failed to get topic bounds");
                return Ok(None);
            }
            Err(e) => return Err(Error::broker(e)),
        };

        debug!(
            topic = %self.topic,
            low = bounds.low,
            high = bounds.high,
            "topic has {} messages",
            bounds.count()
        );

        if bounds.is_empty() {
            return Ok(None);
        }

        let mut cursor = self
            .checkpoints
            .load(&self.key)
            .await
            .map_err(Error::checkpoint)?
            .unwrap_or_else(|| bounds.floor());

        // A cursor outside the current marks means the topic was recreated
        // or rotated; resynchronize to the start of what exists now.
        if !bounds.contains_cursor(cursor) {
            debug!(topic = %self.topic, cursor, "catching up to available messages");
            cursor = bounds.floor();
        }

        let next = cursor + 1;
        if next > bounds.high {
            debug!(topic = %self.topic, "no new messages");
            return Ok(None);
        }

        match self.broker.fetch(&self.topic, next).await {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) if e.is_transient() => {
                debug!(topic = %self.topic, seq = next, error = %e, "fetch deferred");
                Ok(None)
            }
            Err(e) => {
                // Vanished or unreadable; step past it rather than stalling
                // the topic.
                warn!(topic = %self.topic, seq = next, error = %e, "skipping message");
                self.save(next).await?;
                Ok(None)
            }
        }
    }

    /// Runs the handler on one envelope, honoring retry semantics.
    ///
    /// A retry outcome re-delivers the same envelope after the retry wait,
    /// indefinitely, without touching the checkpoint. Any other outcome
    /// advances the checkpoint: success directly, failure by skipping the
    /// poison message (unless strict mode is on, in which case the failure
    /// propagates and nothing is advanced).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] for handler failures in strict mode and
    /// [`Error::Checkpoint`] when the new cursor cannot be persisted.
    pub async fn process<H: Handler>(
        &self,
        envelope: &Envelope,
        handler: &H,
    ) -> Result<Processed, Error> {
        let seq = envelope.sequence();

        loop {
            if self.token.is_cancelled() {
                return Ok(Processed::Stopped);
            }

            debug!(topic = %self.topic, seq, "processing message");

            match handler.handle(envelope.clone()).await {
                Outcome::Success => {
                    self.advance(seq).await?;
                    return Ok(Processed::Done);
                }
                Outcome::Retry => {
                    debug!(topic = %self.topic, seq, "handler requested retry");
                    if !wait(self.retry_wait, &self.token).await {
                        return Ok(Processed::Stopped);
                    }
                }
                Outcome::Failed(source) => {
                    if self.strict {
                        return Err(Error::Fatal {
                            topic: self.topic.clone(),
                            seq: seq.unwrap_or_default(),
                            source,
                        });
                    }

                    error!(topic = %self.topic, seq, error = %source, "handler failed, skipping message");
                    self.advance(seq).await?;
                    return Ok(Processed::Done);
                }
            }
        }
    }

    /// Drains currently available messages through `handler`.
    ///
    /// # Errors
    ///
    /// See [`Poller::next_message`] and [`Poller::process`].
    pub async fn poll<H: Handler>(&self, handler: &H) -> Result<(), Error> {
        while !self.token.is_cancelled() {
            let Some(envelope) = self.next_message().await? else {
                break;
            };

            if self.process(&envelope, handler).await? == Processed::Stopped {
                break;
            }

            if self.single_shot {
                break;
            }
        }

        debug!(topic = %self.topic, "end of polling cycle");
        Ok(())
    }

    /// Applies the catchup policy against the topic's current bounds.
    ///
    /// `catchup` positive skips everything currently queued; negative `-N`
    /// moves the cursor so at most the last N messages are delivered,
    /// never moving it backwards unless `reset` is set; zero does nothing.
    ///
    /// # Errors
    ///
    /// Checkpoint store failures surface; transient broker failures defer
    /// the catchup to the next opportunity.
    pub async fn mark_read(&self, catchup: i64, reset: bool) -> Result<(), Error> {
        if catchup == 0 {
            return Ok(());
        }

        let bounds = match self.broker.topic_bounds(&self.topic).await {
            Ok(bounds) => bounds,
            Err(e) if e.is_transient() => {
                debug!(topic = %self.topic, error = %e, "catchup deferred");
                return Ok(());
            }
            Err(e) => return Err(Error::broker(e)),
        };

        let cursor = self
            .checkpoints
            .load(&self.key)
            .await
            .map_err(Error::checkpoint)?
            .unwrap_or_else(|| bounds.floor());

        let target = if catchup > 0 {
            bounds.high
        } else {
            let back = bounds.high.saturating_sub(catchup.unsigned_abs());
            let floor = back.max(bounds.floor());
            if reset { floor } else { floor.max(cursor) }
        };

        debug!(
            topic = %self.topic,
            catchup,
            "marking read: old watermark={cursor}, new watermark={target}"
        );

        self.save(target).await
    }

    /// Blocks until the topic exists on the broker, re-checking on a fixed
    /// interval. Returns false when shutdown was requested first.
    ///
    /// # Errors
    ///
    /// Permanent broker failures surface to the caller.
    pub async fn wait_for_topic(&self, interval: Duration) -> Result<bool, Error> {
        loop {
            match self.broker.topic_exists(&self.topic).await {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    error!(
                        topic = %self.topic,
                        "polling topic does not exist yet, waiting to retry"
                    );
                }
                Err(e) if e.is_transient() => {
                    warn!(topic = %self.topic, error = %e, "broker unavailable during topic check");
                }
                Err(e) => return Err(Error::broker(e)),
            }

            if !wait(interval, &self.token).await {
                return Ok(false);
            }
        }
    }

    async fn advance(&self, seq: Option<u64>) -> Result<(), Error> {
        if let Some(seq) = seq {
            self.save(seq).await?;
        }
        Ok(())
    }

    async fn save(&self, seq: u64) -> Result<(), Error> {
        self.checkpoints
            .save(&self.key, seq)
            .await
            .map_err(Error::checkpoint)
    }
}
