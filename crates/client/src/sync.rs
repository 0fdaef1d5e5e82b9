use newspool_broker::Broker;
use newspool_checkpoint::CheckpointStore;
use newspool_envelope::Envelope;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::PollConfig;
use crate::error::Error;
use crate::outcome::{Handler, Idle};
use crate::poller::Processed;
use crate::set::PollerSet;
use crate::util::wait;

/// Merges several topics into one time-ordered stream.
///
/// Each bound poller gets a single-slot look-ahead buffer. Every cycle the
/// group refills empty slots, hands the envelope with the oldest effective
/// timestamp to the handler, and only then lets that poller fetch again, so
/// per-topic sequence order is never violated and at most one message per
/// topic is in flight.
///
/// Cross-topic ordering is only as trustworthy as the timestamps producers
/// supply; a backdated message sorts by its claimed time, not its arrival.
#[derive(Debug)]
pub struct SyncGroup<B, C> {
    set: PollerSet<B, C>,
    slots: Vec<Option<Envelope>>,
}

impl<B, C> SyncGroup<B, C>
where
    B: Broker,
    C: CheckpointStore,
{
    /// Resolves the binding, as [`PollerSet::bind`] does, with one empty
    /// look-ahead slot per topic.
    ///
    /// # Errors
    ///
    /// See [`PollerSet::bind`].
    pub async fn bind(
        broker: B,
        checkpoints: C,
        config: &PollConfig,
        token: CancellationToken,
    ) -> Result<Self, Error> {
        let set = PollerSet::bind(broker, checkpoints, config, token).await?;
        let slots = vec![None; set.pollers.len()];

        Ok(Self { set, slots })
    }

    /// The concrete topics this group was bound to.
    #[must_use]
    pub fn topics(&self) -> Vec<&str> {
        self.set.topics()
    }

    /// Refills every empty slot with its poller's next available message.
    async fn refill(&mut self) -> Result<(), Error> {
        for (poller, slot) in self.set.pollers.iter().zip(self.slots.iter_mut()) {
            if slot.is_none() {
                *slot = poller.next_message().await?;
            }
        }
        Ok(())
    }

    /// Index of the filled slot with the oldest timestamp; ties go to the
    /// earliest-registered poller.
    fn oldest(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .map(|envelope| (envelope.timestamp(), index))
            })
            .min()
            .map(|(_, index)| index)
    }

    /// Drains all currently available messages in merged timestamp order.
    ///
    /// # Errors
    ///
    /// See [`Poller::process`](crate::Poller::process).
    pub async fn run_once<H: Handler>(&mut self, handler: &H) -> Result<(), Error> {
        while !self.set.token.is_cancelled() {
            self.refill().await?;

            let Some(index) = self.oldest() else {
                break;
            };

            let Some(envelope) = self.slots[index].take() else {
                break;
            };

            debug!(
                topic = %self.set.pollers[index].topic(),
                seq = envelope.sequence(),
                "merge selected message"
            );

            match self.set.pollers[index].process(&envelope, handler).await? {
                Processed::Done => {}
                Processed::Stopped => {
                    // Checkpoint untouched; keep the envelope buffered so a
                    // resumed group re-delivers it.
                    self.slots[index] = Some(envelope);
                    break;
                }
            }
        }

        Ok(())
    }

    /// The process outer loop for a merged consumer, mirroring
    /// [`PollerSet::main`].
    ///
    /// # Errors
    ///
    /// Only with `exit_on_error` set.
    pub async fn main<H: Handler, I: Idle>(&mut self, handler: &H, idle: &I) -> Result<(), Error> {
        loop {
            if !wait(self.set.rate, &self.set.token).await {
                return Ok(());
            }

            if let Err(e) = self.run_once(handler).await {
                error!(error = %e, "error detected during synchronized polling");
                if self.set.exit_on_error {
                    return Err(e);
                }
            }

            if self.set.token.is_cancelled() {
                return Ok(());
            }

            idle.idle().await;
        }
    }
}
