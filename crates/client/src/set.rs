use std::time::Duration;

use newspool_broker::Broker;
use newspool_checkpoint::CheckpointStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::binding::resolve_binding;
use crate::config::PollConfig;
use crate::error::Error;
use crate::outcome::{Handler, Idle};
use crate::poller::{Poller, PollerOptions};
use crate::util::wait;

/// How long to wait between existence checks for a missing polling topic.
const MISSING_TOPIC_RECHECK: Duration = Duration::from_secs(60);

/// A bound set of pollers driven round-robin as one process loop.
///
/// The binding (pattern expansion against the catalog) happens once, at
/// [`PollerSet::bind`]; picking up newly created topics means binding
/// again.
#[derive(Clone, Debug)]
pub struct PollerSet<B, C> {
    pub(crate) pollers: Vec<Poller<B, C>>,
    pub(crate) rate: Duration,
    pub(crate) catchup: i64,
    pub(crate) catchup_reset: bool,
    pub(crate) exit_on_error: bool,
    pub(crate) token: CancellationToken,
}

impl<B, C> PollerSet<B, C>
where
    B: Broker,
    C: CheckpointStore,
{
    /// Resolves the binding and applies the initial catchup policy.
    ///
    /// When catchup is requested, this waits for each bound topic to exist
    /// first; a brand-new process group's topics may take a little while to
    /// show up after its producers create them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] for malformed patterns and surfaces
    /// permanent broker/checkpoint failures.
    pub async fn bind(
        broker: B,
        checkpoints: C,
        config: &PollConfig,
        token: CancellationToken,
    ) -> Result<Self, Error> {
        let topics = resolve_binding(&broker, &config.topics, &config.exclude).await?;

        debug!("creating pollers:");

        let pollers = topics
            .into_iter()
            .map(|topic| {
                debug!(" - [{}:{}] {topic}", config.host, config.port);

                Poller::new(
                    broker.clone(),
                    checkpoints.clone(),
                    topic,
                    PollerOptions {
                        checkpoint_prefix: config.checkpoint_prefix.clone(),
                        retry_wait: config.retry_wait,
                        strict: config.exit_on_error,
                        single_shot: config.single_shot,
                        token: token.clone(),
                    },
                )
            })
            .collect();

        let set = Self {
            pollers,
            rate: config.rate,
            catchup: config.catchup,
            catchup_reset: config.catchup_reset,
            exit_on_error: config.exit_on_error,
            token,
        };

        if set.catchup == 0 {
            debug!("starting from the checkpointed cursor");
        } else {
            set.apply_catchup().await?;
        }

        Ok(set)
    }

    async fn apply_catchup(&self) -> Result<(), Error> {
        for poller in &self.pollers {
            if !poller.wait_for_topic(MISSING_TOPIC_RECHECK).await? {
                return Ok(());
            }
            poller.mark_read(self.catchup, self.catchup_reset).await?;
        }
        Ok(())
    }

    /// The pollers in registration order.
    #[must_use]
    pub fn pollers(&self) -> &[Poller<B, C>] {
        &self.pollers
    }

    /// The concrete topics this set was bound to.
    #[must_use]
    pub fn topics(&self) -> Vec<&str> {
        self.pollers.iter().map(Poller::topic).collect()
    }

    /// Drains every poller once, round-robin.
    ///
    /// # Errors
    ///
    /// See [`Poller::poll`].
    pub async fn run_once<H: Handler>(&self, handler: &H) -> Result<(), Error> {
        for poller in &self.pollers {
            if self.token.is_cancelled() {
                break;
            }

            if self.catchup_reset && self.catchup != 0 {
                poller.mark_read(self.catchup, true).await?;
            }

            poller.poll(handler).await?;
        }

        Ok(())
    }

    /// The process outer loop: wait one rate interval, drain all pollers,
    /// run the idle hook, repeat until shutdown.
    ///
    /// Cycle errors are logged and the next cycle proceeds, unless
    /// `exit_on_error` is configured, in which case the first error
    /// terminates the loop.
    ///
    /// # Errors
    ///
    /// Only with `exit_on_error` set.
    pub async fn main<H: Handler, I: Idle>(&self, handler: &H, idle: &I) -> Result<(), Error> {
        loop {
            if !wait(self.rate, &self.token).await {
                return Ok(());
            }

            if let Err(e) = self.run_once(handler).await {
                error!(error = %e, "error detected during polling");
                if self.exit_on_error {
                    return Err(e);
                }
            }

            if self.token.is_cancelled() {
                return Ok(());
            }

            idle.idle().await;
        }
    }
}
