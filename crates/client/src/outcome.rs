use async_trait::async_trait;
use newspool_envelope::Envelope;

/// The result a processing handler reports for one envelope.
///
/// The poller's control flow is driven entirely by this tag: success
/// advances the checkpoint, a retry request re-delivers the same envelope
/// after the retry wait, and a failure is either skipped (checkpoint still
/// advances) or, in strict mode, aborts the process.
#[derive(Debug)]
pub enum Outcome {
    /// The envelope was fully processed.
    Success,

    /// Processing should be attempted again later with the same envelope,
    /// e.g. a downstream sink is temporarily unavailable.
    Retry,

    /// Processing failed in a way retrying will not fix.
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

/// Processes envelopes delivered by a poller.
#[async_trait]
pub trait Handler
where
    Self: Send + Sync + 'static,
{
    /// Handles one envelope and reports the outcome.
    async fn handle(&self, envelope: Envelope) -> Outcome;
}

/// Adapts a plain function into a [`Handler`].
#[derive(Clone, Debug)]
pub struct HandlerFn<F>(F);

impl<F> HandlerFn<F>
where
    F: Fn(Envelope) -> Outcome + Send + Sync + 'static,
{
    /// Wraps `func` as a handler.
    pub const fn new(func: F) -> Self {
        Self(func)
    }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(Envelope) -> Outcome + Send + Sync + 'static,
{
    async fn handle(&self, envelope: Envelope) -> Outcome {
        (self.0)(envelope)
    }
}

/// Hook invoked between drain cycles, after all pollers have gone idle.
#[async_trait]
pub trait Idle
where
    Self: Send + Sync + 'static,
{
    /// Runs the idle work for one cycle.
    async fn idle(&self);
}

/// The default no-op idle hook.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIdle;

#[async_trait]
impl Idle for NoIdle {
    async fn idle(&self) {}
}
