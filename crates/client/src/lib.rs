//! Client-side machinery of the newspool transport: pollers that drain
//! topics through durable checkpoints, posters that publish envelopes, and
//! a synchronized merge consumer that interleaves several topics into one
//! time-ordered stream.
//!
//! Everything is generic over the [`newspool_broker::Broker`] and
//! [`newspool_checkpoint::CheckpointStore`] traits, so the same control flow
//! runs against the NNTP driver in production and the in-memory
//! implementations in tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod binding;
mod config;
mod error;
mod outcome;
mod poller;
mod poster;
mod set;
mod sync;
mod util;

pub use binding::resolve_binding;
pub use config::{PollConfig, PostConfig};
pub use error::Error;
pub use outcome::{Handler, HandlerFn, Idle, NoIdle, Outcome};
pub use poller::{Poller, PollerOptions, Processed};
pub use poster::{PostFile, Poster};
pub use set::PollerSet;
pub use sync::SyncGroup;
