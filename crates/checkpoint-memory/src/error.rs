use newspool_checkpoint::CheckpointError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {}

impl CheckpointError for Error {}
