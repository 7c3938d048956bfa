//! Mirror error types.

use thiserror::Error;

use crate::entity::{DecodeError, EntityKey};

/// Failure to apply a single change. Reported per change; the rest of the
/// batch is still applied.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("No mirrored entity with identity {0}")]
    NotFound(EntityKey),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
