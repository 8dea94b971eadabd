//! Writer error definitions.

use thiserror::Error;

/// A serialization error.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("index pad too small: need {needed} bytes, reserved {available}")]
    IndexPadInsufficient { needed: usize, available: usize },

    #[error("cannot patch an index into a non-seekable sink")]
    NonSeekableSinkWithIndex,

    #[error("pending trailing-dot symbol cannot be serialized (node at byte {offset})")]
    PendingSymbol { offset: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
