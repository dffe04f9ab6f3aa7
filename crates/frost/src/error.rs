//! Error type for the frost capability crate.
use roast_protocol::ParticipantId;
use thiserror::Error;

/// Errors raised by the FROST capability surface.
#[derive(Debug, Error)]
pub enum Error {
    /// A FROST operation failed.
    #[error(transparent)]
    Frost(#[from] frost_secp256k1_tr::Error),

    /// JSON serialization failed while hashing.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A byte string is not a valid curve point.
    #[error("invalid curve point")]
    InvalidPoint,

    /// A participant has no verifying share under the key.
    #[error("no verifying share for participant {0}")]
    UnknownParticipant(ParticipantId),
}
