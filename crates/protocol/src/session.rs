//! Login challenges and session identifiers.
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Identifier for live sessions.
pub type SessionId = uuid::Uuid;

/// Fresh random nonce identifying a pending login.
///
/// A challenge is used once: the client returns it signed with its
/// long-term key and the server discards it on success.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct AuthChallenge {
    /// Random nonce bytes.
    #[serde(with = "hex::serde")]
    pub nonce: [u8; 16],
}

impl AuthChallenge {
    /// Generate a fresh random challenge.
    pub fn generate() -> Self {
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);
        Self { nonce }
    }
}
