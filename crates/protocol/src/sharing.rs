//! Recovery-share exchange wire types.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recovery share for one receiver, ECDH-encrypted by the sender;
/// the server routes it without being able to read it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyShare(
    #[serde(with = "hex::serde")] pub Vec<u8>,
);

impl fmt::Debug for EncryptedKeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedKeyShare({} bytes)", self.0.len())
    }
}
