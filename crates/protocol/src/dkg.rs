//! Distributed key generation wire types.
use crate::{Expiry, GroupKey, ParticipantId, Signed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Public round 1 package broadcast by each participant.
pub type DkgCommitment =
    frost_secp256k1_tr::keys::dkg::round1::Package;

/// Parameters of a new DKG, signed by its creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDkgDetails {
    /// Unique name for the generated key.
    pub name: String,
    /// Free-form description shown to participants.
    pub description: String,
    /// Signing threshold `t` for the generated key.
    pub threshold: u16,
    /// Deadline for the whole DKG.
    pub expiry: Expiry,
}

/// Acknowledgement that a participant does (or does not) hold a
/// valid share for a group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgAck {
    /// The group key being acknowledged.
    pub group_key: GroupKey,
    /// Whether the signer holds a valid share.
    pub accepted: bool,
}

/// A [`DkgAck`] together with the identifier of its signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDkgAck {
    /// Identifier of the acknowledging participant.
    pub signer: ParticipantId,
    /// The signed acknowledgement.
    pub ack: Signed<DkgAck>,
}

/// Request for cached acknowledgements of a group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgAckQuery {
    /// Participants whose acknowledgements are wanted.
    pub ids: BTreeSet<ParticipantId>,
    /// The group key the acknowledgements refer to.
    pub group_key: GroupKey,
}

/// Round 2 secret addressed to a single recipient, encrypted by the
/// sender; the server routes it without being able to read it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDkgSecret(
    #[serde(with = "hex::serde")] pub Vec<u8>,
);

impl fmt::Debug for EncryptedDkgSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedDkgSecret({} bytes)", self.0.len())
    }
}
