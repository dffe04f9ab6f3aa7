//! Participant identifiers and the immutable group configuration.
use crate::{Error, Result};
use k256::schnorr::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Width of a participant identifier in bytes.
pub const PARTICIPANT_ID_LEN: usize = 4;

/// Short fixed-width opaque tag naming a participant within a group.
///
/// Identifiers are totally ordered; the sorted order of a group's
/// identifiers is the canonical participant order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId([u8; PARTICIPANT_ID_LEN]);

impl ParticipantId {
    /// Wrap raw identifier bytes.
    pub const fn new(bytes: [u8; PARTICIPANT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; PARTICIPANT_ID_LEN] {
        &self.0
    }

    /// Parse an identifier from its hex form.
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value)?;
        let bytes: [u8; PARTICIPANT_ID_LEN] =
            bytes.as_slice().try_into().map_err(|_| {
                Error::BadLength(PARTICIPANT_ID_LEN, bytes.len())
            })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", hex::encode(self.0))
    }
}

impl Serialize for ParticipantId {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

/// Long-term BIP-340 public key of a participant.
#[derive(Clone)]
pub struct ParticipantKey(VerifyingKey);

impl ParticipantKey {
    /// Wrap a verifying key.
    pub fn new(key: VerifyingKey) -> Self {
        Self(key)
    }

    /// The wrapped verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }

    /// X-only public key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }
}

impl PartialEq for ParticipantKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for ParticipantKey {}

impl fmt::Debug for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantKey({})", hex::encode(self.to_bytes()))
    }
}

impl Serialize for ParticipantKey {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for ParticipantKey {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        let bytes =
            hex::decode(&value).map_err(serde::de::Error::custom)?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(serde::de::Error::custom)?;
        Ok(Self(key))
    }
}

/// Stable hash identifying a group configuration.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct GroupFingerprint(
    #[serde(with = "hex::serde")] pub [u8; 32],
);

impl fmt::Debug for GroupFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupFingerprint({})", hex::encode(self.0))
    }
}

/// Immutable group configuration: an identifier and the mapping from
/// participant identifiers to long-term public keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Human-readable group identifier.
    pub id: String,
    /// Participants keyed by identifier.
    pub participants: BTreeMap<ParticipantId, ParticipantKey>,
}

impl GroupInfo {
    /// Number of participants `n`.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the group has no participants.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether the identifier belongs to the group.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    /// Long-term public key of a participant.
    pub fn key_of(&self, id: &ParticipantId) -> Option<&ParticipantKey> {
        self.participants.get(id)
    }

    /// Participant identifiers in canonical (sorted) order.
    pub fn sorted_ids(
        &self,
    ) -> impl Iterator<Item = &ParticipantId> + '_ {
        self.participants.keys()
    }

    /// Stable hash over the id and the participant mapping.
    pub fn fingerprint(&self) -> GroupFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        for (id, key) in &self.participants {
            hasher.update(id.as_bytes());
            hasher.update(key.to_bytes());
        }
        GroupFingerprint(hasher.finalize().into())
    }
}

/// Public key aggregated over a FROST key-share set.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GroupKey(#[serde(with = "hex::serde")] pub Vec<u8>);

impl GroupKey {
    /// The serialized group public key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupKey({})", hex::encode(&self.0))
    }
}
