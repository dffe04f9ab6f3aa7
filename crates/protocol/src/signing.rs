//! Threshold-signing wire types.
use crate::{Error, Expiry, GroupKey, ParticipantId, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Per-round signing commitment from one participant.
pub type SigningCommitment =
    frost_secp256k1_tr::round1::SigningCommitments;

/// Signature share produced by one participant for one round.
pub type SignatureShare =
    frost_secp256k1_tr::round2::SignatureShare;

/// Public verifying share of one participant under a group key.
pub type VerifyingShare = frost_secp256k1_tr::keys::VerifyingShare;

/// Identifier of a signatures request: a 16-byte fingerprint
/// derived from the request details.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct RequestId(#[serde(with = "hex::serde")] pub [u8; 16]);

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", hex::encode(self.0))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The message to sign and how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDetails {
    /// Message (typically a sighash digest) to sign.
    #[serde(with = "hex::serde")]
    pub message: Vec<u8>,
    /// Taproot sighash type byte.
    pub sighash_type: u8,
}

/// One requested signature: message, group key and derivation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleSignatureDetails {
    /// Message and sighash type.
    pub sign: SignDetails,
    /// The group key the signature is requested under.
    pub group_key: GroupKey,
    /// HD derivation path applied to the group key.
    pub derivation: Vec<u32>,
}

/// Details of a signatures request, signed by its creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturesRequestDetails {
    /// Fingerprint identifying the request.
    pub id: RequestId,
    /// The signatures to produce.
    pub required: Vec<SingleSignatureDetails>,
    /// Deadline for the whole request.
    pub expiry: Expiry,
}

impl SignaturesRequestDetails {
    /// Build details with the identifier derived from the content.
    pub fn new(
        required: Vec<SingleSignatureDetails>,
        expiry: Expiry,
    ) -> Result<Self> {
        let id = Self::fingerprint(&required, expiry)?;
        Ok(Self {
            id,
            required,
            expiry,
        })
    }

    /// Fingerprint over the request content.
    pub fn fingerprint(
        required: &[SingleSignatureDetails],
        expiry: Expiry,
    ) -> Result<RequestId> {
        let bytes =
            serde_json::to_vec(&(required, expiry)).map_err(Error::Json)?;
        let digest = Sha256::digest(&bytes);
        let mut id = [0u8; 16];
        id.copy_from_slice(&digest[..16]);
        Ok(RequestId(id))
    }
}

/// Aggregate public key material for one group key: the threshold
/// and every participant's verifying share.
///
/// The verifying-share map covers the whole group; its sorted order
/// is the group's canonical participant order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateKeyInfo {
    /// The aggregated group public key.
    pub group_key: GroupKey,
    /// Signing threshold `t` of the key.
    pub threshold: u16,
    /// Verifying shares keyed by participant.
    pub verifying_shares: BTreeMap<ParticipantId, VerifyingShare>,
}

/// One entry of a signature reply: the addressed signature, a fresh
/// commitment for the next round and, when a round is open for the
/// caller, the share for that round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureReply {
    /// Index into the request's signature list.
    pub sig_index: u32,
    /// Commitment queued for the next round.
    pub next_commitment: SigningCommitment,
    /// Share for the caller's open round, if any.
    pub share: Option<SignatureShare>,
}

/// Commitment set opening a new signing round for one signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRoundStart {
    /// Index into the request's signature list.
    pub sig_index: u32,
    /// Commitments of the round's participants.
    pub commitments: BTreeMap<ParticipantId, SigningCommitment>,
}

/// Final aggregated Schnorr signature bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSignature(
    #[serde(with = "hex::serde")] pub Vec<u8>,
);

impl fmt::Debug for ThresholdSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThresholdSignature({})", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::time::Duration;

    #[test]
    fn request_id_tracks_content() -> Result<()> {
        let expiry = Expiry::after(Duration::from_secs(60));
        let details = SingleSignatureDetails {
            sign: SignDetails {
                message: vec![7u8; 32],
                sighash_type: 0,
            },
            group_key: GroupKey(vec![2u8; 33]),
            derivation: vec![0, 1],
        };

        let a = SignaturesRequestDetails::new(
            vec![details.clone()],
            expiry,
        )?;
        let b = SignaturesRequestDetails::new(
            vec![details.clone(), details],
            expiry,
        )?;
        assert_ne!(a.id, b.id);
        Ok(())
    }
}
