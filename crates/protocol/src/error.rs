//! Error types for the protocol crate.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while encoding, decoding or signing protocol
/// values.
#[derive(Debug, Error)]
pub enum Error {
    /// Input could not be interpreted as hexadecimal.
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    /// JSON serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Schnorr signing rejected the key or message.
    #[error(transparent)]
    Signature(#[from] k256::schnorr::signature::Error),

    /// A byte string had the wrong length for the target type.
    #[error("expected {0} bytes, got {1}")]
    BadLength(usize, usize),
}

/// Reason a client request was refused.
///
/// Every variant is recoverable at the caller; the server state stays
/// usable for future valid requests. The one deliberate exception is
/// the signature-reply family, which records the caller as malicious
/// before raising.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum InvalidRequest {
    /// The client spoke an unsupported protocol version.
    #[error("unsupported protocol version")]
    InvalidProtoVersion,
    /// The group fingerprint does not match the configured group.
    #[error("group fingerprint mismatch")]
    GroupMismatch,
    /// The participant identifier is not part of the group.
    #[error("no such participant in the group")]
    NoParticipant,
    /// No live session matches the supplied session identifier.
    #[error("no such session")]
    NoSession,
    /// No pending challenge matches the signed nonce.
    #[error("no such login challenge")]
    NoChallenge,
    /// The challenge signature did not verify.
    #[error("invalid challenge signature")]
    InvalidChallengeSig,
    /// No DKG is registered under the supplied name.
    #[error("no such DKG")]
    NoDkg,
    /// The DKG is not collecting round 1 commitments.
    #[error("DKG is not in round 1")]
    NotRound1Dkg,
    /// The DKG is not collecting round 2 secrets.
    #[error("DKG is not in round 2")]
    NotRound2Dkg,
    /// A DKG with this name already exists.
    #[error("DKG name already in use")]
    DkgRequestExists,
    /// The caller already committed to this DKG.
    #[error("commitment already recorded")]
    DkgCommitmentExists,
    /// The caller already provided round 2 secrets.
    #[error("round 2 secrets already sent")]
    DkgRound2Sent,
    /// The threshold is zero or exceeds the group size.
    #[error("invalid threshold")]
    InvalidThreshold,
    /// The DKG request signature did not verify.
    #[error("invalid DKG request signature")]
    InvalidDkgReqSig,
    /// The commitment set signature did not verify.
    #[error("invalid commitment set signature")]
    InvalidDkgCommitmentSetSignature,
    /// The round 2 secret map does not cover exactly the other
    /// participants.
    #[error("invalid round 2 secret map")]
    InvalidSecretMap,
    /// A DKG acknowledgement signature did not verify.
    #[error("invalid DKG acknowledgement signature")]
    InvalidDkgAckSignature,
    /// A participant may not request its own acknowledgement.
    #[error("cannot request own acknowledgement")]
    CannotRequestSelfAck,
    /// The commitment count does not match the requested signatures.
    #[error("wrong number of commitments")]
    WrongCommitmentNum,
    /// The supplied key set does not match the requested signatures.
    #[error("wrong signature key set")]
    WrongSigKeys,
    /// A signatures request with this identifier already exists.
    #[error("signatures request already exists")]
    SigRequestExists,
    /// The signatures request signature did not verify.
    #[error("invalid signatures request signature")]
    InvalidSigReqSignature,
    /// The requested expiry is below the configured minimum.
    #[error("expiry too soon")]
    ExpiryTooSoon,
    /// The requested expiry is above the configured maximum.
    #[error("expiry too late")]
    ExpiryTooLate,
    /// The caller was previously marked malicious for this request.
    #[error("marked malicious")]
    MarkedMalicious,
    /// A signature reply carried no entries.
    #[error("empty signature reply")]
    EmptySigReply,
    /// A signature reply addressed the same signature twice.
    #[error("duplicate signature reply")]
    DuplicateSigReply,
    /// A signature reply named a signature that does not exist.
    #[error("signature index out of range")]
    InvalidSigIndex,
    /// The caller already queued a commitment for this signature.
    #[error("next commitment already recorded")]
    NextCommitmentExists,
    /// A share arrived without a matching signing round.
    #[error("unsolicited signature share")]
    UnsolicitedShare,
    /// A signing round is open but the reply carried no share.
    #[error("missing signature share")]
    MissingShare,
    /// The signature share failed verification.
    #[error("invalid signature share")]
    InvalidShare,
    /// The recovery share map is empty, names the caller, or names a
    /// stranger.
    #[error("invalid key share map")]
    InvalidKeyShareMap,
}
