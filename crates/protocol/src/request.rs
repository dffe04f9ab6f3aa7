//! One-shot request and response shapes.
use crate::{
    AggregateKeyInfo, AuthChallenge, DkgAckQuery, DkgCommitment,
    EncryptedDkgSecret, EncryptedKeyShare, Expiry, GroupFingerprint,
    GroupKey, NewDkgDetails, ParticipantId, RequestId,
    SchnorrSignature, SessionId, SignatureReply, SignatureRoundStart,
    SignaturesRequestDetails, Signed, SignedDkgAck, SigningCommitment,
    ThresholdSignature,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A client request, processed one at a time by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ClientRequest {
    /// Start a login, asking for a fresh challenge.
    Login {
        /// Fingerprint of the group the client believes it is in.
        group: GroupFingerprint,
        /// Identifier of the participant logging in.
        participant_id: ParticipantId,
        /// Protocol version spoken by the client.
        protocol_version: u16,
    },
    /// Answer a login challenge with a signature over it.
    RespondChallenge {
        /// The challenge, signed with the long-term key.
        challenge: Signed<AuthChallenge>,
    },
    /// Refresh the expiry of a live session.
    ExtendSession {
        /// The session to extend.
        session_id: SessionId,
    },
    /// Create a new named DKG, committing in the same call.
    RequestNewDkg {
        /// The caller's session.
        session_id: SessionId,
        /// Signed parameters of the DKG.
        details: Signed<NewDkgDetails>,
        /// The caller's round 1 commitment.
        commitment: DkgCommitment,
    },
    /// Reject (and thereby remove) a named DKG.
    RejectDkg {
        /// The caller's session.
        session_id: SessionId,
        /// Name of the DKG to reject.
        name: String,
    },
    /// Submit a round 1 commitment for a named DKG.
    SubmitDkgCommitment {
        /// The caller's session.
        session_id: SessionId,
        /// Name of the DKG.
        name: String,
        /// The caller's round 1 commitment.
        commitment: DkgCommitment,
    },
    /// Submit round 2 secrets for a named DKG.
    SubmitDkgRound2 {
        /// The caller's session.
        session_id: SessionId,
        /// Name of the DKG.
        name: String,
        /// Signature over the expected commitment-set hash.
        commitment_set_signature: SchnorrSignature,
        /// Encrypted secret for every other participant.
        secrets: BTreeMap<ParticipantId, EncryptedDkgSecret>,
    },
    /// Store and fan out signed DKG acknowledgements.
    SendDkgAcks {
        /// The caller's session.
        session_id: SessionId,
        /// The acknowledgements to store.
        acks: Vec<SignedDkgAck>,
    },
    /// Fetch cached acknowledgements, asking peers for the rest.
    RequestDkgAcks {
        /// The caller's session.
        session_id: SessionId,
        /// The acknowledgements wanted.
        requests: Vec<DkgAckQuery>,
    },
    /// Start coordinating a new set of threshold signatures.
    RequestSignatures {
        /// The caller's session.
        session_id: SessionId,
        /// Aggregate key material for every referenced group key.
        keys: Vec<AggregateKeyInfo>,
        /// Signed request details.
        details: Signed<SignaturesRequestDetails>,
        /// The caller's first commitment for each signature.
        commitments: Vec<SigningCommitment>,
    },
    /// Decline to take part in a signatures request.
    RejectSignatures {
        /// The caller's session.
        session_id: SessionId,
        /// The request being declined.
        request_id: RequestId,
    },
    /// Submit commitments and shares for a signatures request.
    SubmitSignatureReplies {
        /// The caller's session.
        session_id: SessionId,
        /// The request being answered.
        request_id: RequestId,
        /// One entry per addressed signature.
        replies: Vec<SignatureReply>,
    },
    /// Post encrypted recovery shares for other participants.
    ShareSecretShares {
        /// The caller's session.
        session_id: SessionId,
        /// The group key the shares belong to.
        group_key: GroupKey,
        /// Encrypted share per receiver.
        shares: BTreeMap<ParticipantId, EncryptedKeyShare>,
    },
}

/// A server response to a single [`ClientRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClientResponse {
    /// A fresh login challenge.
    Challenge {
        /// Nonce to sign and return.
        challenge: AuthChallenge,
    },
    /// A session was created; the full state snapshot follows.
    SessionCreated(LoginSnapshot),
    /// The session expiry was refreshed.
    SessionExtended {
        /// The new expiry.
        expiry: Expiry,
    },
    /// The request was applied and has no payload to return.
    Ack,
    /// Cached acknowledgements held by the server.
    DkgAcks {
        /// The acknowledgements found in the cache.
        acks: Vec<SignedDkgAck>,
    },
    /// New signing rounds in which the caller takes part.
    SignatureNewRounds {
        /// The opened rounds.
        rounds: Vec<SignatureRoundStart>,
    },
    /// All requested signatures are complete.
    SignaturesComplete {
        /// The aggregated signatures, in request order.
        signatures: Vec<ThresholdSignature>,
    },
}

/// A DKG awaiting commitments, as offered to a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkgOffer {
    /// Signed parameters of the DKG.
    pub details: Signed<NewDkgDetails>,
    /// The participant that created the DKG.
    pub creator: ParticipantId,
    /// Round 1 commitments collected so far, in arrival order.
    pub commitments: Vec<(ParticipantId, DkgCommitment)>,
}

/// An in-flight signatures request, as offered to a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRequestOffer {
    /// Signed request details.
    pub details: Signed<SignaturesRequestDetails>,
    /// The participant that created the request.
    pub creator: ParticipantId,
}

/// Signing rounds of one request still waiting on the participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSignatureRounds {
    /// The signatures request.
    pub request_id: RequestId,
    /// Rounds in which the participant owes a share.
    pub rounds: Vec<SignatureRoundStart>,
}

/// A completed signatures request retained by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedSignaturesInfo {
    /// Signed request details.
    pub details: Signed<SignaturesRequestDetails>,
    /// The aggregated signatures, in request order.
    pub signatures: Vec<ThresholdSignature>,
    /// The participant that created the request.
    pub creator: ParticipantId,
}

/// A recovery share waiting for the participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSecretShare {
    /// The group key the share belongs to.
    pub group_key: GroupKey,
    /// The participant that posted the share.
    pub sender: ParticipantId,
    /// The encrypted share.
    pub key_share: EncryptedKeyShare,
}

/// Snapshot of the server state returned on login; the client's
/// re-hydration primitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSnapshot {
    /// The fresh session identifier.
    pub session_id: SessionId,
    /// Expiry of the session.
    pub expiry: Expiry,
    /// Participants with a live session at login time.
    pub online_participants: BTreeSet<ParticipantId>,
    /// DKGs collecting round 1 commitments.
    pub new_dkgs: Vec<DkgOffer>,
    /// In-flight signatures requests.
    pub signature_requests: Vec<SignatureRequestOffer>,
    /// Open rounds in which the participant owes a share.
    pub signature_rounds: Vec<PendingSignatureRounds>,
    /// Completed requests the participant has not acknowledged.
    pub completed_signatures: Vec<CompletedSignaturesInfo>,
    /// Recovery shares addressed to the participant.
    pub secret_shares: Vec<PendingSecretShare>,
}
