//! Server-push events dispatched on per-session streams.
use crate::{
    DkgAckQuery, DkgCommitment, DkgOffer, EncryptedDkgSecret,
    ParticipantId, PendingSecretShare, RequestId, SchnorrSignature,
    SignatureRequestOffer, SignatureRoundStart, SignedDkgAck,
    ThresholdSignature,
};
use serde::{Deserialize, Serialize};

/// Events pushed by the server to a session's event stream.
///
/// Delivery is FIFO per session; there is no ordering guarantee
/// across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A participant logged in or out.
    ParticipantStatus {
        /// The participant whose status changed.
        participant_id: ParticipantId,
        /// Whether the participant is now logged in.
        logged_in: bool,
    },
    /// A new DKG was created.
    NewDkg(DkgOffer),
    /// A participant committed to a DKG round 1.
    DkgCommitment {
        /// Name of the DKG.
        name: String,
        /// The committing participant.
        participant: ParticipantId,
        /// The commitment.
        commitment: DkgCommitment,
    },
    /// A participant rejected a DKG; it no longer exists.
    DkgReject {
        /// Name of the rejected DKG.
        name: String,
        /// The rejecting participant.
        participant: ParticipantId,
    },
    /// A round 2 secret addressed to the receiving session.
    DkgRound2Share {
        /// Name of the DKG.
        name: String,
        /// The sender's signature over the commitment-set hash.
        commitment_set_signature: SchnorrSignature,
        /// The participant that produced the secret.
        sender: ParticipantId,
        /// The encrypted secret for the receiver.
        secret: EncryptedDkgSecret,
    },
    /// Newly stored acknowledgements from other participants.
    DkgAcks {
        /// The acknowledgements.
        acks: Vec<SignedDkgAck>,
    },
    /// A peer is looking for acknowledgements the cache lacks.
    DkgAckRequest {
        /// The acknowledgements still wanted.
        requests: Vec<DkgAckQuery>,
    },
    /// A new signatures request was created.
    SignaturesRequest(SignatureRequestOffer),
    /// New signing rounds involving the receiving session.
    SignatureNewRounds {
        /// The signatures request.
        request_id: RequestId,
        /// The opened rounds.
        rounds: Vec<SignatureRoundStart>,
    },
    /// A signatures request completed.
    SignaturesComplete {
        /// The completed request.
        request_id: RequestId,
        /// The aggregated signatures, in request order.
        signatures: Vec<ThresholdSignature>,
    },
    /// A signatures request failed: too few available signers.
    SignaturesFailure {
        /// The failed request.
        request_id: RequestId,
    },
    /// A recovery share addressed to the receiving session.
    SecretShare(PendingSecretShare),
    /// Periodic keepalive.
    Keepalive,
}
