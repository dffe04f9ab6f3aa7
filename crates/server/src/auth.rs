//! Login, challenge response and session extension.
use crate::{
    dkg::DkgRound,
    session::ClientSession,
    sharing::ReceiverShareState,
    state::{broadcast, PendingChallenge},
    Result, ServerState,
};
use roast_protocol::{
    AuthChallenge, CompletedSignaturesInfo, DkgOffer, Expiry,
    GroupFingerprint, InvalidRequest, LoginSnapshot, ParticipantId,
    PendingSecretShare, PendingSignatureRounds, ServerEvent,
    SessionId, Signed, SignatureRequestOffer, PROTOCOL_VERSION,
};
use std::collections::BTreeSet;
use std::time::Duration;

impl ServerState {
    /// Begin a login: validate the caller and hand out a challenge.
    pub fn handle_login(
        &mut self,
        group: GroupFingerprint,
        participant_id: ParticipantId,
        protocol_version: u16,
    ) -> Result<AuthChallenge> {
        self.expire();
        if protocol_version != PROTOCOL_VERSION {
            return Err(InvalidRequest::InvalidProtoVersion.into());
        }
        if group != self.fingerprint {
            return Err(InvalidRequest::GroupMismatch.into());
        }
        if !self.group().contains(&participant_id) {
            return Err(InvalidRequest::NoParticipant.into());
        }

        let challenge = AuthChallenge::generate();
        let expiry =
            Expiry::after(Duration::from_secs(self.config.challenge_ttl));
        self.challenges.insert(
            challenge.nonce,
            PendingChallenge {
                participant_id,
                expiry,
            },
        );
        tracing::debug!(
            participant = %participant_id,
            "login challenge issued"
        );
        Ok(challenge)
    }

    /// Complete a login: verify the signed challenge, evict any
    /// previous session and install a fresh one.
    pub fn handle_challenge_response(
        &mut self,
        signed: Signed<AuthChallenge>,
    ) -> Result<LoginSnapshot> {
        self.expire();
        let participant_id = self
            .challenges
            .get(&signed.obj.nonce)
            .map(|challenge| challenge.participant_id)
            .ok_or(InvalidRequest::NoChallenge)?;
        let key = self
            .group()
            .key_of(&participant_id)
            .ok_or(InvalidRequest::NoParticipant)?;
        if !signed.verify(key.verifying_key()) {
            return Err(InvalidRequest::InvalidChallengeSig.into());
        }
        self.challenges.remove(&signed.obj.nonce);

        // Peers must observe the logout before the login.
        if let Some(previous) =
            self.by_participant.get(&participant_id).copied()
        {
            self.end_session(previous);
        }

        let online = self.online_participants();
        let event = ServerEvent::ParticipantStatus {
            participant_id,
            logged_in: true,
        };
        broadcast(&mut self.sessions, &event, None);

        let session_id = SessionId::new_v4();
        let session = ClientSession::new(
            participant_id,
            session_id,
            Duration::from_secs(self.config.session_ttl),
        );
        let expiry = session.expiry;
        let snapshot = self.build_snapshot(
            participant_id,
            session_id,
            expiry,
            online,
        );
        self.sessions.insert(session_id, session);
        self.by_participant.insert(participant_id, session_id);
        tracing::debug!(
            participant = %participant_id,
            session_id = %session_id,
            "session created"
        );
        Ok(snapshot)
    }

    /// Refresh a session's expiry.
    pub fn handle_extend_session(
        &mut self,
        session_id: SessionId,
    ) -> Result<Expiry> {
        self.expire();
        let ttl = Duration::from_secs(self.config.session_ttl);
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(InvalidRequest::NoSession)?;
        Ok(session.extend(ttl))
    }

    /// The server's view at the moment the session was installed;
    /// everything the client needs to re-hydrate.
    fn build_snapshot(
        &mut self,
        participant_id: ParticipantId,
        session_id: SessionId,
        expiry: Expiry,
        online_participants: BTreeSet<ParticipantId>,
    ) -> LoginSnapshot {
        let new_dkgs = self
            .dkgs
            .iter()
            .filter_map(|(_, dkg)| match &dkg.round {
                DkgRound::Round1 { commitments } => Some(DkgOffer {
                    details: dkg.details.clone(),
                    creator: dkg.creator,
                    commitments: commitments.clone(),
                }),
                DkgRound::Round2 { .. } => None,
            })
            .collect();

        let mut signature_requests = Vec::new();
        let mut signature_rounds = Vec::new();
        for (request_id, coordination) in self.signature_requests.iter()
        {
            signature_requests.push(SignatureRequestOffer {
                details: coordination.details.clone(),
                creator: coordination.creator,
            });
            let rounds =
                coordination.pending_rounds_for(&participant_id);
            if !rounds.is_empty() {
                signature_rounds.push(PendingSignatureRounds {
                    request_id: *request_id,
                    rounds,
                });
            }
        }

        let completed_signatures = self
            .completed
            .iter()
            .filter(|(_, completed)| {
                !completed.acks.contains(&participant_id)
            })
            .map(|(_, completed)| CompletedSignaturesInfo {
                details: completed.details.clone(),
                signatures: completed.signatures.clone(),
                creator: completed.creator,
            })
            .collect();

        let mut secret_shares = Vec::new();
        for (group_key, sharing) in self.key_shares.iter() {
            let Some(ReceiverShareState::Pending { pending, .. }) =
                sharing.receivers.get(&participant_id)
            else {
                continue;
            };
            for (sender, key_share) in pending {
                secret_shares.push(PendingSecretShare {
                    group_key: group_key.clone(),
                    sender: *sender,
                    key_share: key_share.clone(),
                });
            }
        }

        LoginSnapshot {
            session_id,
            expiry,
            online_participants,
            new_dkgs,
            signature_requests,
            signature_rounds,
            completed_signatures,
            secret_shares,
        }
    }
}
