//! The two-round DKG state machine.
use crate::{
    expiring::HasExpiry,
    state::{broadcast, check_ttl, send_to},
    Result, ServerState,
};
use roast_protocol::{
    DkgCommitment, DkgOffer, EncryptedDkgSecret, Expiry,
    InvalidRequest, NewDkgDetails, ParticipantId, SchnorrSignature,
    ServerEvent, SessionId, Signed,
};
use std::collections::{BTreeMap, BTreeSet};

/// A named DKG in flight.
#[derive(Debug)]
pub(crate) struct DkgState {
    pub details: Signed<NewDkgDetails>,
    pub creator: ParticipantId,
    pub round: DkgRound,
}

/// Round state of a DKG.
///
/// Round 1 collects one public commitment per participant; once all
/// `n` are in, round 2 collects per-recipient encrypted secrets plus
/// a signature binding the commitment set.
#[derive(Debug)]
pub(crate) enum DkgRound {
    Round1 {
        commitments: Vec<(ParticipantId, DkgCommitment)>,
    },
    Round2 {
        expected_hash: [u8; 32],
        provided: BTreeSet<ParticipantId>,
    },
}

impl HasExpiry for DkgState {
    fn expiry(&self) -> Expiry {
        self.details.obj.expiry
    }
}

impl ServerState {
    /// Create a new named DKG with the caller's first commitment.
    pub fn handle_request_new_dkg(
        &mut self,
        session_id: SessionId,
        details: Signed<NewDkgDetails>,
        commitment: DkgCommitment,
    ) -> Result<()> {
        let caller = self.authenticate(&session_id)?;
        let n = self.group_size() as u16;
        let threshold = details.obj.threshold;
        if threshold == 0 || threshold > n {
            return Err(InvalidRequest::InvalidThreshold.into());
        }
        check_ttl(
            details.obj.expiry.ttl(),
            std::time::Duration::from_secs(
                self.config.min_dkg_request_ttl,
            ),
            std::time::Duration::from_secs(
                self.config.max_dkg_request_ttl,
            ),
        )?;
        if self.dkgs.contains(&details.obj.name) {
            return Err(InvalidRequest::DkgRequestExists.into());
        }
        let key = self
            .group()
            .key_of(&caller)
            .ok_or(InvalidRequest::NoParticipant)?;
        if !details.verify(key.verifying_key()) {
            return Err(InvalidRequest::InvalidDkgReqSig.into());
        }

        let name = details.obj.name.clone();
        let offer = DkgOffer {
            details: details.clone(),
            creator: caller,
            commitments: vec![(caller, commitment.clone())],
        };
        self.dkgs.insert(
            name.clone(),
            DkgState {
                details,
                creator: caller,
                round: DkgRound::Round1 {
                    commitments: vec![(caller, commitment)],
                },
            },
        );
        tracing::debug!(name = %name, creator = %caller, "new DKG");
        broadcast(
            &mut self.sessions,
            &ServerEvent::NewDkg(offer),
            Some(caller),
        );
        Ok(())
    }

    /// Reject a named DKG, removing it. A no-op when it is already
    /// gone.
    pub fn handle_reject_dkg(
        &mut self,
        session_id: SessionId,
        name: String,
    ) -> Result<()> {
        let caller = self.authenticate(&session_id)?;
        if self.dkgs.remove(&name).is_some() {
            tracing::debug!(
                name = %name,
                participant = %caller,
                "DKG rejected"
            );
            broadcast(
                &mut self.sessions,
                &ServerEvent::DkgReject {
                    name,
                    participant: caller,
                },
                Some(caller),
            );
        }
        Ok(())
    }

    /// Record a round 1 commitment; the last one moves the DKG to
    /// round 2.
    pub fn handle_dkg_commitment(
        &mut self,
        session_id: SessionId,
        name: String,
        commitment: DkgCommitment,
    ) -> Result<()> {
        let caller = self.authenticate(&session_id)?;
        let n = self.group_size();
        let dkg = self
            .dkgs
            .get_mut(&name)
            .ok_or(InvalidRequest::NoDkg)?;
        let DkgRound::Round1 { commitments } = &mut dkg.round else {
            return Err(InvalidRequest::NotRound1Dkg.into());
        };
        if commitments.iter().any(|(id, _)| *id == caller) {
            return Err(InvalidRequest::DkgCommitmentExists.into());
        }
        commitments.push((caller, commitment.clone()));

        if commitments.len() == n {
            let set: BTreeMap<ParticipantId, DkgCommitment> =
                commitments.iter().cloned().collect();
            let expected_hash = roast_frost::hash_with_commitments(
                &dkg.details.obj,
                &set,
            )?;
            dkg.round = DkgRound::Round2 {
                expected_hash,
                provided: BTreeSet::new(),
            };
            tracing::debug!(name = %name, "DKG entered round 2");
        }

        broadcast(
            &mut self.sessions,
            &ServerEvent::DkgCommitment {
                name,
                participant: caller,
                commitment,
            },
            Some(caller),
        );
        Ok(())
    }

    /// Route a participant's round 2 secrets; the last submission
    /// completes and removes the DKG.
    pub fn handle_dkg_round2(
        &mut self,
        session_id: SessionId,
        name: String,
        commitment_set_signature: SchnorrSignature,
        secrets: BTreeMap<ParticipantId, EncryptedDkgSecret>,
    ) -> Result<()> {
        let caller = self.authenticate(&session_id)?;
        let n = self.group_size();
        let verifying_key = self
            .group()
            .key_of(&caller)
            .ok_or(InvalidRequest::NoParticipant)?
            .verifying_key()
            .to_owned();

        let done = {
            let dkg = self
                .dkgs
                .get_mut(&name)
                .ok_or(InvalidRequest::NoDkg)?;
            let DkgRound::Round2 {
                expected_hash,
                provided,
            } = &dkg.round
            else {
                return Err(InvalidRequest::NotRound2Dkg.into());
            };
            if !commitment_set_signature
                .verify(&verifying_key, expected_hash)
            {
                return Err(
                    InvalidRequest::InvalidDkgCommitmentSetSignature
                        .into(),
                );
            }
            if provided.contains(&caller) {
                return Err(InvalidRequest::DkgRound2Sent.into());
            }
            let covers_others = secrets.len() == n - 1
                && !secrets.contains_key(&caller)
                && secrets
                    .keys()
                    .all(|id| self.config.group.contains(id));
            if !covers_others {
                return Err(InvalidRequest::InvalidSecretMap.into());
            }
            provided.len() + 1 == n
        };

        // Offline recipients miss their secret; the logout demotion
        // rule restarts the round for everyone in that case.
        for (receiver, secret) in &secrets {
            let event = ServerEvent::DkgRound2Share {
                name: name.clone(),
                commitment_set_signature: commitment_set_signature
                    .clone(),
                sender: caller,
                secret: secret.clone(),
            };
            send_to(
                &mut self.sessions,
                &self.by_participant,
                receiver,
                event,
            );
        }

        if done {
            self.dkgs.remove(&name);
            tracing::debug!(name = %name, "DKG complete");
        } else if let Some(dkg) = self.dkgs.unswept_get_mut(&name) {
            if let DkgRound::Round2 { provided, .. } = &mut dkg.round
            {
                provided.insert(caller);
            }
        }
        Ok(())
    }
}
