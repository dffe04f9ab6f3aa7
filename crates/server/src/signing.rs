//! ROAST signature coordination.
//!
//! One coordination runs per signatures request. Each requested
//! signature keeps a one-ahead commitment pipeline: replies carry a
//! share for the caller's open round plus a commitment for the next
//! round, so a fresh round can open the moment a threshold of
//! commitments is queued. Provably misbehaving participants are
//! marked malicious permanently; rejectors may re-accept. The whole
//! request aborts as soon as the remaining pool cannot meet the
//! highest threshold still in play.
use crate::{
    expiring::HasExpiry,
    state::{broadcast, check_ttl, send_to},
    Error, Result, ServerState,
};
use roast_frost::{aggregate_shares, verify_share, DerivedKey};
use roast_protocol::{
    AggregateKeyInfo, ClientResponse, Expiry, GroupKey,
    InvalidRequest, ParticipantId, RequestId, ServerEvent, SessionId,
    SignatureReply, SignatureRequestOffer, SignatureRoundStart,
    SignatureShare, SignaturesRequestDetails, Signed,
    SigningCommitment, SingleSignatureDetails, ThresholdSignature,
};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// One round of one signature: the commitment set it was opened
/// with and the shares collected so far.
#[derive(Debug)]
pub(crate) struct SigningRound {
    pub commitments: BTreeMap<ParticipantId, SigningCommitment>,
    pub shares: Vec<(ParticipantId, SignatureShare)>,
}

/// A signature still being coordinated.
#[derive(Debug)]
pub(crate) struct InProgressSignature {
    pub key: AggregateKeyInfo,
    /// Commitments queued for the next round.
    pub next_commitments: BTreeMap<ParticipantId, SigningCommitment>,
    /// Every round opened so far.
    pub rounds: Vec<SigningRound>,
    /// The round each participant still owes a share for.
    pub round_for: BTreeMap<ParticipantId, usize>,
}

/// State of one requested signature.
#[derive(Debug)]
pub(crate) enum SingleSignatureState {
    InProgress(InProgressSignature),
    Finished { signature: ThresholdSignature },
}

/// Coordination state of one signatures request.
#[derive(Debug)]
pub(crate) struct SignatureCoordination {
    pub details: Signed<SignaturesRequestDetails>,
    pub creator: ParticipantId,
    pub keys: Vec<AggregateKeyInfo>,
    pub sigs: Vec<SingleSignatureState>,
    pub malicious: BTreeSet<ParticipantId>,
    pub rejectors: BTreeSet<ParticipantId>,
}

impl HasExpiry for SignatureCoordination {
    fn expiry(&self) -> Expiry {
        self.details.obj.expiry
    }
}

/// A completed signatures request retained for late readers.
#[derive(Debug)]
pub(crate) struct CompletedSignatures {
    pub details: Signed<SignaturesRequestDetails>,
    pub signatures: Vec<ThresholdSignature>,
    pub creator: ParticipantId,
    pub acks: BTreeSet<ParticipantId>,
    pub expiry: Expiry,
}

impl HasExpiry for CompletedSignatures {
    fn expiry(&self) -> Expiry {
        self.expiry
    }
}

/// Effects of a successful reply submission.
pub(crate) struct ReplyOutcome {
    /// Rounds opened by this submission, per participant.
    pub new_rounds: BTreeMap<ParticipantId, Vec<SignatureRoundStart>>,
    /// The final signatures once every one is finished.
    pub finished: Option<Vec<ThresholdSignature>>,
}

impl SignatureCoordination {
    /// Participants counted against the availability pool.
    /// `malicious` absorbs `rejectors`, so the sets are disjoint.
    pub fn unavailable(&self) -> usize {
        self.malicious.len() + self.rejectors.len()
    }

    /// Highest threshold among signatures still in progress.
    pub fn max_threshold(&self) -> Option<u16> {
        self.sigs
            .iter()
            .filter_map(|sig| match sig {
                SingleSignatureState::InProgress(sig) => {
                    Some(sig.key.threshold)
                }
                SingleSignatureState::Finished { .. } => None,
            })
            .max()
    }

    /// Whether the remaining pool can no longer meet the highest
    /// threshold in play.
    pub fn has_failed(&self, group_size: usize) -> bool {
        match self.max_threshold() {
            Some(threshold) => {
                group_size.saturating_sub(self.unavailable())
                    < threshold as usize
            }
            None => false,
        }
    }

    /// Malicious is permanent and takes precedence over rejection.
    pub fn mark_malicious(&mut self, participant: ParticipantId) {
        self.rejectors.remove(&participant);
        self.malicious.insert(participant);
    }

    /// Record a rejection; ignored for malicious participants.
    pub fn reject(&mut self, participant: ParticipantId) {
        if !self.malicious.contains(&participant) {
            self.rejectors.insert(participant);
        }
    }

    /// Open rounds in which the participant still owes a share.
    pub fn pending_rounds_for(
        &self,
        participant: &ParticipantId,
    ) -> Vec<SignatureRoundStart> {
        let mut rounds = Vec::new();
        for (index, sig) in self.sigs.iter().enumerate() {
            let SingleSignatureState::InProgress(sig) = sig else {
                continue;
            };
            if let Some(&round_index) = sig.round_for.get(participant)
            {
                rounds.push(SignatureRoundStart {
                    sig_index: index as u32,
                    commitments: sig.rounds[round_index]
                        .commitments
                        .clone(),
                });
            }
        }
        rounds
    }

    /// Apply a batch of replies from one participant.
    ///
    /// Protocol violations mark the caller malicious before the
    /// error is returned; the caller of this method still has to run
    /// the failure check.
    pub fn apply_replies(
        &mut self,
        caller: ParticipantId,
        replies: Vec<SignatureReply>,
    ) -> Result<ReplyOutcome> {
        if self.malicious.contains(&caller) {
            return Err(InvalidRequest::MarkedMalicious.into());
        }
        // Re-acceptance: a rejector that replies counts as
        // available again immediately.
        self.rejectors.remove(&caller);

        let mut new_rounds = BTreeMap::new();
        let applied = apply_replies_inner(
            &mut self.sigs,
            &self.details.obj.required,
            caller,
            replies,
            &mut new_rounds,
        );
        if let Err(error) = applied {
            if is_malicious_offence(&error) {
                self.mark_malicious(caller);
            }
            return Err(error);
        }

        let finished = if self
            .sigs
            .iter()
            .all(|sig| matches!(sig, SingleSignatureState::Finished { .. }))
        {
            Some(
                self.sigs
                    .iter()
                    .filter_map(|sig| match sig {
                        SingleSignatureState::Finished {
                            signature,
                        } => Some(signature.clone()),
                        SingleSignatureState::InProgress(_) => None,
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(ReplyOutcome {
            new_rounds,
            finished,
        })
    }
}

/// Offences that mark the sender malicious.
fn is_malicious_offence(error: &Error) -> bool {
    matches!(
        error,
        Error::InvalidRequest(
            InvalidRequest::EmptySigReply
                | InvalidRequest::DuplicateSigReply
                | InvalidRequest::InvalidSigIndex
                | InvalidRequest::NextCommitmentExists
                | InvalidRequest::UnsolicitedShare
                | InvalidRequest::MissingShare
                | InvalidRequest::InvalidShare
        )
    )
}

fn apply_replies_inner(
    sigs: &mut [SingleSignatureState],
    required: &[SingleSignatureDetails],
    caller: ParticipantId,
    replies: Vec<SignatureReply>,
    new_rounds: &mut BTreeMap<
        ParticipantId,
        Vec<SignatureRoundStart>,
    >,
) -> Result<()> {
    if replies.is_empty() {
        return Err(InvalidRequest::EmptySigReply.into());
    }
    let mut seen = BTreeSet::new();
    for reply in &replies {
        if !seen.insert(reply.sig_index) {
            return Err(InvalidRequest::DuplicateSigReply.into());
        }
    }

    for reply in replies {
        let index = reply.sig_index as usize;
        let Some(state) = sigs.get_mut(index) else {
            return Err(InvalidRequest::InvalidSigIndex.into());
        };
        let single = &required[index];

        let mut completed: Option<ThresholdSignature> = None;
        {
            let SingleSignatureState::InProgress(sig) = &mut *state
            else {
                // Replies for finished signatures are ignored.
                continue;
            };
            if sig.next_commitments.contains_key(&caller) {
                return Err(
                    InvalidRequest::NextCommitmentExists.into()
                );
            }

            match sig.round_for.get(&caller).copied() {
                None => {
                    if reply.share.is_some() {
                        return Err(
                            InvalidRequest::UnsolicitedShare.into()
                        );
                    }
                }
                Some(round_index) => {
                    let Some(share) = reply.share else {
                        return Err(
                            InvalidRequest::MissingShare.into()
                        );
                    };
                    let derived = DerivedKey::derive(
                        &sig.key,
                        &single.derivation,
                    )
                    .map_err(|_| InvalidRequest::InvalidShare)?;
                    let round = &mut sig.rounds[round_index];
                    if verify_share(
                        &derived,
                        caller,
                        &round.commitments,
                        &single.sign.message,
                        &share,
                    )
                    .is_err()
                    {
                        return Err(
                            InvalidRequest::InvalidShare.into()
                        );
                    }
                    sig.round_for.remove(&caller);
                    round.shares.push((caller, share));

                    if round.shares.len()
                        == sig.key.threshold as usize
                    {
                        completed = Some(aggregate_shares(
                            &derived,
                            &round.commitments,
                            &round.shares,
                            &single.sign.message,
                        )?);
                    }
                }
            }

            if completed.is_none() {
                // The one-ahead pipeline: queue the commitment and
                // open a round once a threshold of them is in.
                sig.next_commitments
                    .insert(caller, reply.next_commitment);
                if sig.next_commitments.len()
                    == sig.key.threshold as usize
                {
                    let commitments =
                        std::mem::take(&mut sig.next_commitments);
                    let round_index = sig.rounds.len();
                    sig.rounds.push(SigningRound {
                        commitments: commitments.clone(),
                        shares: Vec::new(),
                    });
                    let start = SignatureRoundStart {
                        sig_index: reply.sig_index,
                        commitments,
                    };
                    for id in start.commitments.keys() {
                        sig.round_for.insert(*id, round_index);
                        new_rounds
                            .entry(*id)
                            .or_default()
                            .push(start.clone());
                    }
                }
            }
        }
        if let Some(signature) = completed {
            *state = SingleSignatureState::Finished { signature };
        }
    }
    Ok(())
}

impl ServerState {
    /// Create a new signatures coordination.
    pub fn handle_request_signatures(
        &mut self,
        session_id: SessionId,
        keys: Vec<AggregateKeyInfo>,
        details: Signed<SignaturesRequestDetails>,
        commitments: Vec<SigningCommitment>,
    ) -> Result<()> {
        let caller = self.authenticate(&session_id)?;
        if commitments.len() != details.obj.required.len() {
            return Err(InvalidRequest::WrongCommitmentNum.into());
        }
        let provided: BTreeSet<&GroupKey> =
            keys.iter().map(|key| &key.group_key).collect();
        let needed: BTreeSet<&GroupKey> = details
            .obj
            .required
            .iter()
            .map(|single| &single.group_key)
            .collect();
        if provided != needed {
            return Err(InvalidRequest::WrongSigKeys.into());
        }
        check_ttl(
            details.obj.expiry.ttl(),
            Duration::from_secs(
                self.config.min_signatures_request_ttl,
            ),
            Duration::from_secs(
                self.config.max_signatures_request_ttl,
            ),
        )?;
        let request_id = details.obj.id;
        if self.signature_requests.contains(&request_id)
            || self.completed.contains(&request_id)
        {
            return Err(InvalidRequest::SigRequestExists.into());
        }
        let key = self
            .group()
            .key_of(&caller)
            .ok_or(InvalidRequest::NoParticipant)?;
        if !details.verify(key.verifying_key()) {
            return Err(InvalidRequest::InvalidSigReqSignature.into());
        }

        let mut sigs = Vec::with_capacity(commitments.len());
        for (single, commitment) in
            details.obj.required.iter().zip(commitments)
        {
            let key = keys
                .iter()
                .find(|key| key.group_key == single.group_key)
                .ok_or(InvalidRequest::WrongSigKeys)?
                .clone();
            let mut next_commitments = BTreeMap::new();
            next_commitments.insert(caller, commitment);
            sigs.push(SingleSignatureState::InProgress(
                InProgressSignature {
                    key,
                    next_commitments,
                    rounds: Vec::new(),
                    round_for: BTreeMap::new(),
                },
            ));
        }

        let offer = SignatureRequestOffer {
            details: details.clone(),
            creator: caller,
        };
        self.signature_requests.insert(
            request_id,
            SignatureCoordination {
                details,
                creator: caller,
                keys,
                sigs,
                malicious: BTreeSet::new(),
                rejectors: BTreeSet::new(),
            },
        );
        tracing::debug!(
            request = %request_id,
            creator = %caller,
            "signatures request created"
        );
        broadcast(
            &mut self.sessions,
            &ServerEvent::SignaturesRequest(offer),
            Some(caller),
        );
        Ok(())
    }

    /// Record a rejection and abort the request once too few
    /// signers remain. A no-op for unknown requests, tolerating
    /// races with completion.
    pub fn handle_reject_signatures(
        &mut self,
        session_id: SessionId,
        request_id: RequestId,
    ) -> Result<()> {
        let caller = self.authenticate(&session_id)?;
        let group_size = self.group_size();
        let Some(coordination) =
            self.signature_requests.get_mut(&request_id)
        else {
            return Ok(());
        };
        coordination.reject(caller);
        let failed = coordination.has_failed(group_size);
        if failed {
            self.fail_request(request_id);
        }
        Ok(())
    }

    /// Apply one participant's signature replies.
    pub fn handle_signature_replies(
        &mut self,
        session_id: SessionId,
        request_id: RequestId,
        replies: Vec<SignatureReply>,
    ) -> Result<ClientResponse> {
        let caller = self.authenticate(&session_id)?;
        let group_size = self.group_size();
        let Some(coordination) =
            self.signature_requests.get_mut(&request_id)
        else {
            // The request may just have completed or failed.
            return Ok(ClientResponse::Ack);
        };

        let outcome = match coordination.apply_replies(caller, replies)
        {
            Ok(outcome) => outcome,
            Err(error) => {
                let failed = coordination.has_failed(group_size);
                if failed {
                    self.fail_request(request_id);
                }
                return Err(error);
            }
        };

        if let Some(signatures) = outcome.finished {
            let Some(coordination) =
                self.signature_requests.remove(&request_id)
            else {
                return Ok(ClientResponse::Ack);
            };
            let retention = Duration::from_secs(
                self.config.min_completed_signatures_ttl,
            );
            let expiry = coordination
                .details
                .obj
                .expiry
                .max(Expiry::after(retention));
            self.completed.insert(
                request_id,
                CompletedSignatures {
                    details: coordination.details,
                    signatures: signatures.clone(),
                    creator: coordination.creator,
                    acks: BTreeSet::new(),
                    expiry,
                },
            );
            tracing::debug!(
                request = %request_id,
                "signatures request complete"
            );
            broadcast(
                &mut self.sessions,
                &ServerEvent::SignaturesComplete {
                    request_id,
                    signatures: signatures.clone(),
                },
                Some(caller),
            );
            return Ok(ClientResponse::SignaturesComplete {
                signatures,
            });
        }

        if !outcome.new_rounds.is_empty() {
            let mut caller_rounds = None;
            for (participant, rounds) in outcome.new_rounds {
                if participant == caller {
                    caller_rounds = Some(rounds);
                    continue;
                }
                send_to(
                    &mut self.sessions,
                    &self.by_participant,
                    &participant,
                    ServerEvent::SignatureNewRounds {
                        request_id,
                        rounds,
                    },
                );
            }
            if let Some(rounds) = caller_rounds {
                return Ok(ClientResponse::SignatureNewRounds {
                    rounds,
                });
            }
        }
        Ok(ClientResponse::Ack)
    }

    /// Abort a coordination and tell every session.
    fn fail_request(&mut self, request_id: RequestId) {
        if self.signature_requests.remove(&request_id).is_some() {
            tracing::debug!(
                request = %request_id,
                "signatures request failed"
            );
            broadcast(
                &mut self.sessions,
                &ServerEvent::SignaturesFailure { request_id },
                None,
            );
        }
    }
}
