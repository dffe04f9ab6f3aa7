//! Cache of signed DKG acknowledgements, keyed by group key.
use crate::{
    expiring::HasExpiry,
    state::broadcast,
    Result, ServerState,
};
use roast_protocol::{
    DkgAck, DkgAckQuery, Expiry, InvalidRequest, ParticipantId,
    ServerEvent, SessionId, Signed, SignedDkgAck,
};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Acknowledgements collected for one group key.
#[derive(Debug)]
pub(crate) struct DkgAckCache {
    pub acks: BTreeMap<ParticipantId, Signed<DkgAck>>,
    pub expiry: Expiry,
}

impl HasExpiry for DkgAckCache {
    fn expiry(&self) -> Expiry {
        self.expiry
    }
}

impl ServerState {
    /// Store signed acknowledgements and fan the new ones out.
    ///
    /// A stored rejection may be upgraded to an acceptance, never
    /// the other way around.
    pub fn handle_send_dkg_acks(
        &mut self,
        session_id: SessionId,
        acks: Vec<SignedDkgAck>,
    ) -> Result<()> {
        let caller = self.authenticate(&session_id)?;

        // One bad signature fails the whole call, before any write.
        for ack in &acks {
            let key = self
                .group()
                .key_of(&ack.signer)
                .ok_or(InvalidRequest::NoParticipant)?;
            if !ack.ack.verify(key.verifying_key()) {
                return Err(
                    InvalidRequest::InvalidDkgAckSignature.into()
                );
            }
        }

        let ttl = Duration::from_secs(self.config.ack_cache_ttl);
        let mut fresh: Vec<SignedDkgAck> = Vec::new();
        for ack in acks {
            let cache = self.dkg_acks.get_or_insert_with(
                ack.ack.obj.group_key.clone(),
                || DkgAckCache {
                    acks: BTreeMap::new(),
                    expiry: Expiry::after(ttl),
                },
            );
            match cache.acks.get(&ack.signer) {
                Some(existing)
                    if existing.obj.accepted
                        || !ack.ack.obj.accepted => {}
                _ => {
                    cache.acks.insert(ack.signer, ack.ack.clone());
                    fresh.push(ack);
                }
            }
        }
        if fresh.is_empty() {
            return Ok(());
        }

        for (_, session) in self.sessions.unswept_iter_mut() {
            let receiver = session.participant_id();
            if receiver == caller {
                continue;
            }
            let subset: Vec<SignedDkgAck> = fresh
                .iter()
                .filter(|ack| ack.signer != receiver)
                .cloned()
                .collect();
            if !subset.is_empty() {
                session
                    .send_event(ServerEvent::DkgAcks { acks: subset });
            }
        }
        Ok(())
    }

    /// Return cached acknowledgements and ask peers for the rest.
    pub fn handle_request_dkg_acks(
        &mut self,
        session_id: SessionId,
        requests: Vec<DkgAckQuery>,
    ) -> Result<Vec<SignedDkgAck>> {
        let caller = self.authenticate(&session_id)?;
        for request in &requests {
            for id in &request.ids {
                if !self.group().contains(id) {
                    return Err(InvalidRequest::NoParticipant.into());
                }
                if *id == caller {
                    return Err(
                        InvalidRequest::CannotRequestSelfAck.into()
                    );
                }
            }
        }

        let mut have = Vec::new();
        let mut need = Vec::new();
        for request in requests {
            let cached = self.dkg_acks.get(&request.group_key);
            let mut missing = BTreeSet::new();
            for id in request.ids {
                match cached.and_then(|cache| cache.acks.get(&id)) {
                    Some(ack) => have.push(SignedDkgAck {
                        signer: id,
                        ack: ack.clone(),
                    }),
                    None => {
                        missing.insert(id);
                    }
                }
            }
            if !missing.is_empty() {
                need.push(DkgAckQuery {
                    ids: missing,
                    group_key: request.group_key,
                });
            }
        }

        if !need.is_empty() {
            broadcast(
                &mut self.sessions,
                &ServerEvent::DkgAckRequest { requests: need },
                Some(caller),
            );
        }
        Ok(have)
    }
}
