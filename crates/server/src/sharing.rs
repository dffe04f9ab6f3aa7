//! Recovery-share routing, keyed by group key.
use crate::{
    expiring::HasExpiry,
    state::send_to,
    Result, ServerState,
};
use roast_protocol::{
    EncryptedKeyShare, Expiry, GroupKey, InvalidRequest,
    ParticipantId, PendingSecretShare, ServerEvent, SessionId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Retention of a group key's routing table, refreshed whenever a
/// new share is posted.
pub(crate) const KEY_SHARE_RETENTION: Duration =
    Duration::from_secs(7 * 24 * 60 * 60);

/// Share state of one receiver under one group key.
#[derive(Debug)]
pub(crate) enum ReceiverShareState {
    /// Shares still routed to the receiver, keyed by sender.
    Pending {
        pending: BTreeMap<ParticipantId, EncryptedKeyShare>,
        acknowledged: BTreeSet<ParticipantId>,
    },
    /// The receiver has recovered its key; nothing more is routed.
    Done,
}

/// Routing table for the recovery shares of one group key.
#[derive(Debug)]
pub(crate) struct KeySharingState {
    pub receivers: BTreeMap<ParticipantId, ReceiverShareState>,
    pub expiry: Expiry,
}

impl HasExpiry for KeySharingState {
    fn expiry(&self) -> Expiry {
        self.expiry
    }
}

impl KeySharingState {
    /// Stop routing shares to a receiver that recovered its key.
    ///
    /// No request reaches this yet; the acknowledgement operation
    /// ships with the client-side recovery flow.
    #[allow(dead_code)]
    pub fn mark_done(&mut self, receiver: ParticipantId) {
        self.receivers.insert(receiver, ReceiverShareState::Done);
    }
}

impl ServerState {
    /// Store encrypted recovery shares and deliver them to online
    /// receivers; offline receivers get them in their next login
    /// snapshot.
    pub fn handle_share_secret_shares(
        &mut self,
        session_id: SessionId,
        group_key: GroupKey,
        shares: BTreeMap<ParticipantId, EncryptedKeyShare>,
    ) -> Result<()> {
        let caller = self.authenticate(&session_id)?;
        let valid = !shares.is_empty()
            && !shares.contains_key(&caller)
            && shares
                .keys()
                .all(|id| self.config.group.contains(id));
        if !valid {
            return Err(InvalidRequest::InvalidKeyShareMap.into());
        }

        let mut kept = Vec::new();
        {
            let sharing = self.key_shares.get_or_insert_with(
                group_key.clone(),
                || KeySharingState {
                    receivers: BTreeMap::new(),
                    expiry: Expiry::after(KEY_SHARE_RETENTION),
                },
            );
            sharing.expiry = Expiry::after(KEY_SHARE_RETENTION);

            for (receiver, share) in shares {
                let state = sharing
                    .receivers
                    .entry(receiver)
                    .or_insert_with(|| ReceiverShareState::Pending {
                        pending: BTreeMap::new(),
                        acknowledged: BTreeSet::new(),
                    });
                let ReceiverShareState::Pending {
                    pending,
                    acknowledged,
                } = state
                else {
                    continue;
                };
                // A second share from the same sender is dropped.
                if pending.contains_key(&caller)
                    || acknowledged.contains(&caller)
                {
                    continue;
                }
                pending.insert(caller, share.clone());
                kept.push((receiver, share));
            }
        }

        for (receiver, key_share) in kept {
            let event =
                ServerEvent::SecretShare(PendingSecretShare {
                    group_key: group_key.clone(),
                    sender: caller,
                    key_share,
                });
            send_to(
                &mut self.sessions,
                &self.by_participant,
                &receiver,
                event,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_receivers_get_nothing_new() {
        let mut sharing = KeySharingState {
            receivers: BTreeMap::new(),
            expiry: Expiry::after(KEY_SHARE_RETENTION),
        };
        let receiver = ParticipantId::new(*b"id02");
        sharing.receivers.insert(
            receiver,
            ReceiverShareState::Pending {
                pending: BTreeMap::new(),
                acknowledged: BTreeSet::new(),
            },
        );
        sharing.mark_done(receiver);
        assert!(matches!(
            sharing.receivers.get(&receiver),
            Some(ReceiverShareState::Done)
        ));
    }
}
