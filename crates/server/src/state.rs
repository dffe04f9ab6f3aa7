//! The owned aggregate of all coordination state.
use crate::{
    acks::DkgAckCache,
    config::ServerConfig,
    dkg::{DkgRound, DkgState},
    expiring::{ExpirableMap, HasExpiry},
    session::{ClientSession, EVENT_CHANNEL_CAPACITY},
    sharing::KeySharingState,
    signing::{CompletedSignatures, SignatureCoordination},
    Result,
};
use roast_protocol::{
    Expiry, GroupFingerprint, GroupInfo, GroupKey, InvalidRequest,
    ParticipantId, RequestId, ServerEvent, SessionId,
};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// A challenge handed out on login, waiting for its signed answer.
#[derive(Debug)]
pub(crate) struct PendingChallenge {
    pub participant_id: ParticipantId,
    pub expiry: Expiry,
}

impl HasExpiry for PendingChallenge {
    fn expiry(&self) -> Expiry {
        self.expiry
    }
}

/// All server state, owned by the request handler.
///
/// Requests mutate the state strictly one at a time; no request ever
/// observes another request's partial effects.
pub struct ServerState {
    pub(crate) config: ServerConfig,
    pub(crate) fingerprint: GroupFingerprint,
    pub(crate) challenges: ExpirableMap<[u8; 16], PendingChallenge>,
    pub(crate) sessions: ExpirableMap<SessionId, ClientSession>,
    pub(crate) by_participant: HashMap<ParticipantId, SessionId>,
    pub(crate) dkgs: ExpirableMap<String, DkgState>,
    pub(crate) dkg_acks: ExpirableMap<GroupKey, DkgAckCache>,
    pub(crate) signature_requests:
        ExpirableMap<RequestId, SignatureCoordination>,
    pub(crate) completed: ExpirableMap<RequestId, CompletedSignatures>,
    pub(crate) key_shares: ExpirableMap<GroupKey, KeySharingState>,
}

impl ServerState {
    /// Create empty state for a configured group.
    pub fn new(config: ServerConfig) -> Self {
        let fingerprint = config.group.fingerprint();
        Self {
            config,
            fingerprint,
            challenges: ExpirableMap::new(),
            sessions: ExpirableMap::new(),
            by_participant: HashMap::new(),
            dkgs: ExpirableMap::new(),
            dkg_acks: ExpirableMap::new(),
            signature_requests: ExpirableMap::new(),
            completed: ExpirableMap::new(),
            key_shares: ExpirableMap::new(),
        }
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) fn group(&self) -> &GroupInfo {
        &self.config.group
    }

    pub(crate) fn group_size(&self) -> usize {
        self.config.group.len()
    }

    /// Sweep every expirable map, running end-session side effects
    /// for sessions that timed out.
    pub fn expire(&mut self) {
        self.challenges.sweep();
        for (_, session) in self.sessions.sweep() {
            self.finish_session(session);
        }
        self.dkgs.sweep();
        self.dkg_acks.sweep();
        self.signature_requests.sweep();
        self.completed.sweep();
        self.key_shares.sweep();
    }

    /// Resolve a session to its participant, sweeping first.
    pub(crate) fn authenticate(
        &mut self,
        session_id: &SessionId,
    ) -> Result<ParticipantId> {
        self.expire();
        self.sessions
            .get(session_id)
            .map(|session| session.participant_id())
            .ok_or_else(|| InvalidRequest::NoSession.into())
    }

    /// Identifiers of participants with a live session.
    pub(crate) fn online_participants(
        &self,
    ) -> BTreeSet<ParticipantId> {
        self.by_participant.keys().copied().collect()
    }

    /// End a session explicitly (stream loss or re-login eviction).
    pub fn end_session(&mut self, session_id: SessionId) {
        self.expire();
        if let Some(session) = self.sessions.remove(&session_id) {
            self.finish_session(session);
        }
    }

    /// Side effects after a session left the maps: demote DKGs,
    /// close the sink and announce the logout.
    pub(crate) fn finish_session(&mut self, mut session: ClientSession) {
        let participant_id = session.participant_id();
        tracing::debug!(
            participant = %participant_id,
            session_id = %session.session_id(),
            "session ended"
        );
        if self.by_participant.get(&participant_id)
            == Some(&session.session_id())
        {
            self.by_participant.remove(&participant_id);
        }

        // Correctness of the DKG requires every participant online
        // through both rounds; losing one invalidates the set.
        for (_, dkg) in self.dkgs.iter_mut() {
            match &mut dkg.round {
                DkgRound::Round2 { .. } => {
                    dkg.round = DkgRound::Round1 {
                        commitments: Vec::new(),
                    };
                }
                DkgRound::Round1 { commitments } => {
                    commitments
                        .retain(|(id, _)| *id != participant_id);
                }
            }
        }

        session.shutdown();

        let event = ServerEvent::ParticipantStatus {
            participant_id,
            logged_in: false,
        };
        broadcast(&mut self.sessions, &event, None);
    }

    /// Attach a subscriber to a session's event stream, returning a
    /// bounded receiver of its events.
    pub fn attach_event_sink(
        &mut self,
        session_id: SessionId,
    ) -> Result<mpsc::Receiver<ServerEvent>> {
        self.expire();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(InvalidRequest::NoSession)?;
        session.attach(tx);
        Ok(rx)
    }

    /// Deliver a keepalive; false once the session is gone.
    pub(crate) fn send_keepalive(
        &mut self,
        session_id: &SessionId,
    ) -> bool {
        self.expire();
        match self.sessions.get_mut(session_id) {
            Some(session) => {
                session.send_event(ServerEvent::Keepalive);
                true
            }
            None => false,
        }
    }

    /// Remember the keepalive task; false once the session is gone.
    pub(crate) fn set_keepalive(
        &mut self,
        session_id: &SessionId,
        handle: AbortHandle,
    ) -> bool {
        match self.sessions.unswept_get_mut(session_id) {
            Some(session) => {
                session.set_keepalive(handle);
                true
            }
            None => false,
        }
    }
}

/// Deliver an event to every live session, optionally excluding one
/// participant. The caller has swept the session map this request.
pub(crate) fn broadcast(
    sessions: &mut ExpirableMap<SessionId, ClientSession>,
    event: &ServerEvent,
    exclude: Option<ParticipantId>,
) {
    for (_, session) in sessions.unswept_iter_mut() {
        if exclude == Some(session.participant_id()) {
            continue;
        }
        session.send_event(event.clone());
    }
}

/// Deliver an event to one participant's live session, if any.
pub(crate) fn send_to(
    sessions: &mut ExpirableMap<SessionId, ClientSession>,
    by_participant: &HashMap<ParticipantId, SessionId>,
    participant_id: &ParticipantId,
    event: ServerEvent,
) -> bool {
    let Some(session_id) = by_participant.get(participant_id) else {
        return false;
    };
    match sessions.unswept_get_mut(session_id) {
        Some(session) => {
            session.send_event(event);
            true
        }
        None => false,
    }
}

/// Check a requested TTL against configured bounds.
pub(crate) fn check_ttl(
    ttl: Duration,
    min: Duration,
    max: Duration,
) -> std::result::Result<(), InvalidRequest> {
    if ttl < min {
        Err(InvalidRequest::ExpiryTooSoon)
    } else if ttl > max {
        Err(InvalidRequest::ExpiryTooLate)
    } else {
        Ok(())
    }
}
