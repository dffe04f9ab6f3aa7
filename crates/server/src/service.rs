//! Sequential request processing over the shared state.
use crate::{Result, ServerState};
use roast_protocol::{ClientRequest, ClientResponse, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Shared handle to the server state.
///
/// Every request handler takes the write guard for its whole
/// critical section, so requests mutate the state strictly one at a
/// time.
pub type State = Arc<RwLock<ServerState>>;

/// Dispatches client requests against the server state.
pub struct CoordinatorService {
    state: State,
}

impl CoordinatorService {
    /// Create a service over shared state.
    pub fn new(state: State) -> Self {
        Self { state }
    }

    /// The shared state handle.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Process one request, returning its response.
    pub async fn handle(
        &self,
        request: ClientRequest,
    ) -> Result<ClientResponse> {
        match request {
            ClientRequest::Login {
                group,
                participant_id,
                protocol_version,
            } => {
                let mut state = self.state.write().await;
                let challenge = state.handle_login(
                    group,
                    participant_id,
                    protocol_version,
                )?;
                Ok(ClientResponse::Challenge { challenge })
            }
            ClientRequest::RespondChallenge { challenge } => {
                let snapshot = {
                    let mut state = self.state.write().await;
                    state.handle_challenge_response(challenge)?
                };
                self.spawn_keepalive(snapshot.session_id).await;
                Ok(ClientResponse::SessionCreated(snapshot))
            }
            ClientRequest::ExtendSession { session_id } => {
                let mut state = self.state.write().await;
                let expiry =
                    state.handle_extend_session(session_id)?;
                Ok(ClientResponse::SessionExtended { expiry })
            }
            ClientRequest::RequestNewDkg {
                session_id,
                details,
                commitment,
            } => {
                let mut state = self.state.write().await;
                state.handle_request_new_dkg(
                    session_id, details, commitment,
                )?;
                Ok(ClientResponse::Ack)
            }
            ClientRequest::RejectDkg { session_id, name } => {
                let mut state = self.state.write().await;
                state.handle_reject_dkg(session_id, name)?;
                Ok(ClientResponse::Ack)
            }
            ClientRequest::SubmitDkgCommitment {
                session_id,
                name,
                commitment,
            } => {
                let mut state = self.state.write().await;
                state.handle_dkg_commitment(
                    session_id, name, commitment,
                )?;
                Ok(ClientResponse::Ack)
            }
            ClientRequest::SubmitDkgRound2 {
                session_id,
                name,
                commitment_set_signature,
                secrets,
            } => {
                let mut state = self.state.write().await;
                state.handle_dkg_round2(
                    session_id,
                    name,
                    commitment_set_signature,
                    secrets,
                )?;
                Ok(ClientResponse::Ack)
            }
            ClientRequest::SendDkgAcks { session_id, acks } => {
                let mut state = self.state.write().await;
                state.handle_send_dkg_acks(session_id, acks)?;
                Ok(ClientResponse::Ack)
            }
            ClientRequest::RequestDkgAcks {
                session_id,
                requests,
            } => {
                let mut state = self.state.write().await;
                let acks = state
                    .handle_request_dkg_acks(session_id, requests)?;
                Ok(ClientResponse::DkgAcks { acks })
            }
            ClientRequest::RequestSignatures {
                session_id,
                keys,
                details,
                commitments,
            } => {
                let mut state = self.state.write().await;
                state.handle_request_signatures(
                    session_id,
                    keys,
                    details,
                    commitments,
                )?;
                Ok(ClientResponse::Ack)
            }
            ClientRequest::RejectSignatures {
                session_id,
                request_id,
            } => {
                let mut state = self.state.write().await;
                state.handle_reject_signatures(
                    session_id, request_id,
                )?;
                Ok(ClientResponse::Ack)
            }
            ClientRequest::SubmitSignatureReplies {
                session_id,
                request_id,
                replies,
            } => {
                let mut state = self.state.write().await;
                state.handle_signature_replies(
                    session_id, request_id, replies,
                )
            }
            ClientRequest::ShareSecretShares {
                session_id,
                group_key,
                shares,
            } => {
                let mut state = self.state.write().await;
                state.handle_share_secret_shares(
                    session_id, group_key, shares,
                )?;
                Ok(ClientResponse::Ack)
            }
        }
    }

    /// Start the periodic keepalive task for a fresh session, when
    /// configured.
    async fn spawn_keepalive(&self, session_id: SessionId) {
        let freq = {
            let state = self.state.read().await;
            state.config().keep_alive
        };
        let Some(secs) = freq else { return };

        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(secs));
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut state = state.write().await;
                if !state.send_keepalive(&session_id) {
                    break;
                }
            }
        });

        let mut state = self.state.write().await;
        if !state.set_keepalive(&session_id, task.abort_handle()) {
            task.abort();
        }
    }
}
