//! Service dispatch, keepalive delivery and session expiry.
use anyhow::Result;
use k256::schnorr::SigningKey;
use rand::rngs::OsRng;
use roast_protocol::{
    ClientRequest, ClientResponse, GroupInfo, InvalidRequest,
    LoginSnapshot, ParticipantId, ParticipantKey, ServerEvent,
    SessionId, Signed, PROTOCOL_VERSION,
};
use roast_server::{
    CoordinatorService, Error, ServerConfig, ServerState,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

fn pid(i: usize) -> ParticipantId {
    ParticipantId::new([b'i', b'd', b'0', b'0' + i as u8])
}

fn test_config(
    n: usize,
) -> (ServerConfig, BTreeMap<ParticipantId, SigningKey>) {
    let mut keys = BTreeMap::new();
    let mut participants = BTreeMap::new();
    for i in 1..=n {
        let key = SigningKey::random(&mut OsRng);
        participants
            .insert(pid(i), ParticipantKey::new(*key.verifying_key()));
        keys.insert(pid(i), key);
    }
    let config = ServerConfig::with_group(GroupInfo {
        id: "service-test".to_owned(),
        participants,
    });
    (config, keys)
}

async fn login(
    service: &CoordinatorService,
    keys: &BTreeMap<ParticipantId, SigningKey>,
    participant: ParticipantId,
) -> Result<LoginSnapshot> {
    let fingerprint = {
        let state = service.state().read().await;
        state.config().group.fingerprint()
    };
    let response = service
        .handle(ClientRequest::Login {
            group: fingerprint,
            participant_id: participant,
            protocol_version: PROTOCOL_VERSION,
        })
        .await?;
    let ClientResponse::Challenge { challenge } = response else {
        panic!("expected a challenge, got {response:?}");
    };
    let signed = Signed::sign(challenge, &keys[&participant])?;
    let response = service
        .handle(ClientRequest::RespondChallenge { challenge: signed })
        .await?;
    let ClientResponse::SessionCreated(snapshot) = response else {
        panic!("expected a session, got {response:?}");
    };
    Ok(snapshot)
}

#[tokio::test(start_paused = true)]
async fn keepalive_events_flow_until_session_ends() -> Result<()> {
    let (mut config, keys) = test_config(2);
    config.keep_alive = Some(5);
    let state = Arc::new(RwLock::new(ServerState::new(config)));
    let service = CoordinatorService::new(Arc::clone(&state));

    let snapshot = login(&service, &keys, pid(1)).await?;
    let mut events = {
        let mut writer = state.write().await;
        writer.attach_event_sink(snapshot.session_id)?
    };

    tokio::time::sleep(Duration::from_secs(16)).await;

    let mut keepalives = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ServerEvent::Keepalive) {
            keepalives += 1;
        }
    }
    assert!(
        keepalives >= 2,
        "expected keepalives, got {keepalives}"
    );

    // Ending the session stops the stream.
    {
        let mut writer = state.write().await;
        writer.end_session(snapshot.session_id);
    }
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(events.recv().await.is_none());
    Ok(())
}

#[tokio::test]
async fn unknown_session_is_refused() -> Result<()> {
    let (config, _keys) = test_config(2);
    let state = Arc::new(RwLock::new(ServerState::new(config)));
    let service = CoordinatorService::new(state);

    let error = service
        .handle(ClientRequest::ExtendSession {
            session_id: SessionId::new_v4(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidRequest(InvalidRequest::NoSession)
    ));
    Ok(())
}

#[tokio::test]
async fn expired_session_runs_logout_side_effects() -> Result<()> {
    let (mut config, keys) = test_config(2);
    config.session_ttl = 0; // sessions expire immediately
    let state = Arc::new(RwLock::new(ServerState::new(config)));
    let service = CoordinatorService::new(Arc::clone(&state));

    let snapshot = login(&service, &keys, pid(1)).await?;
    let error = service
        .handle(ClientRequest::ExtendSession {
            session_id: snapshot.session_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidRequest(InvalidRequest::NoSession)
    ));
    Ok(())
}
