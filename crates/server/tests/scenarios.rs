//! End-to-end protocol scenarios driven against the server state.
use anyhow::Result;
use frost_secp256k1_tr::{
    keys::{
        dkg as frost_dkg, generate_with_dealer, IdentifierList,
        KeyPackage,
    },
    round1, round2, Identifier, SigningPackage, VerifyingKey,
};
use k256::schnorr::SigningKey;
use rand::rngs::OsRng;
use roast_protocol::{
    AggregateKeyInfo, ClientResponse, DkgAck, DkgAckQuery,
    DkgCommitment, EncryptedDkgSecret, EncryptedKeyShare, Expiry,
    GroupFingerprint, GroupInfo, GroupKey, InvalidRequest,
    LoginSnapshot, NewDkgDetails, ParticipantId, ParticipantKey,
    SchnorrSignature, ServerEvent, SessionId, SignDetails,
    SignatureReply, SignaturesRequestDetails, Signed, SignedDkgAck,
    SigningCommitment, SingleSignatureDetails, PROTOCOL_VERSION,
};
use roast_server::{Error, ServerConfig, ServerState};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::mpsc;

const HOUR: Duration = Duration::from_secs(3600);

fn pid(i: usize) -> ParticipantId {
    let tens = b'0' + (i / 10) as u8;
    let ones = b'0' + (i % 10) as u8;
    ParticipantId::new([b'i', b'd', tens, ones])
}

fn invalid_kind(error: Error) -> InvalidRequest {
    match error {
        Error::InvalidRequest(kind) => kind,
        other => panic!("expected an invalid request, got {other}"),
    }
}

struct Harness {
    state: ServerState,
    keys: BTreeMap<ParticipantId, SigningKey>,
    sessions: BTreeMap<ParticipantId, SessionId>,
    streams: BTreeMap<ParticipantId, mpsc::Receiver<ServerEvent>>,
}

impl Harness {
    fn new(n: usize) -> Self {
        let mut keys = BTreeMap::new();
        let mut participants = BTreeMap::new();
        for i in 1..=n {
            let key = SigningKey::random(&mut OsRng);
            participants.insert(
                pid(i),
                ParticipantKey::new(*key.verifying_key()),
            );
            keys.insert(pid(i), key);
        }
        let group = GroupInfo {
            id: "test-group".to_owned(),
            participants,
        };
        Self {
            state: ServerState::new(ServerConfig::with_group(group)),
            keys,
            sessions: BTreeMap::new(),
            streams: BTreeMap::new(),
        }
    }

    fn fingerprint(&self) -> GroupFingerprint {
        self.state.config().group.fingerprint()
    }

    fn login(
        &mut self,
        participant: ParticipantId,
    ) -> Result<LoginSnapshot> {
        let challenge = self.state.handle_login(
            self.fingerprint(),
            participant,
            PROTOCOL_VERSION,
        )?;
        let signed =
            Signed::sign(challenge, &self.keys[&participant])?;
        let snapshot = self.state.handle_challenge_response(signed)?;
        let stream =
            self.state.attach_event_sink(snapshot.session_id)?;
        self.sessions.insert(participant, snapshot.session_id);
        self.streams.insert(participant, stream);
        Ok(snapshot)
    }

    fn login_all(&mut self, n: usize) -> Result<()> {
        for i in 1..=n {
            self.login(pid(i))?;
        }
        self.drain_all();
        Ok(())
    }

    fn session(&self, participant: ParticipantId) -> SessionId {
        self.sessions[&participant]
    }

    fn drain(
        &mut self,
        participant: ParticipantId,
    ) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        if let Some(stream) = self.streams.get_mut(&participant) {
            while let Ok(event) = stream.try_recv() {
                events.push(event);
            }
        }
        events
    }

    fn drain_all(&mut self) {
        let ids: Vec<ParticipantId> =
            self.streams.keys().copied().collect();
        for participant in ids {
            self.drain(participant);
        }
    }
}

fn dkg_details(name: &str, threshold: u16) -> NewDkgDetails {
    NewDkgDetails {
        name: name.to_owned(),
        description: "test key".to_owned(),
        threshold,
        expiry: Expiry::after(HOUR),
    }
}

fn dkg_package(
    position: usize,
    n: u16,
    t: u16,
) -> Result<DkgCommitment> {
    let id = Identifier::try_from(position as u16)?;
    let (_, package) = frost_dkg::part1(id, n, t, &mut OsRng)?;
    Ok(package)
}

/// Drive a DKG through both rounds with every participant online.
///
/// `details` must be the exact details the creator signed; the
/// commitment-set hash binds them.
fn run_dkg_rounds(
    harness: &mut Harness,
    details: &NewDkgDetails,
    n: usize,
    packages: &BTreeMap<ParticipantId, DkgCommitment>,
    creator_started: bool,
) -> Result<()> {
    let name = details.name.clone();
    for i in 1..=n {
        let participant = pid(i);
        if creator_started && i == 1 {
            continue;
        }
        harness.state.handle_dkg_commitment(
            harness.session(participant),
            name.clone(),
            packages[&participant].clone(),
        )?;
    }

    let expected_hash =
        roast_frost::hash_with_commitments(details, packages)?;

    for i in 1..=n {
        let participant = pid(i);
        let signature = SchnorrSignature::sign(
            &harness.keys[&participant],
            &expected_hash,
        );
        let secrets: BTreeMap<ParticipantId, EncryptedDkgSecret> =
            (1..=n)
                .filter(|&j| j != i)
                .map(|j| {
                    (
                        pid(j),
                        EncryptedDkgSecret(vec![i as u8, j as u8]),
                    )
                })
                .collect();
        harness.state.handle_dkg_round2(
            harness.session(participant),
            name.clone(),
            signature,
            secrets,
        )?;
    }
    Ok(())
}

#[test]
fn login_rehydrates_and_notifies() -> Result<()> {
    let mut harness = Harness::new(3);

    let kind = invalid_kind(
        harness
            .state
            .handle_login(harness.fingerprint(), pid(1), 2)
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::InvalidProtoVersion, kind);

    let kind = invalid_kind(
        harness
            .state
            .handle_login(
                GroupFingerprint([0u8; 32]),
                pid(1),
                PROTOCOL_VERSION,
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::GroupMismatch, kind);

    let kind = invalid_kind(
        harness
            .state
            .handle_login(
                harness.fingerprint(),
                pid(99),
                PROTOCOL_VERSION,
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::NoParticipant, kind);

    harness.login(pid(1))?;
    let snapshot = harness.login(pid(2))?;
    assert_eq!(
        BTreeSet::from([pid(1)]),
        snapshot.online_participants
    );

    // The peer observed exactly one login event.
    let events = harness.drain(pid(1));
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::ParticipantStatus {
            participant_id,
            logged_in: true,
        }] if *participant_id == pid(2)
    ));

    // Re-login evicts the old session; the logout is observed
    // before the login.
    let old_session = harness.session(pid(2));
    harness.login(pid(2))?;
    let events = harness.drain(pid(1));
    assert!(matches!(
        events.as_slice(),
        [
            ServerEvent::ParticipantStatus {
                logged_in: false,
                ..
            },
            ServerEvent::ParticipantStatus {
                logged_in: true,
                ..
            },
        ]
    ));
    let kind = invalid_kind(
        harness
            .state
            .handle_extend_session(old_session)
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::NoSession, kind);

    harness
        .state
        .handle_extend_session(harness.session(pid(2)))?;
    Ok(())
}

#[test]
fn happy_dkg_completes_and_acks_circulate() -> Result<()> {
    let n = 10;
    let mut harness = Harness::new(n);
    harness.login_all(n)?;

    let mut packages = BTreeMap::new();
    for i in 1..=n {
        packages.insert(pid(i), dkg_package(i, n as u16, 2)?);
    }

    let details = dkg_details("k", 2);
    let signed =
        Signed::sign(details.clone(), &harness.keys[&pid(1)])?;
    harness.state.handle_request_new_dkg(
        harness.session(pid(1)),
        signed,
        packages[&pid(1)].clone(),
    )?;
    let events = harness.drain(pid(5));
    assert!(matches!(events.as_slice(), [ServerEvent::NewDkg(_)]));
    harness.drain_all();

    run_dkg_rounds(&mut harness, &details, n, &packages, true)?;

    // Every participant received the nine secrets addressed to it.
    for i in 1..=n {
        let shares = harness
            .drain(pid(i))
            .into_iter()
            .filter(|event| {
                matches!(event, ServerEvent::DkgRound2Share { .. })
            })
            .count();
        assert_eq!(n - 1, shares);
    }

    // The server never retains key material: the DKG is gone.
    let kind = invalid_kind(
        harness
            .state
            .handle_dkg_commitment(
                harness.session(pid(1)),
                "k".to_owned(),
                packages[&pid(1)].clone(),
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::NoDkg, kind);

    // Everyone acknowledges the generated key.
    let group_key = GroupKey(vec![2u8; 33]);
    for i in 1..=n {
        let participant = pid(i);
        let ack = Signed::sign(
            DkgAck {
                group_key: group_key.clone(),
                accepted: true,
            },
            &harness.keys[&participant],
        )?;
        harness.state.handle_send_dkg_acks(
            harness.session(participant),
            vec![SignedDkgAck {
                signer: participant,
                ack,
            }],
        )?;
    }

    let have = harness.state.handle_request_dkg_acks(
        harness.session(pid(1)),
        vec![DkgAckQuery {
            ids: (2..=n).map(pid).collect(),
            group_key,
        }],
    )?;
    assert_eq!(n - 1, have.len());
    assert!(have.iter().all(|ack| ack.ack.obj.accepted));
    Ok(())
}

#[test]
fn logout_demotes_round_two() -> Result<()> {
    let n = 10;
    let mut harness = Harness::new(n);
    harness.login_all(n)?;

    let mut packages = BTreeMap::new();
    for i in 1..=n {
        packages.insert(pid(i), dkg_package(i, n as u16, 2)?);
    }

    let details = dkg_details("k", 2);
    let signed =
        Signed::sign(details.clone(), &harness.keys[&pid(1)])?;
    harness.state.handle_request_new_dkg(
        harness.session(pid(1)),
        signed,
        packages[&pid(1)].clone(),
    )?;
    for i in 2..=n {
        harness.state.handle_dkg_commitment(
            harness.session(pid(i)),
            "k".to_owned(),
            packages[&pid(i)].clone(),
        )?;
    }
    harness.drain_all();

    // The creator drops out mid round 2: the commitment set is
    // invalidated and the DKG restarts from an empty round 1.
    harness.state.end_session(harness.session(pid(1)));
    let events = harness.drain(pid(2));
    assert!(events.iter().any(|event| matches!(
        event,
        ServerEvent::ParticipantStatus {
            logged_in: false,
            ..
        }
    )));

    let snapshot = harness.login(pid(1))?;
    assert_eq!(1, snapshot.new_dkgs.len());
    assert_eq!("k", snapshot.new_dkgs[0].details.obj.name);
    assert!(snapshot.new_dkgs[0].commitments.is_empty());
    harness.drain_all();

    // Everyone re-commits and the DKG completes.
    run_dkg_rounds(&mut harness, &details, n, &packages, false)?;
    let kind = invalid_kind(
        harness
            .state
            .handle_dkg_commitment(
                harness.session(pid(1)),
                "k".to_owned(),
                packages[&pid(1)].clone(),
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::NoDkg, kind);
    Ok(())
}

#[test]
fn ack_cache_upgrades_false_to_true_only() -> Result<()> {
    let mut harness = Harness::new(3);
    harness.login_all(3)?;
    let group_key = GroupKey(vec![3u8; 33]);

    let nack = Signed::sign(
        DkgAck {
            group_key: group_key.clone(),
            accepted: false,
        },
        &harness.keys[&pid(2)],
    )?;
    let ack = Signed::sign(
        DkgAck {
            group_key: group_key.clone(),
            accepted: true,
        },
        &harness.keys[&pid(2)],
    )?;

    harness.state.handle_send_dkg_acks(
        harness.session(pid(1)),
        vec![SignedDkgAck {
            signer: pid(2),
            ack: nack.clone(),
        }],
    )?;
    assert_eq!(1, harness.drain(pid(3)).len());

    // false -> true upgrades and fans out again.
    harness.state.handle_send_dkg_acks(
        harness.session(pid(1)),
        vec![SignedDkgAck {
            signer: pid(2),
            ack: ack.clone(),
        }],
    )?;
    assert_eq!(1, harness.drain(pid(3)).len());

    // true -> false is ignored: no new fan-out, cache unchanged.
    harness.state.handle_send_dkg_acks(
        harness.session(pid(1)),
        vec![SignedDkgAck {
            signer: pid(2),
            ack: nack,
        }],
    )?;
    assert!(harness.drain(pid(3)).is_empty());

    let have = harness.state.handle_request_dkg_acks(
        harness.session(pid(3)),
        vec![DkgAckQuery {
            ids: BTreeSet::from([pid(2)]),
            group_key: group_key.clone(),
        }],
    )?;
    assert_eq!(1, have.len());
    assert!(have[0].ack.obj.accepted);

    // The signer may not ask for its own acknowledgement.
    let kind = invalid_kind(
        harness
            .state
            .handle_request_dkg_acks(
                harness.session(pid(2)),
                vec![DkgAckQuery {
                    ids: BTreeSet::from([pid(2)]),
                    group_key,
                }],
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::CannotRequestSelfAck, kind);
    Ok(())
}

struct SigningFixture {
    info: AggregateKeyInfo,
    key_packages: BTreeMap<ParticipantId, KeyPackage>,
}

fn signing_fixture(n: u16, t: u16) -> Result<SigningFixture> {
    let (secret_shares, pubkeys) = generate_with_dealer(
        n,
        t,
        IdentifierList::Default,
        &mut OsRng,
    )?;

    let ids: Vec<ParticipantId> =
        (1..=n as usize).map(pid).collect();

    let mut verifying_shares = BTreeMap::new();
    for (participant, share) in
        ids.iter().zip(pubkeys.verifying_shares().values())
    {
        verifying_shares.insert(*participant, share.clone());
    }

    let mut key_packages = BTreeMap::new();
    for (participant, secret) in
        ids.iter().zip(secret_shares.into_values())
    {
        key_packages
            .insert(*participant, KeyPackage::try_from(secret)?);
    }

    Ok(SigningFixture {
        info: AggregateKeyInfo {
            group_key: GroupKey(
                pubkeys.verifying_key().serialize()?,
            ),
            threshold: t,
            verifying_shares,
        },
        key_packages,
    })
}

fn signature_request(
    fixture: &SigningFixture,
    message: &[u8],
) -> Result<SignaturesRequestDetails> {
    SignaturesRequestDetails::new(
        vec![SingleSignatureDetails {
            sign: SignDetails {
                message: message.to_vec(),
                sighash_type: 0,
            },
            group_key: fixture.info.group_key.clone(),
            derivation: Vec::new(),
        }],
        Expiry::after(HOUR),
    )
    .map_err(Into::into)
}

fn frost_id(i: usize) -> Result<Identifier> {
    Ok(Identifier::try_from(i as u16)?)
}

#[test]
fn roast_completes_against_rejectors() -> Result<()> {
    let n = 10;
    let mut harness = Harness::new(n);
    harness.login_all(n)?;
    let fixture = signing_fixture(n as u16, 2)?;
    let message = [9u8; 32];

    let (nonce1, commitment1) = round1::commit(
        fixture.key_packages[&pid(1)].signing_share(),
        &mut OsRng,
    );
    let details = signature_request(&fixture, &message)?;
    let request_id = details.id;
    let signed =
        Signed::sign(details.clone(), &harness.keys[&pid(1)])?;
    harness.state.handle_request_signatures(
        harness.session(pid(1)),
        vec![fixture.info.clone()],
        signed,
        vec![commitment1],
    )?;
    let events = harness.drain(pid(6));
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::SignaturesRequest(_)]
    ));
    harness.drain_all();

    // Four rejectors leave six available signers; 6 >= 2 so the
    // request keeps going.
    for i in 2..=5 {
        harness.state.handle_reject_signatures(
            harness.session(pid(i)),
            request_id,
        )?;
    }

    // The sixth participant accepts: its queued commitment fills
    // the threshold and opens the first round.
    let (nonce6, commitment6) = round1::commit(
        fixture.key_packages[&pid(6)].signing_share(),
        &mut OsRng,
    );
    let response = harness.state.handle_signature_replies(
        harness.session(pid(6)),
        request_id,
        vec![SignatureReply {
            sig_index: 0,
            next_commitment: commitment6,
            share: None,
        }],
    )?;
    let ClientResponse::SignatureNewRounds { rounds } = response
    else {
        panic!("expected new rounds, got {response:?}");
    };
    assert_eq!(1, rounds.len());
    let round_commitments = rounds[0].commitments.clone();
    assert_eq!(
        BTreeSet::from([pid(1), pid(6)]),
        round_commitments.keys().copied().collect()
    );

    // The creator learns about the round on its event stream.
    let events = harness.drain(pid(1));
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::SignatureNewRounds { .. }]
    ));

    // Both round members sign over the same commitment set.
    let frost_commitments: BTreeMap<Identifier, SigningCommitment> =
        BTreeMap::from([
            (frost_id(1)?, round_commitments[&pid(1)].clone()),
            (frost_id(6)?, round_commitments[&pid(6)].clone()),
        ]);
    let signing_package =
        SigningPackage::new(frost_commitments, &message);

    let share1 = round2::sign(
        &signing_package,
        &nonce1,
        &fixture.key_packages[&pid(1)],
    )?;
    let (_, refill1) = round1::commit(
        fixture.key_packages[&pid(1)].signing_share(),
        &mut OsRng,
    );
    let response = harness.state.handle_signature_replies(
        harness.session(pid(1)),
        request_id,
        vec![SignatureReply {
            sig_index: 0,
            next_commitment: refill1,
            share: Some(share1),
        }],
    )?;
    assert!(matches!(response, ClientResponse::Ack));

    let share6 = round2::sign(
        &signing_package,
        &nonce6,
        &fixture.key_packages[&pid(6)],
    )?;
    let (_, refill6) = round1::commit(
        fixture.key_packages[&pid(6)].signing_share(),
        &mut OsRng,
    );
    let response = harness.state.handle_signature_replies(
        harness.session(pid(6)),
        request_id,
        vec![SignatureReply {
            sig_index: 0,
            next_commitment: refill6,
            share: Some(share6),
        }],
    )?;
    let ClientResponse::SignaturesComplete { signatures } = response
    else {
        panic!("expected completion, got {response:?}");
    };
    assert_eq!(1, signatures.len());

    // The aggregate is a valid Schnorr signature under the group
    // key.
    let verifying_key = VerifyingKey::deserialize(
        fixture.info.group_key.as_bytes(),
    )?;
    verifying_key.verify(
        &message,
        &frost_secp256k1_tr::Signature::deserialize(
            &signatures[0].0,
        )?,
    )?;

    // Everyone else observes the completion event.
    let events = harness.drain(pid(10));
    assert!(events.iter().any(|event| matches!(
        event,
        ServerEvent::SignaturesComplete { .. }
    )));

    // The completed request is retained and re-offered on login.
    let snapshot = harness.login(pid(1))?;
    assert_eq!(1, snapshot.completed_signatures.len());
    assert_eq!(
        request_id,
        snapshot.completed_signatures[0].details.obj.id
    );

    // A duplicate request id is refused while retained.
    let signed2 =
        Signed::sign(details, &harness.keys[&pid(1)])?;
    let (_, commitment) = round1::commit(
        fixture.key_packages[&pid(1)].signing_share(),
        &mut OsRng,
    );
    let kind = invalid_kind(
        harness
            .state
            .handle_request_signatures(
                harness.session(pid(1)),
                vec![fixture.info.clone()],
                signed2,
                vec![commitment],
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::SigRequestExists, kind);
    Ok(())
}

#[test]
fn coordination_fails_when_pool_is_too_small() -> Result<()> {
    let n = 10;
    let mut harness = Harness::new(n);
    harness.login_all(n)?;
    let fixture = signing_fixture(n as u16, 3)?;
    let message = [7u8; 32];

    let (_, commitment1) = round1::commit(
        fixture.key_packages[&pid(1)].signing_share(),
        &mut OsRng,
    );
    let details = signature_request(&fixture, &message)?;
    let request_id = details.id;
    let signed = Signed::sign(details, &harness.keys[&pid(1)])?;
    harness.state.handle_request_signatures(
        harness.session(pid(1)),
        vec![fixture.info.clone()],
        signed,
        vec![commitment1],
    )?;
    harness.drain_all();

    // Eight empty replies mark eight participants malicious; the
    // eighth leaves 10 - 8 = 2 < 3 and aborts the request.
    for i in 2..=9 {
        let kind = invalid_kind(
            harness
                .state
                .handle_signature_replies(
                    harness.session(pid(i)),
                    request_id,
                    Vec::new(),
                )
                .unwrap_err(),
        );
        assert_eq!(InvalidRequest::EmptySigReply, kind);

        if i == 2 {
            // Malicious is permanent: further replies are refused.
            let (_, commitment) = round1::commit(
                fixture.key_packages[&pid(2)].signing_share(),
                &mut OsRng,
            );
            let kind = invalid_kind(
                harness
                    .state
                    .handle_signature_replies(
                        harness.session(pid(2)),
                        request_id,
                        vec![SignatureReply {
                            sig_index: 0,
                            next_commitment: commitment,
                            share: None,
                        }],
                    )
                    .unwrap_err(),
            );
            assert_eq!(InvalidRequest::MarkedMalicious, kind);
        }
    }

    // Everyone, including the caller, sees the failure.
    for i in [1usize, 9, 10] {
        let events = harness.drain(pid(i));
        assert!(
            events.iter().any(|event| matches!(
                event,
                ServerEvent::SignaturesFailure { .. }
            )),
            "participant {i} missed the failure event"
        );
    }

    // Rejecting the departed request is a benign no-op.
    harness.state.handle_reject_signatures(
        harness.session(pid(10)),
        request_id,
    )?;
    Ok(())
}

#[test]
fn recovery_shares_route_and_deduplicate() -> Result<()> {
    let n = 10;
    let mut harness = Harness::new(n);
    for i in 1..=n {
        if i == 3 {
            continue; // id3 stays offline
        }
        harness.login(pid(i))?;
    }
    harness.drain_all();

    let group_key = GroupKey(vec![6u8; 33]);
    let shares: BTreeMap<ParticipantId, EncryptedKeyShare> = (2..=n)
        .map(|i| (pid(i), EncryptedKeyShare(vec![i as u8; 8])))
        .collect();
    harness.state.handle_share_secret_shares(
        harness.session(pid(1)),
        group_key.clone(),
        shares,
    )?;

    // Online receivers get the share immediately.
    let events = harness.drain(pid(2));
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::SecretShare(share)]
            if share.sender == pid(1)
                && share.key_share.0 == vec![2u8; 8]
    ));

    // The offline receiver finds it in its login snapshot.
    let snapshot = harness.login(pid(3))?;
    assert_eq!(1, snapshot.secret_shares.len());
    assert_eq!(pid(1), snapshot.secret_shares[0].sender);
    assert_eq!(group_key, snapshot.secret_shares[0].group_key);
    harness.drain_all();

    // A second post from the same sender is dropped silently.
    let replays: BTreeMap<ParticipantId, EncryptedKeyShare> = (2..=n)
        .map(|i| (pid(i), EncryptedKeyShare(vec![0xff; 4])))
        .collect();
    harness.state.handle_share_secret_shares(
        harness.session(pid(1)),
        group_key.clone(),
        replays,
    )?;
    assert!(harness.drain(pid(2)).is_empty());
    assert!(harness.drain(pid(3)).is_empty());

    // The share map may not be empty or name the sender.
    let kind = invalid_kind(
        harness
            .state
            .handle_share_secret_shares(
                harness.session(pid(1)),
                group_key.clone(),
                BTreeMap::new(),
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::InvalidKeyShareMap, kind);

    let own: BTreeMap<ParticipantId, EncryptedKeyShare> =
        BTreeMap::from([(pid(1), EncryptedKeyShare(vec![1]))]);
    let kind = invalid_kind(
        harness
            .state
            .handle_share_secret_shares(
                harness.session(pid(1)),
                group_key,
                own,
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::InvalidKeyShareMap, kind);
    Ok(())
}

#[test]
fn dkg_threshold_and_expiry_bounds() -> Result<()> {
    let n = 10;
    let mut harness = Harness::new(n);
    harness.login_all(n)?;

    // threshold == n is legal.
    let details = Signed::sign(
        dkg_details("full", n as u16),
        &harness.keys[&pid(1)],
    )?;
    harness.state.handle_request_new_dkg(
        harness.session(pid(1)),
        details,
        dkg_package(1, n as u16, n as u16)?,
    )?;

    // threshold == n + 1 is not.
    let details = Signed::sign(
        dkg_details("over", n as u16 + 1),
        &harness.keys[&pid(1)],
    )?;
    let kind = invalid_kind(
        harness
            .state
            .handle_request_new_dkg(
                harness.session(pid(1)),
                details,
                dkg_package(1, n as u16, 2)?,
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::InvalidThreshold, kind);

    // Expiry below the minimum bound.
    let mut soon = dkg_details("soon", 2);
    soon.expiry = Expiry::after(Duration::from_secs(60));
    let details = Signed::sign(soon, &harness.keys[&pid(1)])?;
    let kind = invalid_kind(
        harness
            .state
            .handle_request_new_dkg(
                harness.session(pid(1)),
                details,
                dkg_package(1, n as u16, 2)?,
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::ExpiryTooSoon, kind);

    // Expiry above the maximum bound.
    let mut late = dkg_details("late", 2);
    late.expiry = Expiry::after(Duration::from_secs(8 * 24 * 3600));
    let details = Signed::sign(late, &harness.keys[&pid(1)])?;
    let kind = invalid_kind(
        harness
            .state
            .handle_request_new_dkg(
                harness.session(pid(1)),
                details,
                dkg_package(1, n as u16, 2)?,
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::ExpiryTooLate, kind);

    // A duplicate name is refused while the DKG lives.
    let details = Signed::sign(
        dkg_details("full", 2),
        &harness.keys[&pid(2)],
    )?;
    let kind = invalid_kind(
        harness
            .state
            .handle_request_new_dkg(
                harness.session(pid(2)),
                details,
                dkg_package(2, n as u16, 2)?,
            )
            .unwrap_err(),
    );
    assert_eq!(InvalidRequest::DkgRequestExists, kind);

    // Rejection removes it; rejecting again is a no-op.
    harness
        .state
        .handle_reject_dkg(harness.session(pid(2)), "full".into())?;
    harness
        .state
        .handle_reject_dkg(harness.session(pid(2)), "full".into())?;
    Ok(())
}
