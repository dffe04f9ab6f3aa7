//! Signature-share verification and aggregation.
use crate::{DerivedKey, Error, Result};
use frost_secp256k1_tr::{Identifier, SigningPackage};
use roast_protocol::{
    ParticipantId, SignatureShare, SigningCommitment,
    ThresholdSignature,
};
use std::collections::BTreeMap;

fn signing_package(
    derived: &DerivedKey,
    commitments: &BTreeMap<ParticipantId, SigningCommitment>,
    message: &[u8],
) -> Result<SigningPackage> {
    let mut map: BTreeMap<Identifier, SigningCommitment> =
        BTreeMap::new();
    for (participant, commitment) in commitments {
        map.insert(
            derived.identifier(participant)?,
            commitment.clone(),
        );
    }
    Ok(SigningPackage::new(map, message))
}

/// Verify one participant's signature share for a round.
///
/// `commitments` is the commitment set the round was opened with and
/// `message` the message being signed under the derived key.
pub fn verify_share(
    derived: &DerivedKey,
    participant: ParticipantId,
    commitments: &BTreeMap<ParticipantId, SigningCommitment>,
    message: &[u8],
    share: &SignatureShare,
) -> Result<()> {
    let signing_package =
        signing_package(derived, commitments, message)?;
    let identifier = derived.identifier(&participant)?;
    let verifying_share = derived
        .verifying_share(&participant)
        .ok_or(Error::UnknownParticipant(participant))?;
    frost_core::verify_signature_share(
        identifier,
        verifying_share,
        share,
        &signing_package,
        &derived.verifying_key,
    )?;
    Ok(())
}

/// Aggregate a threshold of verified shares into a final Schnorr
/// signature.
pub fn aggregate_shares(
    derived: &DerivedKey,
    commitments: &BTreeMap<ParticipantId, SigningCommitment>,
    shares: &[(ParticipantId, SignatureShare)],
    message: &[u8],
) -> Result<ThresholdSignature> {
    let signing_package =
        signing_package(derived, commitments, message)?;
    let mut share_map: BTreeMap<Identifier, SignatureShare> =
        BTreeMap::new();
    for (participant, share) in shares {
        share_map
            .insert(derived.identifier(participant)?, share.clone());
    }
    let pubkeys = derived.public_key_package()?;
    let signature = frost_secp256k1_tr::aggregate(
        &signing_package,
        &share_map,
        &pubkeys,
    )?;
    Ok(ThresholdSignature(signature.serialize()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use frost_secp256k1_tr::{
        keys::{IdentifierList, KeyPackage},
        round1, round2, VerifyingKey,
    };
    use rand::rngs::OsRng;
    use roast_protocol::{AggregateKeyInfo, GroupKey};

    struct Fixture {
        info: AggregateKeyInfo,
        key_packages: BTreeMap<ParticipantId, KeyPackage>,
    }

    fn fixture(n: u16, t: u16) -> Result<Fixture> {
        let (secret_shares, pubkeys) =
            frost_secp256k1_tr::keys::generate_with_dealer(
                n,
                t,
                IdentifierList::Default,
                &mut OsRng,
            )?;

        let ids: Vec<ParticipantId> = (0..n)
            .map(|i| {
                ParticipantId::new([b'i', b'd', b'0', b'1' + i as u8])
            })
            .collect();

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

        Ok(Fixture {
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

    #[test]
    fn verify_and_aggregate_round() -> Result<()> {
        let fixture = fixture(3, 2)?;
        let derived = DerivedKey::derive(&fixture.info, &[])?;
        let message = [42u8; 32];

        let signers: Vec<ParticipantId> =
            fixture.key_packages.keys().take(2).copied().collect();

        let mut nonces = BTreeMap::new();
        let mut commitments = BTreeMap::new();
        for participant in &signers {
            let key_package = &fixture.key_packages[participant];
            let (nonce, commitment) = round1::commit(
                key_package.signing_share(),
                &mut OsRng,
            );
            nonces.insert(*participant, nonce);
            commitments.insert(*participant, commitment);
        }

        let signing_package = super::signing_package(
            &derived,
            &commitments,
            &message,
        )?;
        let mut shares = Vec::new();
        for participant in &signers {
            let share = round2::sign(
                &signing_package,
                &nonces[participant],
                &fixture.key_packages[participant],
            )?;
            verify_share(
                &derived,
                *participant,
                &commitments,
                &message,
                &share,
            )?;
            shares.push((*participant, share));
        }

        // A share from the wrong participant must not verify.
        assert!(verify_share(
            &derived,
            signers[1],
            &commitments,
            &message,
            &shares[0].1,
        )
        .is_err());

        let signature = aggregate_shares(
            &derived,
            &commitments,
            &shares,
            &message,
        )?;
        let verifying_key = VerifyingKey::deserialize(
            fixture.info.group_key.as_bytes(),
        )?;
        verifying_key.verify(
            &message,
            &frost_secp256k1_tr::Signature::deserialize(
                &signature.0,
            )?,
        )?;
        Ok(())
    }
}
