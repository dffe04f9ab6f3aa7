//! Public HD derivation of aggregate keys.
//!
//! Child keys are obtained by adding a tweak point to the group key
//! and to every participant's verifying share; the tweak scalar is
//! derived from the parent key and the path index. Adding the same
//! tweak to every share keeps the shares consistent with the shifted
//! group polynomial.
use crate::{Error, Result};
use frost_secp256k1_tr::{
    keys::{PublicKeyPackage, VerifyingShare},
    Identifier, VerifyingKey,
};
use k256::{
    elliptic_curve::{
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
    },
    AffinePoint, EncodedPoint, ProjectivePoint, Scalar, U256,
};
use roast_protocol::{AggregateKeyInfo, ParticipantId};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Domain tag for tweak derivation.
const DERIVATION_TAG: &[u8] = b"roast/key-derivation";

/// An aggregate key derived for signing: the group verifying key and
/// the per-participant verifying shares at the derived position.
#[derive(Debug, Clone)]
pub struct DerivedKey {
    /// Signing threshold of the underlying key.
    pub threshold: u16,
    /// Derived group verifying key.
    pub verifying_key: VerifyingKey,
    /// Derived verifying shares, keyed by participant.
    pub verifying_shares: BTreeMap<ParticipantId, VerifyingShare>,
}

impl DerivedKey {
    /// Derive the key at `path` from the master key info.
    ///
    /// An empty path yields the master key unchanged.
    pub fn derive(
        info: &AggregateKeyInfo,
        path: &[u32],
    ) -> Result<Self> {
        if path.is_empty() {
            let verifying_key =
                VerifyingKey::deserialize(info.group_key.as_bytes())?;
            return Ok(Self {
                threshold: info.threshold,
                verifying_key,
                verifying_shares: info.verifying_shares.clone(),
            });
        }

        let mut group = decode_point(info.group_key.as_bytes())?;
        let mut shares: BTreeMap<ParticipantId, ProjectivePoint> =
            BTreeMap::new();
        for (id, share) in &info.verifying_shares {
            shares.insert(*id, decode_point(&share.serialize()?)?);
        }

        for index in path {
            let tweak = tweak_scalar(&encode_point(&group), *index);
            let delta = ProjectivePoint::GENERATOR * tweak;
            group += delta;
            for share in shares.values_mut() {
                *share += delta;
            }
        }

        // Taproot keys are x-only with even y; negating the group
        // key requires negating every share with it.
        if encode_point(&group)[0] == 0x03 {
            group = -group;
            for share in shares.values_mut() {
                *share = -*share;
            }
        }

        let verifying_key =
            VerifyingKey::deserialize(&encode_point(&group))?;
        let mut verifying_shares = BTreeMap::new();
        for (id, point) in shares {
            verifying_shares.insert(
                id,
                VerifyingShare::deserialize(&encode_point(&point))?,
            );
        }

        Ok(Self {
            threshold: info.threshold,
            verifying_key,
            verifying_shares,
        })
    }

    /// Frost identifier of a participant: its 1-based position in
    /// the group's sorted identifier order.
    pub fn identifier(
        &self,
        participant: &ParticipantId,
    ) -> Result<Identifier> {
        let position = self
            .verifying_shares
            .keys()
            .position(|id| id == participant)
            .ok_or(Error::UnknownParticipant(*participant))?;
        Ok(Identifier::try_from((position + 1) as u16)?)
    }

    /// Verifying share of a participant, if it has one.
    pub fn verifying_share(
        &self,
        participant: &ParticipantId,
    ) -> Option<&VerifyingShare> {
        self.verifying_shares.get(participant)
    }

    /// Assemble the frost public key package for aggregation.
    pub fn public_key_package(&self) -> Result<PublicKeyPackage> {
        let mut shares = BTreeMap::new();
        for (id, share) in &self.verifying_shares {
            shares.insert(self.identifier(id)?, share.clone());
        }
        Ok(PublicKeyPackage::new(shares, self.verifying_key))
    }
}

fn tweak_scalar(parent: &[u8], index: u32) -> Scalar {
    let digest = Sha256::new()
        .chain_update(DERIVATION_TAG)
        .chain_update(parent)
        .chain_update(index.to_be_bytes())
        .finalize();
    <Scalar as Reduce<U256>>::reduce_bytes(&digest)
}

fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    // Accept both 33-byte SEC1 and 32-byte x-only encodings.
    let mut sec1 = Vec::with_capacity(33);
    if bytes.len() == 32 {
        sec1.push(0x02);
    }
    sec1.extend_from_slice(bytes);
    let encoded = EncodedPoint::from_bytes(&sec1)
        .map_err(|_| Error::InvalidPoint)?;
    let affine: Option<AffinePoint> =
        AffinePoint::from_encoded_point(&encoded).into();
    Ok(ProjectivePoint::from(affine.ok_or(Error::InvalidPoint)?))
}

fn encode_point(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use frost_secp256k1_tr::keys::IdentifierList;
    use rand::rngs::OsRng;
    use roast_protocol::GroupKey;

    fn master(n: u16, t: u16) -> Result<AggregateKeyInfo> {
        let (_, pubkeys) =
            frost_secp256k1_tr::keys::generate_with_dealer(
                n,
                t,
                IdentifierList::Default,
                &mut OsRng,
            )?;
        let mut verifying_shares = BTreeMap::new();
        for (index, share) in
            pubkeys.verifying_shares().values().enumerate()
        {
            let id = ParticipantId::new([
                b'i',
                b'd',
                b'0',
                b'1' + index as u8,
            ]);
            verifying_shares.insert(id, share.clone());
        }
        Ok(AggregateKeyInfo {
            group_key: GroupKey(
                pubkeys.verifying_key().serialize()?,
            ),
            threshold: t,
            verifying_shares,
        })
    }

    #[test]
    fn empty_path_is_identity() -> Result<()> {
        let info = master(3, 2)?;
        let derived = DerivedKey::derive(&info, &[])?;
        assert_eq!(
            info.group_key.as_bytes(),
            derived.verifying_key.serialize()?.as_slice()
        );
        assert_eq!(info.verifying_shares, derived.verifying_shares);
        Ok(())
    }

    #[test]
    fn derivation_is_deterministic_and_index_sensitive()
    -> Result<()> {
        let info = master(3, 2)?;
        let a = DerivedKey::derive(&info, &[0, 7])?;
        let b = DerivedKey::derive(&info, &[0, 7])?;
        let c = DerivedKey::derive(&info, &[1, 7])?;
        assert_eq!(
            a.verifying_key.serialize()?,
            b.verifying_key.serialize()?
        );
        assert_ne!(
            a.verifying_key.serialize()?,
            c.verifying_key.serialize()?
        );
        Ok(())
    }

    #[test]
    fn derived_keys_are_even_y() -> Result<()> {
        let info = master(3, 2)?;
        for index in 0..8u32 {
            let derived = DerivedKey::derive(&info, &[index])?;
            let bytes = derived.verifying_key.serialize()?;
            assert_ne!(0x03, bytes[0]);
        }
        Ok(())
    }
}
