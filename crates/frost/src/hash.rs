//! Hashing helpers shared by the server and its clients.
use crate::Result;
use roast_protocol::{DkgCommitment, NewDkgDetails, ParticipantId};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// SHA-256 digest of a byte string.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Hash binding a DKG's details to its full round 1 commitment set.
///
/// Every participant signs this hash before sending round 2 secrets,
/// proving they all saw the same commitment set.
pub fn hash_with_commitments(
    details: &NewDkgDetails,
    commitments: &BTreeMap<ParticipantId, DkgCommitment>,
) -> Result<[u8; 32]> {
    let bytes = serde_json::to_vec(&(details, commitments))?;
    Ok(sha256(&bytes))
}
