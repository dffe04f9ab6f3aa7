//! Signed envelopes for protocol objects.
use crate::Result;
use k256::schnorr::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detached BIP-340 Schnorr signature bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrSignature(
    #[serde(with = "hex::serde")] pub Vec<u8>,
);

impl SchnorrSignature {
    /// Sign a raw message with a participant's long-term key.
    pub fn sign(key: &SigningKey, message: &[u8]) -> Self {
        let signature: Signature = key.sign(message);
        Self(signature.to_bytes().to_vec())
    }

    /// Verify the signature over a raw message.
    pub fn verify(
        &self,
        key: &VerifyingKey,
        message: &[u8],
    ) -> bool {
        let Ok(signature) = Signature::try_from(self.0.as_slice())
        else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}

impl fmt::Debug for SchnorrSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchnorrSignature({})", hex::encode(&self.0))
    }
}

/// An object together with its creator's signature over the
/// serialized object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signed<T> {
    /// The signed object.
    pub obj: T,
    /// Signature over [`Signed::signing_bytes`] of the object.
    pub signature: SchnorrSignature,
}

impl<T: Serialize> Signed<T> {
    /// The canonical byte encoding covered by the signature.
    pub fn signing_bytes(obj: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(obj)?)
    }

    /// Sign an object with a participant's long-term key.
    pub fn sign(obj: T, key: &SigningKey) -> Result<Self> {
        let bytes = Self::signing_bytes(&obj)?;
        let signature = SchnorrSignature::sign(key, &bytes);
        Ok(Self { obj, signature })
    }

    /// Verify the signature under the given public key.
    pub fn verify(&self, key: &VerifyingKey) -> bool {
        match Self::signing_bytes(&self.obj) {
            Ok(bytes) => self.signature.verify(key, &bytes),
            Err(_) => false,
        }
    }
}
