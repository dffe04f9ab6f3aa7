//! FROST primitives consumed by the ROAST coordination service.
//!
//! The server never holds key material; this crate wraps the fixed
//! capability surface it drives the protocol with: commitment-set
//! hashing, signature-share verification, share aggregation and
//! public HD derivation of aggregate keys.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod hash;
mod hd;
mod signing;

pub use error::Error;
pub use hash::{hash_with_commitments, sha256};
pub use hd::DerivedKey;
pub use signing::{aggregate_shares, verify_share};

pub use frost_secp256k1_tr as frost;

/// Result type for the frost capability crate.
pub type Result<T> = std::result::Result<T, Error>;
