//! Wire and domain types for the ROAST coordination service.
//!
//! The server and its clients share these types; requests travel as
//! one-shot JSON messages and server push events arrive on a
//! per-session stream.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod dkg;
mod error;
mod event;
mod expiry;
mod group;
mod request;
mod session;
mod sharing;
mod signed;
mod signing;

pub use dkg::*;
pub use error::{Error, InvalidRequest};
pub use event::ServerEvent;
pub use expiry::Expiry;
pub use group::*;
pub use request::*;
pub use session::*;
pub use sharing::EncryptedKeyShare;
pub use signed::{SchnorrSignature, Signed};
pub use signing::*;

pub use hex;
pub use uuid;

/// Protocol version spoken by clients; any other value is rejected.
pub const PROTOCOL_VERSION: u16 = 1;

/// Result type for the protocol crate.
pub type Result<T> = std::result::Result<T, Error>;
