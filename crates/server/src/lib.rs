//! Coordination core and websocket server for ROAST threshold
//! signing.
//!
//! The server is a semi-trusted router and state machine: it never
//! learns a secret share and never signs anything itself. It drives
//! the protocol by validating requests, mutating an owned
//! [`ServerState`] and fanning events out to per-session streams.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod acks;
mod auth;
mod config;
mod dkg;
mod error;
mod expiring;
mod ring;
mod server;
mod service;
mod session;
mod sharing;
mod signing;
mod state;
mod websocket;

pub use config::{CorsConfig, ServerConfig, TlsConfig};
pub use error::Error;
pub use expiring::{ExpirableMap, HasExpiry};
pub use ring::RingBuffer;
pub use server::CoordinatorServer;
pub use service::{CoordinatorService, State};
pub use session::{ClientSession, EVENT_BUFFER_CAPACITY};
pub use state::ServerState;

pub use axum;

/// Result type for the coordination server.
pub type Result<T> = std::result::Result<T, Error>;
