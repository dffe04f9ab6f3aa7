//! Error type for the coordination server.
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the coordination server.
#[derive(Debug, Error)]
pub enum Error {
    /// A client request was refused; returned to the caller.
    #[error(transparent)]
    InvalidRequest(#[from] roast_protocol::InvalidRequest),

    /// A FROST operation failed.
    #[error(transparent)]
    Frost(#[from] roast_frost::Error),

    /// A protocol value could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] roast_protocol::Error),

    /// An I/O operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error(transparent)]
    TomlDecode(#[from] toml::de::Error),

    /// The configuration could not be serialized to TOML.
    #[error(transparent)]
    TomlEncode(#[from] toml::ser::Error),

    /// The configuration could not be encoded or decoded as binary.
    #[error(transparent)]
    Binary(#[from] bincode::Error),

    /// A CORS origin is not a valid header value.
    #[error(transparent)]
    HeaderValue(#[from] axum::http::header::InvalidHeaderValue),

    /// The path does not point to a file.
    #[error("path {0} is not a file")]
    NotFile(PathBuf),

    /// The configuration file has no parent directory.
    #[error("no parent directory for config file")]
    NoParentDir,

    /// The configuration names no participants.
    #[error("a group with participants is required")]
    GroupRequired,
}
