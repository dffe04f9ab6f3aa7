//! Server configuration.
use crate::{Error, Result};
use roast_protocol::GroupInfo;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;

/// Configuration for the coordination server.
///
/// All durations are in seconds. The TOML form is the on-disk
/// configuration file; the binary form is used where configs are
/// exchanged or stored compactly. Both round-trip to an equal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Seconds a login challenge remains valid.
    #[serde(default = "default_challenge_ttl")]
    pub challenge_ttl: u64,

    /// Baseline session lifetime; refreshed by session extension.
    #[serde(default = "default_session_ttl")]
    pub session_ttl: u64,

    /// Lower bound on a DKG request's expiry.
    #[serde(default = "default_min_dkg_request_ttl")]
    pub min_dkg_request_ttl: u64,

    /// Upper bound on a DKG request's expiry.
    #[serde(default = "default_max_dkg_request_ttl")]
    pub max_dkg_request_ttl: u64,

    /// Lower bound on a signatures request's expiry.
    #[serde(default = "default_min_signatures_request_ttl")]
    pub min_signatures_request_ttl: u64,

    /// Upper bound on a signatures request's expiry.
    #[serde(default = "default_max_signatures_request_ttl")]
    pub max_signatures_request_ttl: u64,

    /// Minimum retention for completed signatures.
    #[serde(default = "default_min_completed_signatures_ttl")]
    pub min_completed_signatures_ttl: u64,

    /// Retention for cached DKG acknowledgements.
    #[serde(default = "default_ack_cache_ttl")]
    pub ack_cache_ttl: u64,

    /// Interval for keepalive events; disabled when unset.
    #[serde(default)]
    pub keep_alive: Option<u64>,

    /// The fixed participant group served by this instance.
    pub group: GroupInfo,

    /// Configuration for TLS encryption.
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Configuration for CORS.
    #[serde(default)]
    pub cors: CorsConfig,
}

fn default_challenge_ttl() -> u64 {
    20
}

fn default_session_ttl() -> u64 {
    60
}

fn default_min_dkg_request_ttl() -> u64 {
    29 * 60
}

fn default_max_dkg_request_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_min_signatures_request_ttl() -> u64 {
    25
}

fn default_max_signatures_request_ttl() -> u64 {
    14 * 24 * 60 * 60
}

fn default_min_completed_signatures_ttl() -> u64 {
    24 * 60 * 60
}

fn default_ack_cache_ttl() -> u64 {
    60
}

/// Certificate and key for TLS.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to the certificate.
    pub cert: PathBuf,
    /// Path to the certificate key file.
    pub key: PathBuf,
}

/// Configuration for CORS.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorsConfig {
    /// List of allowed CORS origins.
    pub origins: Vec<Url>,
}

impl ServerConfig {
    /// Build a config with default timing values for a group.
    pub fn with_group(group: GroupInfo) -> Self {
        Self {
            challenge_ttl: default_challenge_ttl(),
            session_ttl: default_session_ttl(),
            min_dkg_request_ttl: default_min_dkg_request_ttl(),
            max_dkg_request_ttl: default_max_dkg_request_ttl(),
            min_signatures_request_ttl:
                default_min_signatures_request_ttl(),
            max_signatures_request_ttl:
                default_max_signatures_request_ttl(),
            min_completed_signatures_ttl:
                default_min_completed_signatures_ttl(),
            ack_cache_ttl: default_ack_cache_ttl(),
            keep_alive: None,
            group,
            tls: None,
            cors: CorsConfig::default(),
        }
    }

    /// Load a server config from a file path.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !fs::try_exists(path.as_ref()).await? {
            return Err(Error::NotFile(path.as_ref().to_path_buf()));
        }

        let contents = fs::read_to_string(path.as_ref()).await?;
        let mut config = Self::from_toml(&contents)?;

        let dir = Self::directory(path.as_ref())?;
        if let Some(tls) = config.tls.as_mut() {
            if tls.cert.is_relative() {
                tls.cert = dir.join(&tls.cert).canonicalize()?;
            }
            if tls.key.is_relative() {
                tls.key = dir.join(&tls.key).canonicalize()?;
            }
        }

        Ok(config)
    }

    /// Parse a config from its TOML form.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        if config.group.is_empty() {
            return Err(Error::GroupRequired);
        }
        Ok(config)
    }

    /// Serialize the config to its TOML form.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parse a config from its binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Serialize the config to its binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Parent directory of the configuration file.
    fn directory(file: impl AsRef<Path>) -> Result<PathBuf> {
        file.as_ref()
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or(Error::NoParentDir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use k256::schnorr::SigningKey;
    use rand::rngs::OsRng;
    use roast_protocol::{ParticipantId, ParticipantKey};

    fn config() -> ServerConfig {
        let participants = (1..=3u8)
            .map(|i| {
                let id =
                    ParticipantId::new([b'i', b'd', b'0', b'0' + i]);
                let key = SigningKey::random(&mut OsRng);
                (id, ParticipantKey::new(*key.verifying_key()))
            })
            .collect();
        let mut config = ServerConfig::with_group(GroupInfo {
            id: "test-group".to_owned(),
            participants,
        });
        config.keep_alive = Some(30);
        config.cors.origins =
            vec!["https://example.com".parse().unwrap()];
        config
    }

    #[test]
    fn defaults_match_documentation() {
        let config = config();
        assert_eq!(20, config.challenge_ttl);
        assert_eq!(60, config.session_ttl);
        assert_eq!(29 * 60, config.min_dkg_request_ttl);
        assert_eq!(7 * 24 * 60 * 60, config.max_dkg_request_ttl);
        assert_eq!(25, config.min_signatures_request_ttl);
        assert_eq!(
            14 * 24 * 60 * 60,
            config.max_signatures_request_ttl
        );
        assert_eq!(
            24 * 60 * 60,
            config.min_completed_signatures_ttl
        );
        assert_eq!(60, config.ack_cache_ttl);
    }

    #[test]
    fn toml_round_trip() -> Result<()> {
        let config = config();
        let decoded = ServerConfig::from_toml(&config.to_toml()?)?;
        assert_eq!(config, decoded);
        Ok(())
    }

    #[test]
    fn binary_round_trip() -> Result<()> {
        let config = config();
        let decoded = ServerConfig::from_bytes(&config.to_bytes()?)?;
        assert_eq!(config, decoded);
        Ok(())
    }

    #[test]
    fn empty_group_is_rejected() -> Result<()> {
        let mut config = config();
        config.group.participants.clear();
        let toml = config.to_toml()?;
        assert!(ServerConfig::from_toml(&toml).is_err());
        Ok(())
    }
}
