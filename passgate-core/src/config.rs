//! Relying Party configuration
//!
//! The RP identity is fixed per deployment. The origin must match what the
//! browser reports exactly (scheme, host and port) or every ceremony fails.

use chrono::Duration;
use url::Url;

/// Default lifetime of an issued challenge (5 minutes)
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 300;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid origin URL: {0}")]
    InvalidOrigin(String),
    #[error("Invalid challenge TTL: {0}")]
    InvalidTtl(String),
    #[error("Relying party id must not be empty")]
    EmptyRpId,
}

/// Relying Party identity and ceremony policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingPartyConfig {
    /// Relying Party ID (typically the domain name)
    pub rp_id: String,
    /// Human-readable name shown by the authenticator
    pub rp_name: String,
    /// Exact origin the browser is expected to report
    pub origin: Url,
    /// How long an issued challenge stays verifiable
    pub challenge_ttl: Duration,
}

impl RelyingPartyConfig {
    /// Create a configuration with the default challenge TTL
    pub fn new(rp_id: &str, rp_name: &str, origin: &Url) -> Result<Self, ConfigError> {
        if rp_id.trim().is_empty() {
            return Err(ConfigError::EmptyRpId);
        }
        if origin.host_str().is_none() {
            return Err(ConfigError::InvalidOrigin(format!(
                "{} has no host",
                origin
            )));
        }

        Ok(Self {
            rp_id: rp_id.to_string(),
            rp_name: rp_name.to_string(),
            origin: origin.clone(),
            challenge_ttl: Duration::seconds(DEFAULT_CHALLENGE_TTL_SECS),
        })
    }

    /// Override the challenge TTL
    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `PASSGATE_RP_ID` - Relying Party ID (default: "localhost")
    /// - `PASSGATE_RP_NAME` - RP display name (default: "StreamlitApp")
    /// - `PASSGATE_RP_ORIGIN` - RP origin URL (default: "http://localhost:8501")
    /// - `PASSGATE_CHALLENGE_TTL_SECS` - challenge lifetime (default: 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        let rp_id = std::env::var("PASSGATE_RP_ID").unwrap_or_else(|_| "localhost".to_string());
        let rp_name =
            std::env::var("PASSGATE_RP_NAME").unwrap_or_else(|_| "StreamlitApp".to_string());
        let rp_origin = std::env::var("PASSGATE_RP_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:8501".to_string());

        let origin =
            Url::parse(&rp_origin).map_err(|e| ConfigError::InvalidOrigin(format!("{}", e)))?;

        let ttl_secs = match std::env::var("PASSGATE_CHALLENGE_TTL_SECS") {
            Ok(value) => value
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTtl(value))?,
            Err(_) => DEFAULT_CHALLENGE_TTL_SECS,
        };

        Ok(Self::new(&rp_id, &rp_name, &origin)?.with_challenge_ttl(Duration::seconds(ttl_secs)))
    }

    /// Origin in the serialized form clients report (no trailing slash)
    pub fn origin_str(&self) -> String {
        self.origin.origin().ascii_serialization()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let origin = Url::parse("http://localhost:8501").unwrap();
        let config = RelyingPartyConfig::new("localhost", "Test", &origin).unwrap();
        assert_eq!(config.origin_str(), "http://localhost:8501");
        assert_eq!(config.challenge_ttl, Duration::seconds(300));
    }

    #[test]
    fn test_config_rejects_hostless_origin() {
        let origin = Url::parse("data:text/plain,hello").unwrap();
        assert!(matches!(
            RelyingPartyConfig::new("localhost", "Test", &origin),
            Err(ConfigError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn test_config_rejects_empty_rp_id() {
        let origin = Url::parse("https://example.com").unwrap();
        assert!(matches!(
            RelyingPartyConfig::new(" ", "Test", &origin),
            Err(ConfigError::EmptyRpId)
        ));
    }

    #[test]
    fn test_config_from_env_defaults() {
        std::env::remove_var("PASSGATE_RP_ID");
        std::env::remove_var("PASSGATE_RP_NAME");
        std::env::remove_var("PASSGATE_RP_ORIGIN");
        std::env::remove_var("PASSGATE_CHALLENGE_TTL_SECS");

        let config = RelyingPartyConfig::from_env().unwrap();
        assert_eq!(config.rp_id, "localhost");
        assert_eq!(config.rp_name, "StreamlitApp");
        assert_eq!(config.origin_str(), "http://localhost:8501");
    }
}
