use std::time::Duration;

use secrecy::SecretSlice;
use thiserror::Error;

/// Environment variable holding the HMAC secret for tag checksums.
pub const CHECKSUM_KEY_ENV: &str = "MEDTAG_CHECKSUM_KEY";

/// Minimum checksum key length in bytes (256 bits).
pub const MIN_CHECKSUM_KEY_BYTES: usize = 32;

/// Payload keys replaced by the redaction marker before audit storage.
pub const DEFAULT_REDACT_KEYS: &[&str] = &[
    "password",
    "password1",
    "password2",
    "old_password",
    "new_password",
    "token",
    "access",
    "refresh",
    "secret_key",
    "api_key",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("checksum key is not configured, set {0}")]
    KeyMissing(&'static str),

    #[error("checksum key must be at least {MIN_CHECKSUM_KEY_BYTES} bytes, got {0}")]
    KeyTooShort(usize),
}

/// Process-wide configuration, loaded once at startup and never mutated.
///
/// Construction is the initialization order gate: a [`ChecksumEngine`]
/// (crate::checksum) or [`AuditTrail`] (crate::audit) cannot exist without a
/// config value. The checksum key is wrapped so it stays out of `Debug`
/// output and logs.
#[derive(Debug)]
pub struct CoreConfig {
    checksum_key: SecretSlice<u8>,
    pub redact_keys: Vec<String>,
    pub gateway_timeout: Duration,
    pub integrity_failure_threshold: u32,
    pub integrity_failure_window: Duration,
}

impl CoreConfig {
    pub fn new(checksum_key: Vec<u8>) -> Result<Self, ConfigError> {
        if checksum_key.len() < MIN_CHECKSUM_KEY_BYTES {
            return Err(ConfigError::KeyTooShort(checksum_key.len()));
        }
        Ok(Self {
            checksum_key: SecretSlice::from(checksum_key),
            redact_keys: DEFAULT_REDACT_KEYS.iter().map(|s| s.to_string()).collect(),
            gateway_timeout: Duration::from_secs(5),
            integrity_failure_threshold: 5,
            integrity_failure_window: Duration::from_secs(300),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let key = std::env::var(CHECKSUM_KEY_ENV)
            .map_err(|_| ConfigError::KeyMissing(CHECKSUM_KEY_ENV))?;
        Self::new(key.into_bytes())
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn with_integrity_thresholds(mut self, threshold: u32, window: Duration) -> Self {
        self.integrity_failure_threshold = threshold;
        self.integrity_failure_window = window;
        self
    }

    pub fn with_redact_keys(mut self, keys: Vec<String>) -> Self {
        self.redact_keys = keys;
        self
    }

    pub(crate) fn checksum_key(&self) -> &SecretSlice<u8> {
        &self.checksum_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_keys() {
        let err = CoreConfig::new(vec![0u8; 16]).unwrap_err();
        assert!(matches!(err, ConfigError::KeyTooShort(16)));
    }

    #[test]
    fn accepts_a_256_bit_key() {
        assert!(CoreConfig::new(vec![7u8; 32]).is_ok());
    }

    #[test]
    fn debug_output_does_not_leak_the_key() {
        let config = CoreConfig::new(vec![0xAB; 32]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("171"));
        assert!(!debug.to_lowercase().contains("ab, ab"));
    }
}
