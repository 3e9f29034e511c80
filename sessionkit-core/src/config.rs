use std::time::Duration;

use crate::error::SessionKitError;

/// Deployment environment the SDK talks to.
#[derive(Debug, Clone, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Staging infrastructure.
    Staging,
    /// Production infrastructure.
    Production,
}

/// Default lifetime of a freshly generated session key.
pub const DEFAULT_SESSION_KEY_TTL_SECS: u64 = 60 * 60 * 24; // 24 hours

/// Default cap on cached session keys per smart account, applied when
/// constructing a `CredentialStore`.
pub const DEFAULT_MAX_CACHED_KEYS: usize = 3;

/// Default settle delay applied before a connectivity event starts a run.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 400;

/// Static configuration for the provisioning pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chain the smart accounts live on.
    pub chain_id: u64,
    /// Base URL of the backend authorization service.
    pub authorizer_url: String,
    /// Lifetime of a freshly generated session key, in seconds.
    pub session_key_ttl_secs: u64,
    /// Settle delay before a connectivity event commits to a fresh run.
    pub settle_delay: Duration,
}

impl Config {
    /// Creates a configuration, validating required fields.
    ///
    /// # Errors
    /// Returns [`SessionKitError::NotConfigured`] if the authorizer URL is
    /// empty or the chain id is zero.
    pub fn new(chain_id: u64, authorizer_url: String) -> Result<Self, SessionKitError> {
        if authorizer_url.is_empty() {
            return Err(SessionKitError::NotConfigured(
                "authorizer_url is empty".to_string(),
            ));
        }
        if chain_id == 0 {
            return Err(SessionKitError::NotConfigured(
                "chain_id must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            chain_id,
            authorizer_url,
            session_key_ttl_secs: DEFAULT_SESSION_KEY_TTL_SECS,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        })
    }

    /// Creates a configuration with per-environment defaults.
    ///
    /// # Errors
    /// Returns [`SessionKitError::NotConfigured`] on invalid overrides.
    pub fn from_environment(
        environment: &Environment,
        authorizer_url: Option<String>,
    ) -> Result<Self, SessionKitError> {
        match environment {
            Environment::Staging => Self::new(
                480,
                authorizer_url
                    .unwrap_or_else(|| "https://authorizer.stage.sessionkit.dev".to_string()),
            ),
            Environment::Production => Self::new(
                480,
                authorizer_url.unwrap_or_else(|| "https://authorizer.sessionkit.dev".to_string()),
            ),
        }
    }

    /// Sets the session key lifetime.
    #[must_use]
    pub const fn with_session_key_ttl(mut self, ttl_secs: u64) -> Self {
        self.session_key_ttl_secs = ttl_secs;
        self
    }

    /// Sets the connectivity settle delay.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}
