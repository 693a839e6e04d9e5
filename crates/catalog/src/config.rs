//! Ledger configuration.

use thiserror::Error;

use tally_core::UserId;

/// Environment variable holding the admin identity (a UUID).
pub const ADMIN_ENV: &str = "TALLY_ADMIN_ID";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Construction-time settings. The admin identity is immutable afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    admin: UserId,
}

impl CatalogConfig {
    pub fn new(admin: UserId) -> Self {
        Self { admin }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = lookup(ADMIN_ENV).ok_or(ConfigError::Missing(ADMIN_ENV))?;
        let admin = raw.trim().parse::<UserId>().map_err(|e| ConfigError::Invalid {
            var: ADMIN_ENV,
            reason: e.to_string(),
        })?;
        Ok(Self::new(admin))
    }

    pub fn admin(&self) -> UserId {
        self.admin
    }
}
