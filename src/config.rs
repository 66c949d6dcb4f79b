// config.rs — Coordinator settings and marble environment
//
// The coordinator is configured from CLI flags (with env fallbacks handled by
// clap). A marble learns where the coordinator is and what it is from its
// environment only.

use std::path::{Path, PathBuf};

use chrono::Duration;
use zeroize::Zeroizing;

use crate::coordinator::CertificateAuthority;
use crate::error::ConfigError;

pub const COORDINATOR_ADDR_ENV: &str = "EDG_COORDINATOR_ADDR";
pub const MARBLE_TYPE_ENV: &str = "EDG_MARBLE_TYPE";
pub const INFRASTRUCTURE_ENV: &str = "EDG_INFRASTRUCTURE";

pub const DEFAULT_LISTEN: &str = "127.0.0.1:25554";
pub const DEFAULT_ORGANIZATION: &str = "Edgeless Systems GmbH";
pub const DEFAULT_CERT_VALIDITY_HOURS: i64 = 24;

/// Existing root certificate and key for the coordinator CA.
#[derive(Debug, Clone)]
pub struct CaFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub organization: String,
    pub listen: String,
    pub cert_validity: Duration,
    pub ca: Option<CaFiles>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            organization: DEFAULT_ORGANIZATION.to_string(),
            listen: DEFAULT_LISTEN.to_string(),
            cert_validity: Duration::hours(DEFAULT_CERT_VALIDITY_HOURS),
            ca: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_validity_hours(mut self, hours: i64) -> Result<Self, ConfigError> {
        if hours <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "cert-validity-hours",
                reason: format!("must be positive, got {}", hours),
            });
        }
        self.cert_validity = Duration::hours(hours);
        Ok(self)
    }

    /// Load the configured root, or generate a fresh one.
    pub fn certificate_authority(&self) -> Result<CertificateAuthority, ConfigError> {
        let ca = match &self.ca {
            Some(files) => {
                let cert = read_string(&files.cert)?;
                let key = Zeroizing::new(read_string(&files.key)?);
                CertificateAuthority::from_pem(&self.organization, &cert, &key, self.cert_validity)
            }
            None => CertificateAuthority::generate(&self.organization, self.cert_validity),
        };
        ca.map_err(|e| ConfigError::InvalidValue {
            name: "ca",
            reason: e.to_string(),
        })
    }
}

fn read_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::File {
        path: path.display().to_string(),
        source,
    })
}

/// What a marble learns from its environment before activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarbleEnv {
    pub coordinator_addr: String,
    pub marble_type: String,
    pub infrastructure: Option<String>,
}

impl MarbleEnv {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Ok(Self {
            coordinator_addr: get(COORDINATOR_ADDR_ENV)
                .ok_or(ConfigError::Missing(COORDINATOR_ADDR_ENV))?,
            marble_type: get(MARBLE_TYPE_ENV).ok_or(ConfigError::Missing(MARBLE_TYPE_ENV))?,
            infrastructure: get(INFRASTRUCTURE_ENV),
        })
    }
}
