//! Kiosk configuration.
//!
//! Configuration comes from JSON (see [`KioskConfig::from_path`]) or is
//! assembled in code with [`KioskConfig::builder`]. Either way it is checked
//! with [`KioskConfig::validate`], which reports every problem at once.
//!
//! # Example
//!
//! ```rust
//! use cashflow::config::{FaultPolicy, KioskConfig};
//!
//! let config = KioskConfig::from_json_str(
//!     r#"{
//!         "products": { "espresso": 120, "tea": 80 },
//!         "accept_timeout_secs": 45,
//!         "fault_policy": { "codes": [3, 7] }
//!     }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.price(&"tea".into()), Some(80));
//! assert_eq!(config.history_capacity, 64);
//! assert!(matches!(config.fault_policy, FaultPolicy::Codes(_)));
//! assert!(config.validate().is_ok());
//! ```

pub mod builder;
pub mod error;
pub mod rules;

pub use builder::KioskConfigBuilder;
pub use error::{ConfigError, ConfigViolation};

use crate::core::DEFAULT_HISTORY_CAPACITY;
use crate::types::{Amount, Fault, ProductId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;
use stillwater::validation::Validation;

/// Accept window used when the configuration does not set one.
pub const DEFAULT_ACCEPT_TIMEOUT_SECS: u64 = 60;

/// Which faults take the kiosk out of service until an operator resets it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Every device error is fatal; a lost connection is not.
    #[default]
    DeviceErrors,
    /// Only device errors with one of these codes are fatal.
    Codes(BTreeSet<i32>),
    /// Nothing is fatal.
    Never,
}

impl FaultPolicy {
    pub fn is_fatal(&self, fault: &Fault) -> bool {
        match (self, fault) {
            (_, Fault::Offline { .. }) | (Self::Never, _) => false,
            (Self::DeviceErrors, Fault::Device { .. }) => true,
            (Self::Codes(codes), Fault::Device { code, .. }) => codes.contains(code),
        }
    }
}

fn default_accept_timeout() -> u64 {
    DEFAULT_ACCEPT_TIMEOUT_SECS
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

/// Everything a kiosk needs besides its collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KioskConfig {
    /// Product id to price.
    pub products: BTreeMap<ProductId, Amount>,

    /// Seconds a customer has between payments; 0 disables the timeout.
    #[serde(default = "default_accept_timeout")]
    pub accept_timeout_secs: u64,

    #[serde(default)]
    pub fault_policy: FaultPolicy,

    /// Transitions kept per controller.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            products: BTreeMap::new(),
            accept_timeout_secs: DEFAULT_ACCEPT_TIMEOUT_SECS,
            fault_policy: FaultPolicy::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl KioskConfig {
    pub fn builder() -> KioskConfigBuilder {
        KioskConfigBuilder::new()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration, reporting all violations together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match rules::check(self) {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => {
                Err(ConfigError::Invalid(errors.iter().cloned().collect()))
            }
        }
    }

    pub fn price(&self, product: &ProductId) -> Option<Amount> {
        self.products.get(product).copied()
    }

    /// `None` when the accept window never times out.
    pub fn accept_timeout(&self) -> Option<Duration> {
        (self.accept_timeout_secs > 0).then(|| Duration::from_secs(self.accept_timeout_secs))
    }
}
