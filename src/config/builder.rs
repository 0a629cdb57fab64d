//! Builder for assembling a configuration in code.

use crate::config::{FaultPolicy, KioskConfig};
use crate::types::{Amount, ProductId};

/// Builder for [`KioskConfig`]. Unset fields keep their defaults.
#[derive(Debug, Default)]
pub struct KioskConfigBuilder {
    config: KioskConfig,
}

impl KioskConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or reprice a product
    pub fn product(mut self, id: impl Into<ProductId>, price: Amount) -> Self {
        self.config.products.insert(id.into(), price);
        self
    }

    /// Set the accept window in seconds; 0 disables it
    pub fn accept_timeout_secs(mut self, secs: u64) -> Self {
        self.config.accept_timeout_secs = secs;
        self
    }

    pub fn fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.config.fault_policy = policy;
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// Build the configuration. Call [`KioskConfig::validate`] before use.
    pub fn build(self) -> KioskConfig {
        self.config
    }
}
