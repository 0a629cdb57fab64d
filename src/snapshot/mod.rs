//! Point-in-time view of a kiosk.
//!
//! A snapshot records every controller state, the service status, the money
//! counters and the kiosk transition history. It is what an operator console
//! shows and what gets attached to fault reports; transition tables and
//! collaborators are not part of it.

use crate::core::StateHistory;
use crate::fsm::{CashState, ChangerState, DeviceStatus, KioskState, ServiceStatus, ValidatorState};
use crate::types::{Amount, Fault, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;

pub use error::SnapshotError;

/// Version identifier for the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable view of a kiosk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KioskSnapshot {
    /// Snapshot format version
    pub version: u32,

    /// Unique snapshot identifier
    pub id: String,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    pub kiosk: KioskState,
    pub cash: CashState,
    pub changer: ChangerState,
    pub validator: ValidatorState,
    pub changer_status: DeviceStatus,
    pub validator_status: DeviceStatus,

    pub service: ServiceStatus,
    pub last_error: Option<Fault>,

    /// Product of the sale in progress
    pub product: Option<ProductId>,

    pub deposit_amount: Amount,
    pub dispense_amount: Amount,
    pub coin_amount: Amount,
    pub bill_amount: Amount,
    pub total_amount: Amount,
    /// Change still owed by a disconnected changer
    pub owed_amount: Amount,

    /// Kiosk transitions, oldest first
    pub history: StateHistory<KioskState>,
}

impl KioskSnapshot {
    /// Encode as pretty JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    /// Decode from JSON, rejecting unsupported versions.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    /// Decode from bincode, rejecting unsupported versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<(), SnapshotError> {
        if self.version == SNAPSHOT_VERSION {
            Ok(())
        } else {
            Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            })
        }
    }
}
