//! Money, product and fault values shared by every controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Amount of money in the smallest currency unit.
pub type Amount = u64;

/// Catalogue key of a product.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment device a fault originates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Changer,
    Validator,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changer => f.write_str("changer"),
            Self::Validator => f.write_str("validator"),
        }
    }
}

/// Hardware fault raised by one of the payment devices.
///
/// Faults are values carried by events rather than Rust errors: a jammed
/// device is part of normal kiosk operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum Fault {
    #[error("{device} error {code}: {text}")]
    Device {
        device: DeviceKind,
        code: i32,
        text: String,
    },

    #[error("{device} offline")]
    Offline { device: DeviceKind },
}

impl Fault {
    pub fn device(device: DeviceKind, code: i32, text: impl Into<String>) -> Self {
        Self::Device {
            device,
            code,
            text: text.into(),
        }
    }

    pub fn offline(device: DeviceKind) -> Self {
        Self::Offline { device }
    }

    /// Vendor error code; loss of connection reports `-1`.
    pub fn code(&self) -> i32 {
        match self {
            Self::Device { code, .. } => *code,
            Self::Offline { .. } => -1,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Device { text, .. } => text,
            Self::Offline { .. } => "offline",
        }
    }

    pub fn source_device(&self) -> DeviceKind {
        match self {
            Self::Device { device, .. } | Self::Offline { device } => *device,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline { .. })
    }
}
