//! The four kiosk controllers, lowest layer first.
//!
//! Each controller owns the one below it: [`Kiosk`] owns a [`CashFsm`],
//! which owns a [`ChangerFsm`] and a [`ValidatorFsm`]. Events flow upward as
//! return values of the owner's calls.

pub mod cash;
pub mod changer;
pub mod kiosk;
pub mod validator;

pub use cash::{CashEvent, CashFsm, CashState, DeviceStatus, Telemetry};
pub use changer::{ChangerEvent, ChangerFsm, ChangerState};
pub use kiosk::{Collaborators, Kiosk, KioskEvent, KioskState, ServiceStatus};
pub use validator::{ValidatorEvent, ValidatorFsm, ValidatorState};
