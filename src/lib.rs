//! Cashflow: table-driven state machines for a cash vending kiosk
//!
//! A kiosk sells one product at a time and takes payment in coins and bills.
//! Four controllers are layered on top of each other, each owning the one
//! below:
//!
//! - **ChangerFsm**: coin acceptance and change payout, including payouts
//!   owed while the changer is disconnected
//! - **ValidatorFsm**: bill acceptance with an escrow decision point
//! - **CashFsm**: one money-collection transaction across both devices,
//!   with an accept timeout and fault latching during payout
//! - **Kiosk**: the sale workflow (select, pay, prepare, dispense) and the
//!   out-of-service policy
//!
//! Every controller is a [`core::Machine`] over a declarative
//! [`builder::TransitionTable`]. Transitions are pure lookups; device
//! commands happen in the owning controller after the state has changed, and
//! events raised by a device in reaction are handled once the current
//! transition is complete.
//!
//! # Core Concepts
//!
//! - **State**: every controller state implements [`State`]
//! - **Guards**: pure predicates over a small check context
//! - **History**: bounded record of state changes, kept per controller
//! - **Snapshot**: serializable view of a whole kiosk for consoles and fault
//!   reports
//!
//! # Example
//!
//! ```rust
//! use cashflow::config::KioskConfig;
//! use cashflow::device::{ChangerSignal, PrepareOutcome, ValidatorSignal};
//! use cashflow::fsm::{Collaborators, Kiosk, KioskEvent};
//! use cashflow::sim::{CallLog, SimChanger, SimPreparer, SimValidator};
//! use cashflow::timer::ManualTimers;
//!
//! let log = CallLog::new();
//! let config = KioskConfig::builder().product("espresso", 40).build();
//! let mut kiosk = Kiosk::new(
//!     config,
//!     Collaborators {
//!         changer: Box::new(SimChanger::new(log.clone())),
//!         validator: Box::new(SimValidator::new(log.clone())),
//!         preparer: Box::new(SimPreparer::new(log.clone())),
//!         timers: Box::new(ManualTimers::new()),
//!     },
//! )?;
//!
//! kiosk.start();
//! for signal in [ChangerSignal::Online, ChangerSignal::Initialized] {
//!     kiosk.on_changer(signal);
//! }
//! kiosk.on_validator(ValidatorSignal::Online);
//! kiosk.on_validator(ValidatorSignal::Initialized);
//!
//! kiosk.sell("espresso".into());
//! kiosk.on_validator(ValidatorSignal::CheckBill(50));
//! kiosk.on_validator(ValidatorSignal::BillIn(50));
//! kiosk.on_prepared(PrepareOutcome::Prepared);
//!
//! // 10 units of change are on their way.
//! let events = kiosk.on_changer(ChangerSignal::CoinOut(10));
//! assert!(events.contains(&KioskEvent::Dispensed(10)));
//! assert!(events.contains(&KioskEvent::Ready));
//! # Ok::<(), cashflow::config::ConfigError>(())
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod device;
pub mod fsm;
pub mod runtime;
pub mod sim;
pub mod snapshot;
pub mod timer;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigError, FaultPolicy, KioskConfig};
pub use core::{State, StateHistory, StateTransition};
pub use fsm::{Collaborators, Kiosk, KioskEvent, KioskState, ServiceStatus};
pub use snapshot::{KioskSnapshot, SnapshotError};
pub use types::{Amount, DeviceKind, Fault, ProductId};
