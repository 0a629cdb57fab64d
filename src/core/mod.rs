//! Core state machine types and logic.
//!
//! This module contains the pure core shared by every controller:
//! - State definitions via the `State` trait
//! - Guard predicates over a controller's check context
//! - Transition rows and the table-driven `Machine`
//! - Bounded history tracking
//!
//! Side effects (device commands, published events) live in the
//! controllers under `fsm`; nothing here talks to hardware.

mod guard;
mod history;
mod machine;
mod state;
mod transition;

pub use guard::Guard;
pub use history::{StateHistory, StateTransition, DEFAULT_HISTORY_CAPACITY};
pub use machine::Machine;
pub use state::State;
pub use transition::Transition;
