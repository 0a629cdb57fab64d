//! Table construction helpers.
//!
//! Controllers declare their behaviour as ordered [`TransitionTable`]s of
//! [`Transition`](crate::core::Transition) rows and their states with the
//! [`state_enum!`](crate::state_enum) macro.

pub mod error;
pub mod macros;
pub mod table;

pub use error::BuildError;
pub use table::TransitionTable;
