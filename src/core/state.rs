//! Core State trait for machine states.
//!
//! Every controller state enum implements this trait, which provides
//! pure methods for inspecting state properties without side effects.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for controller states.
///
/// All methods are pure. States are small `Copy` values that describe the
/// current position of a controller.
///
/// # Required Traits
///
/// - `Copy` + `PartialEq`: states are compared on every trigger
/// - `Debug`: states appear in logs
/// - `Serialize` + `Deserialize`: states are part of history and snapshots
///
/// # Example
///
/// ```rust
/// use cashflow::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
/// enum DoorState {
///     Closed,
///     Open,
///     Jammed,
/// }
///
/// impl State for DoorState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Closed => "Closed",
///             Self::Open => "Open",
///             Self::Jammed => "Jammed",
///         }
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Jammed)
///     }
/// }
///
/// assert!(DoorState::Jammed.is_error());
/// ```
pub trait State:
    Copy + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is an error state.
    ///
    /// Error states are entered on device faults. They are left through
    /// recovery triggers, never by ordinary operation.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }
}
