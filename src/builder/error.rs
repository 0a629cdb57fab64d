//! Errors raised while assembling transition tables.

use thiserror::Error;

/// Errors that can occur when validating a transition table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("No transitions defined. Add at least one row")]
    EmptyTable,

    #[error("Row {index} ({trigger} from {from}) can never fire: an earlier unguarded row matches first")]
    ShadowedTransition {
        index: usize,
        trigger: String,
        from: String,
    },
}
