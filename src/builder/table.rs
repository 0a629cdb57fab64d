//! Ordered transition tables.

use crate::builder::BuildError;
use crate::core::{State, Transition};
use std::fmt::Debug;

/// Ordered list of transition rows.
///
/// Rows are resolved first-match: for a given state and trigger the first row
/// whose guard passes wins. Guarded rows therefore go before their unguarded
/// fallback.
///
/// # Example
///
/// ```rust
/// use cashflow::builder::TransitionTable;
/// use cashflow::core::Transition;
/// use cashflow::fsm::ValidatorState;
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// enum Trigger {
///     Permit,
///     Ban,
/// }
///
/// let table: TransitionTable<ValidatorState, Trigger, (), &str> = TransitionTable::new()
///     .with(Transition::new(Trigger::Permit, ValidatorState::BillConfirm, ValidatorState::Ready, "stack"))
///     .with(Transition::new(Trigger::Ban, ValidatorState::BillConfirm, ValidatorState::Ready, "return"));
///
/// let row = table.resolve(&ValidatorState::BillConfirm, &Trigger::Ban, &()).unwrap();
/// assert_eq!(row.action, "return");
/// assert!(table.validate().is_ok());
/// ```
#[derive(Debug)]
pub struct TransitionTable<S, T, C, A> {
    rows: Vec<Transition<S, T, C, A>>,
}

impl<S, T, C, A> Default for TransitionTable<S, T, C, A> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<S, T, C, A> TransitionTable<S, T, C, A>
where
    S: State,
    T: Copy + PartialEq + Debug,
    C: 'static,
    A: Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn with(mut self, row: Transition<S, T, C, A>) -> Self {
        self.rows.push(row);
        self
    }

    /// Append one unguarded row per source state, all targeting `to`.
    pub fn with_each(mut self, trigger: T, from: &[S], to: S, action: A) -> Self {
        self.rows
            .extend(from.iter().map(|&state| Transition::new(trigger, state, to, action)));
        self
    }

    /// Append one unguarded self-loop per state.
    pub fn with_each_stay(mut self, trigger: T, states: &[S], action: A) -> Self {
        self.rows
            .extend(states.iter().map(|&state| Transition::stay(trigger, state, action)));
        self
    }

    /// First row applicable to `current` and `trigger` (pure).
    pub fn resolve(&self, current: &S, trigger: &T, ctx: &C) -> Option<&Transition<S, T, C, A>> {
        self.rows
            .iter()
            .find(|row| row.can_execute(current, trigger, ctx))
    }

    /// Reject tables with unreachable rows.
    ///
    /// A row is unreachable when an earlier unguarded row has the same
    /// trigger and source state.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.rows.is_empty() {
            return Err(BuildError::EmptyTable);
        }
        for (index, row) in self.rows.iter().enumerate() {
            let shadowed = self.rows[..index].iter().any(|earlier| {
                earlier.guard.is_none()
                    && earlier.from == row.from
                    && earlier.trigger == row.trigger
            });
            if shadowed {
                return Err(BuildError::ShadowedTransition {
                    index,
                    trigger: format!("{:?}", row.trigger),
                    from: row.from.name().to_string(),
                });
            }
        }
        Ok(())
    }
}
