//! Table-driven machine: current state, transition table and history.

use crate::builder::TransitionTable;
use crate::core::{State, StateHistory, StateTransition};
use chrono::Utc;
use std::fmt::Debug;
use tracing::{debug, trace};

/// Generic machine used by every controller.
///
/// `fire` resolves a trigger against the table, moves to the target state
/// and hands back the row's action. Triggers with no applicable row are
/// ignored: duplicated or late hardware signals must never corrupt state.
pub struct Machine<S: State, T, C, A> {
    name: &'static str,
    current: S,
    table: TransitionTable<S, T, C, A>,
    history: StateHistory<S>,
}

impl<S, T, C, A> Machine<S, T, C, A>
where
    S: State,
    T: Copy + PartialEq + Debug,
    C: 'static,
    A: Copy,
{
    pub fn new(
        name: &'static str,
        initial: S,
        table: TransitionTable<S, T, C, A>,
        history_capacity: usize,
    ) -> Self {
        Self {
            name,
            current: initial,
            table,
            history: StateHistory::with_capacity(history_capacity),
        }
    }

    /// Current state (pure)
    pub fn current(&self) -> S {
        self.current
    }

    /// Recorded state changes (pure)
    pub fn history(&self) -> &StateHistory<S> {
        &self.history
    }

    /// Resolve `trigger` and apply the first matching row.
    ///
    /// Returns the row's action, or `None` when the trigger is not valid in
    /// the current state.
    pub fn fire(&mut self, trigger: T, ctx: &C) -> Option<A> {
        let from = self.current;
        let (to, action) = match self.table.resolve(&from, &trigger, ctx) {
            Some(row) => (row.to, row.action),
            None => {
                trace!(machine = self.name, state = from.name(), ?trigger, "trigger ignored");
                return None;
            }
        };

        debug!(
            machine = self.name,
            from = from.name(),
            to = to.name(),
            ?trigger,
            "transition"
        );
        if to != from {
            self.history.record(StateTransition {
                from,
                to,
                trigger: format!("{trigger:?}"),
                timestamp: Utc::now(),
            });
        }
        self.current = to;
        Some(action)
    }
}
