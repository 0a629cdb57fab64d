//! Transition rows: trigger, source, target, guard and action.

use crate::core::{Guard, State};

/// One row of a transition table.
///
/// A row applies when the machine is in `from`, the incoming trigger equals
/// `trigger` and the guard (if any) passes. The action is a plain value the
/// owning controller interprets after the state has changed.
#[derive(Debug)]
pub struct Transition<S, T, C, A> {
    pub trigger: T,
    pub from: S,
    pub to: S,
    pub guard: Option<Guard<C>>,
    pub action: A,
}

impl<S: State, T: PartialEq, C: 'static, A> Transition<S, T, C, A> {
    /// Row moving from `from` to `to` on `trigger`.
    pub fn new(trigger: T, from: S, to: S, action: A) -> Self {
        Self {
            trigger,
            from,
            to,
            guard: None,
            action,
        }
    }

    /// Row that keeps the machine in `state`.
    pub fn stay(trigger: T, state: S, action: A) -> Self {
        Self::new(trigger, state, state, action)
    }

    /// Require `predicate` in addition to any guard already present.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(match self.guard.take() {
            Some(previous) => Guard::new(move |ctx: &C| previous.check(ctx) && predicate(ctx)),
            None => Guard::new(predicate),
        });
        self
    }

    /// Require that `predicate` fails.
    pub fn unless<F>(self, predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.when(move |ctx: &C| !predicate(ctx))
    }

    /// Check if this row applies to the current state and trigger (pure).
    pub fn can_execute(&self, current: &S, trigger: &T, ctx: &C) -> bool {
        if *current != self.from || *trigger != self.trigger {
            return false;
        }
        self.guard.as_ref().is_none_or(|g| g.check(ctx))
    }
}
