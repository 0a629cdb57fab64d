//! State transition history tracking.
//!
//! Controllers run for the lifetime of the kiosk, so history is bounded:
//! once the capacity is reached the oldest transition is evicted.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of transitions kept per controller.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// Record of a single state change.
///
/// # Example
///
/// ```rust
/// use cashflow::core::StateTransition;
/// use cashflow::fsm::ChangerState;
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: ChangerState::Ready,
///     to: ChangerState::Dispensing,
///     trigger: "StartDispense".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.to, ChangerState::Dispensing);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being left
    pub from: S,
    /// The state being entered
    pub to: S,
    /// Name of the trigger that caused the change
    pub trigger: String,
    /// When the change happened
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded history of state changes.
///
/// # Example
///
/// ```rust
/// use cashflow::core::{StateHistory, StateTransition};
/// use cashflow::fsm::ChangerState;
/// use chrono::Utc;
///
/// let mut history = StateHistory::with_capacity(2);
/// for (from, to) in [
///     (ChangerState::Offline, ChangerState::Online),
///     (ChangerState::Online, ChangerState::Ready),
///     (ChangerState::Ready, ChangerState::WaitCoin),
/// ] {
///     history.record(StateTransition {
///         from,
///         to,
///         trigger: "test".into(),
///         timestamp: Utc::now(),
///     });
/// }
///
/// // The first change was evicted.
/// assert_eq!(history.path(), vec![ChangerState::Online, ChangerState::Ready, ChangerState::WaitCoin]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    capacity: usize,
    transitions: VecDeque<StateTransition<S>>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl<S: State> StateHistory<S> {
    /// Create an empty history holding at most `capacity` transitions.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            transitions: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a transition, evicting the oldest one when full.
    pub fn record(&mut self, transition: StateTransition<S>) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// States traversed: the `from` of the oldest kept transition, then the
    /// `to` of each transition.
    pub fn path(&self) -> Vec<S> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.front() {
            path.push(first.from);
        }
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }

    /// Time between the oldest and newest kept transitions.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.front()?, self.transitions.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Most recent transition, if any.
    pub fn last(&self) -> Option<&StateTransition<S>> {
        self.transitions.back()
    }

    /// Iterate transitions oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition<S>> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::CashState;

    fn change(from: CashState, to: CashState) -> StateTransition<CashState> {
        StateTransition {
            from,
            to,
            trigger: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<CashState> = StateHistory::default();
        assert!(history.is_empty());
        assert!(history.path().is_empty());
        assert!(history.duration().is_none());
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn path_follows_recorded_changes() {
        let mut history = StateHistory::default();
        history.record(change(CashState::Init, CashState::WaitReady));
        history.record(change(CashState::WaitReady, CashState::Ready));
        history.record(change(CashState::Ready, CashState::AcceptAmount));

        assert_eq!(
            history.path(),
            vec![
                CashState::Init,
                CashState::WaitReady,
                CashState::Ready,
                CashState::AcceptAmount
            ]
        );
        assert_eq!(history.last().map(|t| t.to), Some(CashState::AcceptAmount));
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let mut history = StateHistory::with_capacity(2);
        history.record(change(CashState::Init, CashState::WaitReady));
        history.record(change(CashState::WaitReady, CashState::Ready));
        history.record(change(CashState::Ready, CashState::AcceptAmount));

        assert_eq!(history.len(), 2);
        assert_eq!(history.path()[0], CashState::WaitReady);
    }

    #[test]
    fn zero_capacity_keeps_one_entry() {
        let mut history = StateHistory::with_capacity(0);
        history.record(change(CashState::Init, CashState::WaitReady));
        history.record(change(CashState::WaitReady, CashState::Ready));

        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 1);
    }

    #[test]
    fn duration_spans_oldest_to_newest() {
        let start = Utc::now();
        let mut history = StateHistory::default();
        history.record(StateTransition {
            from: CashState::Init,
            to: CashState::WaitReady,
            trigger: "start".into(),
            timestamp: start,
        });
        history.record(StateTransition {
            from: CashState::WaitReady,
            to: CashState::Ready,
            trigger: "ready".into(),
            timestamp: start + chrono::Duration::milliseconds(250),
        });

        assert_eq!(history.duration(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn history_serializes_correctly() {
        let mut history = StateHistory::with_capacity(8);
        history.record(change(CashState::Init, CashState::WaitReady));

        let json = serde_json::to_string(&history).unwrap();
        let back: StateHistory<CashState> = serde_json::from_str(&json).unwrap();

        assert_eq!(back.len(), 1);
        assert_eq!(back.capacity(), 8);
    }
}
