//! Guard predicates for controlling transitions.
//!
//! Guards are pure boolean functions over a controller's check context.
//! They decide which row of a transition table applies without touching
//! devices or mutating the controller.

/// Pure predicate that determines if a transition can execute.
///
/// The context `C` is a small value each controller assembles from its own
/// fields before resolving a trigger, so guards never reach into hidden
/// instance state.
///
/// # Example
///
/// ```rust
/// use cashflow::core::Guard;
///
/// struct Check {
///     need: u64,
///     accepted: u64,
/// }
///
/// let enough = Guard::new(|c: &Check| c.accepted >= c.need);
///
/// assert!(enough.check(&Check { need: 10, accepted: 10 }));
/// assert!(!enough.check(&Check { need: 10, accepted: 4 }));
/// ```
pub struct Guard<C> {
    predicate: Box<dyn Fn(&C) -> bool + Send + Sync>,
}

impl<C: 'static> Guard<C> {
    /// Create a guard from a pure predicate function.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Box::new(predicate),
        }
    }

    /// Check if the guard allows the transition for this context.
    pub fn check(&self, ctx: &C) -> bool {
        (self.predicate)(ctx)
    }
}

impl<C> std::fmt::Debug for Guard<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Guard(..)")
    }
}
