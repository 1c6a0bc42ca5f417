//! Shared state of one analysis run.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::compiler::{AnalysisConfig, EventKind, EventLog};

/// Global limit on the number of substitutions.
///
/// Shared by every procedure of a run. Once it reaches zero no further
/// substitution happens anywhere.
#[derive(Debug)]
pub struct PropagationBudget {
    /// Units left; negative means unlimited.
    remaining: AtomicI64,
    exhausted: AtomicBool,
}

impl PropagationBudget {
    /// Creates a budget of `limit` substitutions, `None` for no limit.
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        let remaining = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        Self {
            remaining: AtomicI64::new(remaining),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Creates a budget without limit.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Takes one unit. Returns `false` if none is left.
    pub fn try_take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                n if n < 0 => Some(n),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }

    /// Returns the units left, `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<usize> {
        usize::try_from(self.remaining.load(Ordering::Acquire)).ok()
    }

    /// Marks the budget exhausted. Returns `true` only for the first caller.
    fn mark_exhausted(&self) -> bool {
        !self.exhausted.swap(true, Ordering::AcqRel)
    }
}

impl Default for PropagationBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Everything the passes share during one run.
///
/// `Sync`: procedures may be analysed on several threads, each recording
/// into the same [`EventLog`] and drawing from the same budget.
#[derive(Debug)]
pub struct AnalysisContext {
    /// Engine tunables.
    pub config: AnalysisConfig,
    /// Substitution budget derived from `config.max_propagations`.
    pub budget: PropagationBudget,
    /// Events recorded by the engine and the passes.
    pub events: EventLog,
}

impl AnalysisContext {
    /// Creates a context for `config` with a fresh budget and an empty log.
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        let budget = PropagationBudget::new(config.max_propagations);
        Self {
            config,
            budget,
            events: EventLog::new(),
        }
    }

    /// Takes one substitution from the budget.
    ///
    /// The first failure records a [`EventKind::BudgetExhausted`] event.
    pub fn take_propagation(&self) -> bool {
        if self.budget.try_take() {
            return true;
        }
        if self.budget.mark_exhausted() {
            self.events
                .record(EventKind::BudgetExhausted)
                .message("substitution budget exhausted, propagation disabled");
        }
        false
    }
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
