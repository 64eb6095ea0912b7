//! Overridable commit gates: resource and budget enforcement.
//!
//! The core kernel enforces signature, revocation, and action scope
//! itself. Resource and budget checks belong to the wrapping layer, so
//! they are expressed as [`CommitGate`] hooks the embedder configures —
//! or replaces — on the kernel. Hook violations reject the proposal under
//! the `SCOPE_VIOLATION` tag, exactly like a scope failure.

use std::collections::HashMap;
use std::sync::Mutex;

use taugate_core::mandate::Mandate;
use tracing::debug;

use crate::executor::ToolAction;

/// A gate hook's veto: the reason the action must not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateViolation {
    /// Why the gate refused the action.
    pub reason: String,
}

impl GateViolation {
    /// Creates a violation from a reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An overridable commit gate, run after the built-in gates pass.
///
/// `check` runs before execution is authorized; `on_committed` runs once
/// after a successful commit, under the kernel's operation lock, so a
/// gate's check-and-update pair is atomic with respect to other commits.
pub trait CommitGate: Send + Sync {
    /// Short name used in rejection details and logs.
    fn name(&self) -> &'static str;

    /// Decides whether the action may execute under the mandate.
    ///
    /// # Errors
    ///
    /// Returns a [`GateViolation`] to veto the action; the kernel rejects
    /// the proposal with the `SCOPE_VIOLATION` tag.
    fn check(&self, mandate: &Mandate, action: &ToolAction) -> Result<(), GateViolation>;

    /// Invoked after a successful commit of a checked action.
    fn on_committed(&self, _mandate: &Mandate, _action: &ToolAction) {}
}

/// Gate that matches the action's declared resource against the
/// mandate's resource patterns.
///
/// Actions that declare no resource pass; there is nothing to check.
#[derive(Debug, Default)]
pub struct ResourceGate;

impl CommitGate for ResourceGate {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn check(&self, mandate: &Mandate, action: &ToolAction) -> Result<(), GateViolation> {
        match &action.resource {
            Some(resource) if !mandate.is_resource_allowed(resource) => Err(GateViolation::new(
                format!("resource '{resource}' is not in mandate scope"),
            )),
            _ => Ok(()),
        }
    }
}

/// Per-mandate spending book.
///
/// Tracks how much of each mandate's `max_value` has been spent.
/// Counters only move in [`BudgetBook::charge`], which the budget gate
/// calls after a successful commit — a rejected or failed commit never
/// consumes budget.
#[derive(Debug, Default)]
pub struct BudgetBook {
    spent: Mutex<HashMap<String, u64>>,
}

impl BudgetBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the amount spent against a mandate so far.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // poisoning is unrecoverable
    pub fn spent(&self, mandate_id: &str) -> u64 {
        *self.spent.lock().unwrap().get(mandate_id).unwrap_or(&0)
    }

    /// Checks whether an additional cost fits under the mandate's
    /// ceiling, given what has already been spent.
    ///
    /// # Errors
    ///
    /// Returns a [`GateViolation`] naming the ceiling, the spent total,
    /// and the requested cost.
    pub fn check(&self, mandate: &Mandate, cost: u64) -> Result<(), GateViolation> {
        let Some(max_value) = mandate.scope.max_value else {
            return Ok(());
        };
        let spent = self.spent(&mandate.mandate_id);
        let within = spent
            .checked_add(cost)
            .map_or(false, |total| total <= max_value);
        if within {
            Ok(())
        } else {
            Err(GateViolation::new(format!(
                "budget exceeded: {spent} spent + {cost} requested > {max_value} ceiling"
            )))
        }
    }

    /// Records spending against a mandate.
    #[allow(clippy::missing_panics_doc)] // poisoning is unrecoverable
    pub fn charge(&self, mandate_id: &str, cost: u64) {
        let mut spent = self.spent.lock().unwrap();
        let entry = spent.entry(mandate_id.to_string()).or_insert(0);
        *entry = entry.saturating_add(cost);
        debug!(mandate_id, cost, total = *entry, "charged budget");
    }
}

/// Gate enforcing per-mandate spending ceilings via a [`BudgetBook`].
///
/// Uses the action's `estimated_cost` (zero when absent). The spent
/// counter moves only after a successful commit.
#[derive(Debug, Default)]
pub struct BudgetGate {
    book: BudgetBook,
}

impl BudgetGate {
    /// Creates a gate with an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the amount spent against a mandate so far.
    #[must_use]
    pub fn spent(&self, mandate_id: &str) -> u64 {
        self.book.spent(mandate_id)
    }
}

impl CommitGate for BudgetGate {
    fn name(&self) -> &'static str {
        "budget"
    }

    fn check(&self, mandate: &Mandate, action: &ToolAction) -> Result<(), GateViolation> {
        self.book.check(mandate, action.estimated_cost.unwrap_or(0))
    }

    fn on_committed(&self, mandate: &Mandate, action: &ToolAction) {
        self.book
            .charge(&mandate.mandate_id, action.estimated_cost.unwrap_or(0));
    }
}
