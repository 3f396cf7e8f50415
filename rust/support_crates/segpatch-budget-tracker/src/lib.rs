//! Memory budget accounting.
//!
//! A [`Budget`] is a tree node holding a remaining amount. Allocations taken
//! from a subordinate budget are charged against every ancestor as well, and
//! are returned when the [`Allocation`] is dropped.

use std::sync::Arc;

use counter::Counter;

pub mod counter;

/// Represents a budget that can be allocated from.
#[derive(Clone)]
pub struct Budget(Arc<BudgetNode>);

impl Budget {
    /// Creates a new root budget with the given amount.
    pub fn new(amount: u64) -> Budget {
        Budget(Arc::new(BudgetNode {
            parent: None,
            remaining: Counter::new(amount),
        }))
    }

    /// Creates a root budget that never refuses an allocation.
    pub fn unlimited() -> Budget {
        Budget::new(u64::MAX)
    }

    /// Returns the remaining amount in this budget tracker.
    ///
    /// **Note**: This method is primarily intended for diagnostic purposes. The returned
    /// value may be outdated in a concurrent environment.
    pub fn remaining(&self) -> u64 {
        self.0.remaining.read()
    }

    /// Attempts to allocate the specified amount from the budget.
    ///
    /// The allocated amount is automatically returned to the `Budget` when the
    /// `Allocation` is dropped.
    pub fn allocate(&self, amount: u64) -> Result<Allocation, AllocationError> {
        if self.0.allocate(amount) {
            Ok(Allocation {
                budget: self.0.clone(),
                amount,
            })
        } else {
            Err(AllocationError)
        }
    }

    /// Amount that can still be allocated here, taking every ancestor's
    /// remaining amount into account. Diagnostic, like [`remaining`](Self::remaining).
    pub fn available(&self) -> u64 {
        self.0.available()
    }

    /// Creates a subordinate budget limited to `amount`, whose allocations are
    /// also charged against this budget.
    pub fn subordinate(&self, amount: u64) -> Budget {
        Budget(Arc::new(BudgetNode {
            parent: Some(self.0.clone()),
            remaining: Counter::new(amount),
        }))
    }
}

impl std::fmt::Debug for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Budget")
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}

/// Represents an allocation from a budget.
///
/// When the allocation is dropped, the allocated amount is returned to the
/// budget tracker it was taken from.
pub struct Allocation {
    budget: Arc<BudgetNode>,
    amount: u64,
}

impl Allocation {
    /// Currently allocated amount.
    pub fn amount(&self) -> u64 {
        self.amount
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if self.amount != 0 {
            self.budget.release(self.amount);
        }
    }
}

impl std::fmt::Debug for Allocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocation")
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// An error that occurs when a budget allocation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationError;

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Budget allocation error")
    }
}

impl std::error::Error for AllocationError {}

/// A node in the budget tree.
struct BudgetNode {
    /// All allocations from the current node must also succeed on the parent.
    parent: Option<Arc<BudgetNode>>,
    remaining: Counter,
}

impl BudgetNode {
    fn allocate(&self, amount: u64) -> bool {
        if amount == 0 {
            return true;
        }
        if !self.remaining.withdraw(amount) {
            return false;
        }
        if let Some(parent) = self.parent.as_deref() {
            if !parent.allocate(amount) {
                self.remaining.deposit(amount);
                return false;
            }
        }
        true
    }

    fn available(&self) -> u64 {
        let own = self.remaining.read();
        self.parent
            .as_deref()
            .map_or(own, |parent| own.min(parent.available()))
    }

    fn release(&self, amount: u64) {
        if let Some(parent) = self.parent.as_deref() {
            parent.release(amount);
        }
        self.remaining.deposit(amount);
    }
}
