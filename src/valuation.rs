use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

use crate::calendar::MonthKey;
use crate::domain::{Allocation, EntryId, Investment};
use crate::recurrence::{MonthContext, Scheduled, saturating_sum};

/// Monthly growth factor derived from an annual percentage: `rate / 100 / 12`.
///
/// This is a simple monthly approximation, not a geometric de-annualization.
pub fn monthly_rate(annual_percent: Decimal) -> Decimal {
    annual_percent / Decimal::ONE_HUNDRED / Decimal::from(12)
}

/// One month of growth, or `None` once the value no longer fits a `Decimal`.
fn grow(value: Decimal, annual_percent: Decimal) -> Option<Decimal> {
    Decimal::ONE
        .checked_add(monthly_rate(annual_percent))?
        .checked_mul(value)
}

/// Running value of every investment and portfolio allocation, carried across the month fold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValuationTracker {
    investments: BTreeMap<EntryId, Decimal>,
    allocations: BTreeMap<EntryId, Decimal>,
    overflowed: BTreeSet<EntryId>,
}

impl ValuationTracker {
    /// Allocations start at their seed amount; investments start empty.
    pub fn seeded(allocations: &[Allocation]) -> Self {
        let allocations = allocations
            .iter()
            .map(|a| (a.id.clone(), a.amount))
            .collect();
        Self {
            allocations,
            ..Self::default()
        }
    }

    /// Values that stop fitting are held at their last amount. Logged once per entry.
    fn hold(&mut self, id: &EntryId) {
        if self.overflowed.insert(id.clone()) {
            tracing::warn!(id = %id, "value exceeds the representable range; holding it");
        }
    }

    /// Grows and funds every investment for one month.
    ///
    /// Returns the cash that left the account for contributions. Realized contributions are
    /// still added to the instrument's value; only their cash flow is hidden.
    pub fn advance_investments(
        &mut self,
        investments: &[Investment],
        ctx: &MonthContext<'_>,
    ) -> Decimal {
        let mut invested = Decimal::ZERO;
        for inv in investments {
            let value = *self.investments.entry(inv.id.clone()).or_insert(Decimal::ZERO);
            if ctx.key < MonthKey::of(inv.date) {
                continue;
            }

            let mut next = grow(value, inv.annual_return);
            if inv.is_active_in(ctx.key) {
                next = next.and_then(|v| v.checked_add(inv.amount));
                if !ctx.suppresses(&inv.id) {
                    invested = invested.saturating_add(inv.amount);
                }
            }
            match next {
                Some(next) => {
                    self.investments.insert(inv.id.clone(), next);
                }
                None => self.hold(&inv.id),
            }
        }
        invested
    }

    /// Grows every allocation for one month. The first projected month holds the seed as-is.
    pub fn advance_allocations(&mut self, allocations: &[Allocation], month_index: usize) {
        if month_index == 0 {
            return;
        }
        for alloc in allocations {
            let Some(value) = self.allocations.get(&alloc.id).copied() else {
                continue;
            };
            match grow(value, alloc.annual_return) {
                Some(next) => {
                    self.allocations.insert(alloc.id.clone(), next);
                }
                None => self.hold(&alloc.id),
            }
        }
    }

    #[cfg(test)]
    pub fn investment_value(&self, id: &EntryId) -> Option<Decimal> {
        self.investments.get(id).copied()
    }

    #[cfg(test)]
    pub fn allocation_value(&self, id: &EntryId) -> Option<Decimal> {
        self.allocations.get(id).copied()
    }

    /// Sum of every tracked investment and allocation.
    pub fn combined_value(&self) -> Decimal {
        saturating_sum(
            self.investments
                .values()
                .chain(self.allocations.values())
                .copied(),
        )
    }
}
