use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::calendar::{HorizonMonth, MonthKey};
use crate::domain::{CashEntry, EntryId, Investment, RealizedSet, Recurrence};

/// A dated entry that is either one-time or recurs monthly from its start.
pub trait Scheduled {
    fn id(&self) -> &EntryId;
    fn start(&self) -> NaiveDate;
    /// `None` means the entry never contributes.
    fn recurrence(&self) -> Option<Recurrence>;
    fn amount(&self) -> Decimal;

    /// One-time entries are active only in their own month; monthly ones from then on, forever.
    fn is_active_in(&self, month: MonthKey) -> bool {
        self.recurrence()
            .is_some_and(|r| is_active(r, self.start(), month))
    }
}

impl Scheduled for CashEntry {
    fn id(&self) -> &EntryId {
        &self.id
    }
    fn start(&self) -> NaiveDate {
        self.date
    }
    fn recurrence(&self) -> Option<Recurrence> {
        Some(self.recurrence)
    }
    fn amount(&self) -> Decimal {
        self.amount
    }
}

impl Scheduled for Investment {
    fn id(&self) -> &EntryId {
        &self.id
    }
    fn start(&self) -> NaiveDate {
        self.date
    }
    fn recurrence(&self) -> Option<Recurrence> {
        self.recurrence
    }
    fn amount(&self) -> Decimal {
        self.amount
    }
}

pub fn is_active(recurrence: Recurrence, start: NaiveDate, month: MonthKey) -> bool {
    let start_month = MonthKey::of(start);
    match recurrence {
        Recurrence::OneTime => month == start_month,
        Recurrence::Monthly => month >= start_month,
    }
}

/// The month being evaluated, plus what is needed to apply realized suppression.
#[derive(Debug, Clone, Copy)]
pub struct MonthContext<'a> {
    pub key: MonthKey,
    pub is_current: bool,
    pub realized: &'a RealizedSet,
}

impl<'a> MonthContext<'a> {
    pub fn new(month: &HorizonMonth, realized: &'a RealizedSet) -> Self {
        Self {
            key: month.key,
            is_current: month.is_current,
            realized,
        }
    }

    /// Realized marks only ever hide cash flow in the live month. Past and future months
    /// ignore them, so a mark is effectively forgotten once its month rolls into the past.
    pub fn suppresses(&self, id: &EntryId) -> bool {
        self.is_current && self.realized.contains(id, self.key)
    }

    /// Whether the entry counts toward this month's cash flow.
    pub fn counts<T: Scheduled>(&self, entry: &T) -> bool {
        entry.is_active_in(self.key) && !self.suppresses(entry.id())
    }
}

/// Entries active in `month`, regardless of realized status.
pub fn active_in<T: Scheduled>(entries: &[T], month: MonthKey) -> impl Iterator<Item = &T> {
    entries.iter().filter(move |e| e.is_active_in(month))
}

/// Adds amounts, pinning at `Decimal::MAX`/`MIN` instead of overflowing.
pub fn saturating_sum(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Sum of the amounts counting toward this month's cash flow.
pub fn cash_flow_total<T: Scheduled>(entries: &[T], ctx: &MonthContext<'_>) -> Decimal {
    saturating_sum(entries.iter().filter(|e| ctx.counts(*e)).map(|e| e.amount()))
}
