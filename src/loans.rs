use rust_decimal::Decimal;
use serde::Serialize;

use crate::calendar::MonthKey;
use crate::domain::{Loan, LoanSchedule};
use crate::recurrence::{MonthContext, saturating_sum};

/// Inclusive range of months in which a monthly-mode loan pays out.
///
/// Payments start the month after the loan starts, so the principal and the first
/// payout never land in the same month.
pub fn payout_window(start: MonthKey, end: MonthKey) -> Option<(MonthKey, MonthKey)> {
    let first = start.next()?;
    (first <= end).then_some((first, end))
}

/// Principal transferred by the loan in this month (before realized suppression).
pub fn principal_in(loan: &Loan, month: MonthKey) -> Decimal {
    match loan.schedule {
        LoanSchedule::Unknown => Decimal::ZERO,
        LoanSchedule::Monthly { .. } | LoanSchedule::Manual { .. } => {
            if MonthKey::of(loan.start_date) == month {
                loan.principal_amount
            } else {
                Decimal::ZERO
            }
        }
    }
}

/// Payouts scheduled by the loan in this month (before realized suppression).
pub fn payout_in(loan: &Loan, month: MonthKey) -> Decimal {
    match &loan.schedule {
        LoanSchedule::Monthly {
            end_date,
            monthly_payout,
        } => match payout_window(MonthKey::of(loan.start_date), MonthKey::of(*end_date)) {
            Some((first, last)) if month >= first && month <= last => *monthly_payout,
            _ => Decimal::ZERO,
        },
        LoanSchedule::Manual { payouts } => saturating_sum(
            payouts
                .iter()
                .filter(|p| MonthKey::of(p.date) == month)
                .map(|p| p.amount),
        ),
        LoanSchedule::Unknown => Decimal::ZERO,
    }
}

/// Sum of principals of every loan starting this month, minus the ones realized in the live month.
pub fn principal_movement(loans: &[Loan], ctx: &MonthContext<'_>) -> Decimal {
    saturating_sum(
        loans
            .iter()
            .filter(|loan| !ctx.suppresses(&loan.id))
            .map(|loan| principal_in(loan, ctx.key)),
    )
}

/// Sum of payouts falling in this month. A realized mark hides the whole loan for the month,
/// not individual manual payouts.
pub fn payout_movement(loans: &[Loan], ctx: &MonthContext<'_>) -> Decimal {
    saturating_sum(
        loans
            .iter()
            .filter(|loan| !ctx.suppresses(&loan.id))
            .map(|loan| payout_in(loan, ctx.key)),
    )
}

/// Loan cash movements for one month, split by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanFlows {
    /// Principal lent out (outflow).
    pub principals_given: Decimal,
    /// Principal borrowed (inflow).
    pub principals_taken: Decimal,
    /// Repayments received on loans given (inflow).
    pub payouts_received: Decimal,
    /// Repayments made on loans taken (outflow).
    pub payouts_paid: Decimal,
}

impl LoanFlows {
    pub fn for_month(given: &[Loan], taken: &[Loan], ctx: &MonthContext<'_>) -> Self {
        Self {
            principals_given: principal_movement(given, ctx),
            principals_taken: principal_movement(taken, ctx),
            payouts_received: payout_movement(given, ctx),
            payouts_paid: payout_movement(taken, ctx),
        }
    }

    pub fn net(&self) -> Decimal {
        self.principals_taken
            .saturating_sub(self.principals_given)
            .saturating_add(self.payouts_received)
            .saturating_sub(self.payouts_paid)
    }
}

/// Whether a loan shows up in a month's drill-down, and if so whether it is its principal month.
///
/// Monthly loans are listed from their start month through their end month; manual loans in
/// their start month and any month holding a payout.
pub fn listing_in(loan: &Loan, month: MonthKey) -> Option<bool> {
    let start = MonthKey::of(loan.start_date);
    let is_principal_month = start == month;
    let listed = match &loan.schedule {
        LoanSchedule::Monthly { end_date, .. } => month >= start && month <= MonthKey::of(*end_date),
        LoanSchedule::Manual { payouts } => {
            is_principal_month || payouts.iter().any(|p| MonthKey::of(p.date) == month)
        }
        LoanSchedule::Unknown => false,
    };
    listed.then_some(is_principal_month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::horizon;
    use crate::domain::{EntryId, Payout, RealizedSet};
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn month(raw: &str) -> MonthKey {
        MonthKey::from_str(raw).unwrap()
    }

    fn monthly_loan(id: &str) -> Loan {
        Loan {
            id: EntryId::from(id),
            person: "Ana".into(),
            start_date: date("2025-01-15"),
            principal_amount: Decimal::from(300),
            schedule: LoanSchedule::Monthly {
                end_date: date("2025-04-15"),
                monthly_payout: Decimal::from(100),
            },
        }
    }

    fn manual_loan(id: &str) -> Loan {
        Loan {
            id: EntryId::from(id),
            person: "Bo".into(),
            start_date: date("2025-01-02"),
            principal_amount: Decimal::from(500),
            schedule: LoanSchedule::Manual {
                payouts: vec![
                    Payout {
                        date: date("2025-02-03"),
                        amount: Decimal::from(50),
                    },
                    Payout {
                        date: date("2025-02-25"),
                        amount: Decimal::from(25),
                    },
                    Payout {
                        date: date("2025-05-01"),
                        amount: Decimal::from(10),
                    },
                ],
            },
        }
    }

    #[test]
    fn monthly_loan_moves_principal_then_pays_from_next_month_through_end() {
        let loan = monthly_loan("l1");
        let cases = [
            ("2024-12", 0, 0),
            ("2025-01", 300, 0),
            ("2025-02", 0, 100),
            ("2025-03", 0, 100),
            ("2025-04", 0, 100),
            ("2025-05", 0, 0),
        ];
        for (m, principal, payout) in cases {
            assert_eq!(principal_in(&loan, month(m)), Decimal::from(principal), "{m}");
            assert_eq!(payout_in(&loan, month(m)), Decimal::from(payout), "{m}");
        }
    }

    #[test]
    fn monthly_loan_ending_in_start_month_never_pays() {
        let mut loan = monthly_loan("l1");
        loan.schedule = LoanSchedule::Monthly {
            end_date: date("2025-01-31"),
            monthly_payout: Decimal::from(100),
        };
        assert_eq!(payout_in(&loan, month("2025-01")), Decimal::ZERO);
        assert_eq!(payout_in(&loan, month("2025-02")), Decimal::ZERO);
    }

    #[test]
    fn manual_loan_sums_payouts_in_month() {
        let loan = manual_loan("m1");
        assert_eq!(payout_in(&loan, month("2025-01")), Decimal::ZERO);
        assert_eq!(payout_in(&loan, month("2025-02")), Decimal::from(75));
        assert_eq!(payout_in(&loan, month("2025-05")), Decimal::from(10));
    }

    #[test]
    fn unknown_mode_contributes_nothing() {
        let mut loan = monthly_loan("u1");
        loan.schedule = LoanSchedule::Unknown;
        assert_eq!(principal_in(&loan, month("2025-01")), Decimal::ZERO);
        assert_eq!(payout_in(&loan, month("2025-02")), Decimal::ZERO);
        assert_eq!(listing_in(&loan, month("2025-01")), None);
    }

    #[test]
    fn realized_loan_is_suppressed_in_current_month_only() {
        let loan = manual_loan("m1");
        let mut realized = RealizedSet::default();
        realized.insert(&loan.id, month("2025-02"));
        realized.insert(&loan.id, month("2025-05"));

        let months = horizon(4, date("2025-02-10"));
        let current = MonthContext::new(&months[0], &realized);
        assert_eq!(payout_movement(std::slice::from_ref(&loan), &current), Decimal::ZERO);

        let may = MonthContext::new(&months[3], &realized);
        assert_eq!(may.key, month("2025-05"));
        assert_eq!(payout_movement(std::slice::from_ref(&loan), &may), Decimal::from(10));
    }

    #[test]
    fn net_flow_signs_follow_direction() {
        let given = vec![monthly_loan("g")];
        let taken = vec![manual_loan("t")];
        let realized = RealizedSet::default();

        let months = horizon(2, date("2025-01-20"));
        let jan = LoanFlows::for_month(&given, &taken, &MonthContext::new(&months[0], &realized));
        assert_eq!(jan.principals_given, Decimal::from(300));
        assert_eq!(jan.principals_taken, Decimal::from(500));
        assert_eq!(jan.net(), Decimal::from(200));

        let feb = LoanFlows::for_month(&given, &taken, &MonthContext::new(&months[1], &realized));
        assert_eq!(feb.payouts_received, Decimal::from(100));
        assert_eq!(feb.payouts_paid, Decimal::from(75));
        assert_eq!(feb.net(), Decimal::from(25));
    }

    #[test]
    fn listing_flags_principal_month() {
        let loan = monthly_loan("l1");
        assert_eq!(listing_in(&loan, month("2025-01")), Some(true));
        assert_eq!(listing_in(&loan, month("2025-04")), Some(false));
        assert_eq!(listing_in(&loan, month("2025-05")), None);

        let manual = manual_loan("m1");
        assert_eq!(listing_in(&manual, month("2025-01")), Some(true));
        assert_eq!(listing_in(&manual, month("2025-03")), None);
        assert_eq!(listing_in(&manual, month("2025-05")), Some(false));
    }
}
