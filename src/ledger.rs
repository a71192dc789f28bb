use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::calendar::{HorizonMonth, MonthKey, horizon};
use crate::domain::{Book, CashEntry, Investment, Loan};
use crate::loans::{LoanFlows, listing_in};
use crate::recurrence::{MonthContext, active_in, cash_flow_total};
use crate::valuation::ValuationTracker;

/// One row of the projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedMonth {
    pub key: MonthKey,
    pub date: NaiveDate,
    pub label: String,
    pub is_current_month: bool,
    pub income: Decimal,
    pub expenses: Decimal,
    pub invested: Decimal,
    pub investment_value: Decimal,
    pub loan_principals_given: Decimal,
    pub loan_principals_taken: Decimal,
    pub loans_received: Decimal,
    pub loans_paid: Decimal,
    pub net_loans: Decimal,
    /// Ending cash balance.
    pub total: Decimal,
    /// Change in cash against the previous month (or the starting savings).
    pub difference: Decimal,
    /// Cash plus combined investment value.
    pub total_worth: Decimal,
}

/// Projects `count` months starting at `today`'s month.
pub fn project(book: &Book, count: usize, today: NaiveDate) -> Vec<ProjectedMonth> {
    project_over(book, &horizon(count, today))
}

/// Folds the book over the given months, left to right.
///
/// The running cash total and the valuation state are the only things carried from one
/// month to the next. The book itself is never modified.
pub fn project_over(book: &Book, months: &[HorizonMonth]) -> Vec<ProjectedMonth> {
    let span = tracing::debug_span!(
        "project",
        months = months.len(),
        entries = book.entry_count(),
        realized = book.realized.len()
    );
    let _enter = span.enter();

    let mut valuations = ValuationTracker::seeded(&book.allocations);
    let mut previous_total = book.starting_savings;
    let mut rows = Vec::with_capacity(months.len());

    for (index, month) in months.iter().enumerate() {
        let ctx = MonthContext::new(month, &book.realized);

        let income = cash_flow_total(&book.income, &ctx);
        let expenses = cash_flow_total(&book.expenses, &ctx);
        let invested = valuations.advance_investments(&book.investments, &ctx);
        valuations.advance_allocations(&book.allocations, index);
        let investment_value = valuations.combined_value();

        let loans = LoanFlows::for_month(&book.loans_given, &book.loans_taken, &ctx);
        let net_loans = loans.net();

        let total = previous_total
            .saturating_add(income)
            .saturating_sub(expenses)
            .saturating_sub(invested)
            .saturating_add(net_loans);
        let difference = total.saturating_sub(previous_total);
        let total_worth = total.saturating_add(investment_value);

        tracing::trace!(
            month = %month.key,
            %income,
            %expenses,
            %invested,
            %net_loans,
            %total,
            "projected month"
        );

        rows.push(ProjectedMonth {
            key: month.key,
            date: month.date,
            label: month.label.clone(),
            is_current_month: month.is_current,
            income,
            expenses,
            invested,
            investment_value,
            loan_principals_given: loans.principals_given,
            loan_principals_taken: loans.principals_taken,
            loans_received: loans.payouts_received,
            loans_paid: loans.payouts_paid,
            net_loans,
            total,
            difference,
            total_worth,
        });

        previous_total = total;
    }

    rows
}

/// A loan as listed in a month's drill-down.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedLoan {
    #[serde(flatten)]
    pub loan: Loan,
    pub is_principal_month: bool,
}

/// Raw entries touching a month, independent of realized status and of the cash fold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthDetails {
    pub incomes: Vec<CashEntry>,
    pub expenses: Vec<CashEntry>,
    pub investments: Vec<Investment>,
    pub loans_given: Vec<ListedLoan>,
    pub loans_taken: Vec<ListedLoan>,
}

impl MonthDetails {
    pub fn is_empty(&self) -> bool {
        self.incomes.is_empty()
            && self.expenses.is_empty()
            && self.investments.is_empty()
            && self.loans_given.is_empty()
            && self.loans_taken.is_empty()
    }
}

pub fn month_details(book: &Book, month: MonthKey) -> MonthDetails {
    let listed = |loans: &[Loan]| -> Vec<ListedLoan> {
        loans
            .iter()
            .filter_map(|loan| {
                listing_in(loan, month).map(|is_principal_month| ListedLoan {
                    loan: loan.clone(),
                    is_principal_month,
                })
            })
            .collect()
    };

    MonthDetails {
        incomes: active_in(&book.income, month).cloned().collect(),
        expenses: active_in(&book.expenses, month).cloned().collect(),
        investments: active_in(&book.investments, month).cloned().collect(),
        loans_given: listed(&book.loans_given),
        loans_taken: listed(&book.loans_taken),
    }
}
