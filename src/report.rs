use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Write as _;

use crate::calendar::MonthKey;
use crate::domain::{Allocation, Book, CashEntry, Investment, Loan, LoanSchedule, Recurrence};
use crate::ledger::{ProjectedMonth, project};

/// Flat per-month row handed to an assistant prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewRow {
    pub month: MonthKey,
    pub income: Decimal,
    pub expenses: Decimal,
    pub invested: Decimal,
    pub investment_value: Decimal,
    pub net_loans: Decimal,
    pub total: Decimal,
    pub total_worth: Decimal,
}

impl From<&ProjectedMonth> for OverviewRow {
    fn from(row: &ProjectedMonth) -> Self {
        Self {
            month: row.key,
            income: money(row.income),
            expenses: money(row.expenses),
            invested: money(row.invested),
            investment_value: money(row.investment_value),
            net_loans: money(row.net_loans),
            total: money(row.total),
            total_worth: money(row.total_worth),
        }
    }
}

/// Everything an assistant needs about the household, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantContext {
    pub today: NaiveDate,
    pub currency: String,
    pub starting_savings: Decimal,
    pub monthly_overview: Vec<OverviewRow>,
    pub income_entries: Vec<CashEntry>,
    pub expense_entries: Vec<CashEntry>,
    pub investment_entries: Vec<Investment>,
    pub portfolio_allocations: Vec<Allocation>,
    pub loans_given: Vec<Loan>,
    pub loans_taken: Vec<Loan>,
    pub realized_entries: Vec<String>,
}

pub fn money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

pub fn build_context(book: &Book, months: usize, today: NaiveDate, currency: &str) -> AssistantContext {
    let rows = project(book, months, today);
    AssistantContext {
        today,
        currency: currency.to_string(),
        starting_savings: money(book.starting_savings),
        monthly_overview: rows.iter().map(OverviewRow::from).collect(),
        income_entries: book.income.clone(),
        expense_entries: book.expenses.clone(),
        investment_entries: book.investments.clone(),
        portfolio_allocations: book.allocations.clone(),
        loans_given: book.loans_given.clone(),
        loans_taken: book.loans_taken.clone(),
        realized_entries: book.realized.iter().map(str::to_string).collect(),
    }
}

/// Markdown rendering of the same data, for pasting into a prompt.
pub fn to_markdown(ctx: &AssistantContext) -> String {
    let cur = ctx.currency.as_str();
    let mut out = String::new();

    let _ = writeln!(out, "# Financial overview (as of {})", ctx.today);
    let _ = writeln!(out);
    let _ = writeln!(out, "Starting savings: {}", amount(cur, ctx.starting_savings));
    let _ = writeln!(out);

    let _ = writeln!(out, "## Monthly projection");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "| Month | Income | Expenses | Invested | Investment value | Net loans | Cash | Total worth |"
    );
    let _ = writeln!(out, "|---|---|---|---|---|---|---|---|");
    for row in &ctx.monthly_overview {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            row.month,
            amount(cur, row.income),
            amount(cur, row.expenses),
            amount(cur, row.invested),
            amount(cur, row.investment_value),
            amount(cur, row.net_loans),
            amount(cur, row.total),
            amount(cur, row.total_worth),
        );
    }

    cash_section(&mut out, "Income", &ctx.income_entries, cur);
    cash_section(&mut out, "Expenses", &ctx.expense_entries, cur);

    if !ctx.investment_entries.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Investments");
        let _ = writeln!(out);
        for inv in &ctx.investment_entries {
            let _ = writeln!(
                out,
                "- {}: {} ({}, from {}, {}% a year)",
                label(&inv.description),
                amount(cur, inv.amount),
                inv.recurrence.map_or("untyped", Recurrence::as_str),
                inv.date,
                inv.annual_return.normalize()
            );
        }
    }

    if !ctx.portfolio_allocations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Portfolio");
        let _ = writeln!(out);
        for alloc in &ctx.portfolio_allocations {
            let _ = writeln!(
                out,
                "- {}: {} ({}% a year)",
                label(&alloc.description),
                amount(cur, alloc.amount),
                alloc.annual_return.normalize()
            );
        }
    }

    loan_section(&mut out, "Loans given", &ctx.loans_given, cur);
    loan_section(&mut out, "Loans taken", &ctx.loans_taken, cur);

    if !ctx.realized_entries.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Already settled this month: {}", ctx.realized_entries.join(", "));
    }

    out
}

fn amount(currency: &str, value: Decimal) -> String {
    format!("{currency}{:.2}", money(value))
}

fn label(description: &str) -> &str {
    if description.trim().is_empty() {
        "(no description)"
    } else {
        description
    }
}

fn cash_section(out: &mut String, title: &str, entries: &[CashEntry], cur: &str) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## {title}");
    let _ = writeln!(out);
    for e in entries {
        let _ = writeln!(
            out,
            "- {}: {} ({}, {})",
            label(&e.description),
            amount(cur, e.amount),
            e.recurrence.as_str(),
            e.date
        );
    }
}

fn loan_section(out: &mut String, title: &str, loans: &[Loan], cur: &str) {
    if loans.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## {title}");
    let _ = writeln!(out);
    for loan in loans {
        let terms = match &loan.schedule {
            LoanSchedule::Monthly {
                end_date,
                monthly_payout,
            } => format!("{} monthly until {end_date}", amount(cur, *monthly_payout)),
            LoanSchedule::Manual { payouts } => format!("{} manual payouts", payouts.len()),
            LoanSchedule::Unknown => "unknown terms".to_string(),
        };
        let _ = writeln!(
            out,
            "- {}: {} from {}, {terms}",
            label(&loan.person),
            amount(cur, loan.principal_amount),
            loan.start_date
        );
    }
}
