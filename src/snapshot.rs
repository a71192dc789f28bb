use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Allocation, Book, CashEntry, EntryId, Investment, Loan, RealizedSet, coerce_decimal,
};
use crate::errors::SnapshotError;

pub const SNAPSHOT_VERSION: &str = "1.2";

/// Description given to the allocation synthesized from the legacy initial investment value.
pub const INITIAL_INVESTMENT_LABEL: &str = "Initial Investment";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDocument<'a> {
    income_entries: &'a [CashEntry],
    expense_entries: &'a [CashEntry],
    loans_given: &'a [Loan],
    loans_taken: &'a [Loan],
    investment_entries: &'a [Investment],
    realized_entries: &'a RealizedSet,
    starting_savings: Decimal,
    portfolio_allocations: &'a [Allocation],
    export_date: String,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    income_entries: Option<Vec<CashEntry>>,
    expense_entries: Option<Vec<CashEntry>>,
    loans_given: Option<Vec<Loan>>,
    loans_taken: Option<Vec<Loan>>,
    #[serde(default)]
    investment_entries: Option<Vec<Investment>>,
    #[serde(default)]
    realized_entries: Option<Vec<String>>,
    #[serde(default)]
    starting_savings: serde_json::Value,
    #[serde(default)]
    portfolio_allocations: Option<Vec<Allocation>>,
    #[serde(default)]
    initial_investment_value: serde_json::Value,
    #[serde(default)]
    version: Option<String>,
}

/// Renders the book as a pretty-printed snapshot document.
pub fn to_json(book: &Book, exported_at: DateTime<Utc>) -> Result<String, SnapshotError> {
    let doc = SnapshotDocument {
        income_entries: &book.income,
        expense_entries: &book.expenses,
        loans_given: &book.loans_given,
        loans_taken: &book.loans_taken,
        investment_entries: &book.investments,
        realized_entries: &book.realized,
        starting_savings: book.starting_savings,
        portfolio_allocations: &book.allocations,
        export_date: exported_at.to_rfc3339(),
        version: SNAPSHOT_VERSION,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parses a snapshot document into a book.
///
/// The four core collections are required. A legacy `initialInvestmentValue` is folded into the
/// allocations and does not survive in the returned book.
pub fn parse_document(raw: &str) -> Result<Book, SnapshotError> {
    let doc: RawDocument = serde_json::from_str(raw)?;

    if let Some(version) = doc.version.as_deref() {
        check_version(version)?;
    }

    let income = doc
        .income_entries
        .ok_or(SnapshotError::MissingCollection("incomeEntries"))?;
    let expenses = doc
        .expense_entries
        .ok_or(SnapshotError::MissingCollection("expenseEntries"))?;
    let loans_given = doc
        .loans_given
        .ok_or(SnapshotError::MissingCollection("loansGiven"))?;
    let loans_taken = doc
        .loans_taken
        .ok_or(SnapshotError::MissingCollection("loansTaken"))?;

    let mut allocations = doc.portfolio_allocations.unwrap_or_default();
    let legacy = if doc.initial_investment_value.is_null() {
        Decimal::ZERO
    } else {
        coerce_decimal(&doc.initial_investment_value)
    };
    migrate_initial_investment(&mut allocations, legacy);

    let starting_savings = if doc.starting_savings.is_null() {
        Decimal::ZERO
    } else {
        coerce_decimal(&doc.starting_savings)
    };

    Ok(Book {
        income,
        expenses,
        loans_given,
        loans_taken,
        investments: doc.investment_entries.unwrap_or_default(),
        allocations,
        realized: doc.realized_entries.unwrap_or_default().into_iter().collect(),
        starting_savings,
    })
}

fn check_version(version: &str) -> Result<(), SnapshotError> {
    let major = version.split('.').next().unwrap_or_default();
    match major.trim().parse::<u32>() {
        Ok(m) if m <= 1 => Ok(()),
        _ => Err(SnapshotError::UnsupportedVersion(version.to_string())),
    }
}

/// Turns a positive legacy initial investment value into a zero-return allocation.
///
/// Only applies when no allocation exists yet. Returns whether an allocation was added.
pub fn migrate_initial_investment(allocations: &mut Vec<Allocation>, legacy: Decimal) -> bool {
    if legacy <= Decimal::ZERO || !allocations.is_empty() {
        return false;
    }
    tracing::info!(amount = %legacy, "migrating legacy initial investment value into an allocation");
    allocations.push(Allocation {
        id: EntryId::generate(),
        amount: legacy,
        description: INITIAL_INVESTMENT_LABEL.to_string(),
        annual_return: Decimal::ZERO,
    });
    true
}
