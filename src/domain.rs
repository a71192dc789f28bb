use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::calendar::MonthKey;
use crate::errors::InputError;

/// Opaque entry identifier.
///
/// Fresh entries get a UUID. Older exports used millisecond timestamps as ids, so a
/// bare JSON number is accepted too and kept in its decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compact form for tables: UUIDs are cut to their first block, anything else is shown whole.
    pub fn short(&self) -> &str {
        if Uuid::parse_str(&self.0).is_ok() {
            self.0.get(..8).unwrap_or(&self.0)
        } else {
            &self.0
        }
    }
}

impl From<&str> for EntryId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Recurrence {
    #[default]
    #[serde(rename = "one-time")]
    OneTime,
    #[serde(rename = "monthly")]
    Monthly,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::OneTime => "one-time",
            Recurrence::Monthly => "monthly",
        }
    }
}

/// An income or expense. The amount is a magnitude; its sign comes from the collection it sits in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashEntry {
    pub id: EntryId,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(deserialize_with = "flexible_date")]
    pub date: NaiveDate,
    #[serde(rename = "type", default, deserialize_with = "recurrence_or_default")]
    pub recurrence: Recurrence,
}

/// A dated contribution into an instrument that compounds from its start month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: EntryId,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(deserialize_with = "flexible_date")]
    pub date: NaiveDate,
    /// Untyped investments still grow but never receive a contribution.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(
        rename = "annualReturn",
        alias = "annualReturnPercent",
        default,
        deserialize_with = "lenient_decimal"
    )]
    pub annual_return: Decimal,
}

/// An undated lump sum that already exists when the horizon starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: EntryId,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(
        rename = "annualReturn",
        alias = "annualReturnPercent",
        default,
        deserialize_with = "lenient_decimal"
    )]
    pub annual_return: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    #[serde(deserialize_with = "flexible_date")]
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Decimal,
}

/// Repayment schedule of a loan, discriminated by `mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum LoanSchedule {
    /// Fixed payout every month from the month after the start through the end month.
    #[serde(rename_all = "camelCase")]
    Monthly {
        #[serde(deserialize_with = "flexible_date")]
        end_date: NaiveDate,
        #[serde(default, deserialize_with = "lenient_decimal")]
        monthly_payout: Decimal,
    },
    /// Ad-hoc payouts on explicit dates.
    Manual {
        #[serde(default)]
        payouts: Vec<Payout>,
    },
    /// Any other mode found in imported data. Contributes nothing to the projection.
    #[serde(other)]
    Unknown,
}

/// A loan given or taken. Which one it is depends on the collection holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: EntryId,
    #[serde(default, alias = "counterpartyName", deserialize_with = "nullable_string")]
    pub person: String,
    #[serde(alias = "date", deserialize_with = "flexible_date")]
    pub start_date: NaiveDate,
    #[serde(
        default,
        alias = "totalSum",
        alias = "totalAmount",
        deserialize_with = "lenient_decimal"
    )]
    pub principal_amount: Decimal,
    #[serde(flatten)]
    pub schedule: LoanSchedule,
}

impl Loan {
    pub fn mode_label(&self) -> &'static str {
        match self.schedule {
            LoanSchedule::Monthly { .. } => "monthly",
            LoanSchedule::Manual { .. } => "manual",
            LoanSchedule::Unknown => "unknown",
        }
    }
}

/// Composite `{id}_{YYYY-MM}` keys marking an obligation as already settled for a month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealizedSet(BTreeSet<String>);

impl RealizedSet {
    pub fn key(id: &EntryId, month: MonthKey) -> String {
        format!("{id}_{month}")
    }

    pub fn contains(&self, id: &EntryId, month: MonthKey) -> bool {
        self.0.contains(&Self::key(id, month))
    }

    pub fn insert(&mut self, id: &EntryId, month: MonthKey) -> bool {
        self.0.insert(Self::key(id, month))
    }

    /// Adds the key when absent, removes it when present. Returns whether it is now realized.
    pub fn toggle(&mut self, id: &EntryId, month: MonthKey) -> bool {
        let key = Self::key(id, month);
        if self.0.remove(&key) {
            false
        } else {
            self.0.insert(key);
            true
        }
    }

    /// Drops every key belonging to `id`.
    pub fn forget(&mut self, id: &EntryId) {
        let prefix = format!("{id}_");
        self.0.retain(|k| !k.starts_with(&prefix));
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for RealizedSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Immutable input snapshot handed to the projection engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub income: Vec<CashEntry>,
    pub expenses: Vec<CashEntry>,
    pub loans_given: Vec<Loan>,
    pub loans_taken: Vec<Loan>,
    pub investments: Vec<Investment>,
    pub allocations: Vec<Allocation>,
    pub realized: RealizedSet,
    pub starting_savings: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Income,
    Expense,
    Investment,
    Allocation,
    LoanGiven,
    LoanTaken,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Income,
        Collection::Expense,
        Collection::Investment,
        Collection::Allocation,
        Collection::LoanGiven,
        Collection::LoanTaken,
    ];

    /// Collections whose entries move cash and can therefore be realized.
    pub const CASH_FLOW: [Collection; 5] = [
        Collection::Income,
        Collection::Expense,
        Collection::Investment,
        Collection::LoanGiven,
        Collection::LoanTaken,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Collection::Income => "income",
            Collection::Expense => "expense",
            Collection::Investment => "investment",
            Collection::Allocation => "allocation",
            Collection::LoanGiven => "loan given",
            Collection::LoanTaken => "loan taken",
        }
    }
}

impl Book {
    fn ids_in(&self, collection: Collection) -> Vec<&EntryId> {
        match collection {
            Collection::Income => self.income.iter().map(|e| &e.id).collect(),
            Collection::Expense => self.expenses.iter().map(|e| &e.id).collect(),
            Collection::Investment => self.investments.iter().map(|e| &e.id).collect(),
            Collection::Allocation => self.allocations.iter().map(|e| &e.id).collect(),
            Collection::LoanGiven => self.loans_given.iter().map(|e| &e.id).collect(),
            Collection::LoanTaken => self.loans_taken.iter().map(|e| &e.id).collect(),
        }
    }

    /// Resolves a full id or a unique id prefix within the given collections.
    pub fn resolve_id(
        &self,
        raw: &str,
        within: &[Collection],
    ) -> Result<(Collection, EntryId), InputError> {
        let needle = raw.trim();
        if needle.is_empty() {
            return Err(InputError::UnknownId(raw.to_string()));
        }

        let mut matches: Vec<(Collection, &EntryId)> = Vec::new();
        for &collection in within {
            for id in self.ids_in(collection) {
                if id.as_str() == needle {
                    return Ok((collection, id.clone()));
                }
                if id.as_str().starts_with(needle) {
                    matches.push((collection, id));
                }
            }
        }

        match matches.as_slice() {
            [] => Err(InputError::UnknownId(needle.to_string())),
            [(collection, id)] => Ok((*collection, (*id).clone())),
            _ => Err(InputError::AmbiguousId(needle.to_string())),
        }
    }

    /// Removes the entry and any realized keys pointing at it.
    pub fn remove(&mut self, collection: Collection, id: &EntryId) -> bool {
        let before = self.len_of(collection);
        match collection {
            Collection::Income => self.income.retain(|e| &e.id != id),
            Collection::Expense => self.expenses.retain(|e| &e.id != id),
            Collection::Investment => self.investments.retain(|e| &e.id != id),
            Collection::Allocation => self.allocations.retain(|e| &e.id != id),
            Collection::LoanGiven => self.loans_given.retain(|e| &e.id != id),
            Collection::LoanTaken => self.loans_taken.retain(|e| &e.id != id),
        }
        let removed = self.len_of(collection) != before;
        if removed {
            self.realized.forget(id);
        }
        removed
    }

    fn len_of(&self, collection: Collection) -> usize {
        match collection {
            Collection::Income => self.income.len(),
            Collection::Expense => self.expenses.len(),
            Collection::Investment => self.investments.len(),
            Collection::Allocation => self.allocations.len(),
            Collection::LoanGiven => self.loans_given.len(),
            Collection::LoanTaken => self.loans_taken.len(),
        }
    }

    pub fn entry_count(&self) -> usize {
        Collection::ALL.iter().map(|c| self.len_of(*c)).sum()
    }
}

/// Strict decimal parsing for values typed by the user.
pub fn parse_decimal(raw: &str, field: &'static str) -> Result<Decimal, InputError> {
    parse_decimal_text(raw.trim()).ok_or_else(|| InputError::Decimal {
        field,
        raw: raw.to_string(),
    })
}

/// Like [`parse_decimal`] but also rejects negative values; signs come from the category.
pub fn parse_amount(raw: &str, field: &'static str) -> Result<Decimal, InputError> {
    let amount = parse_decimal(raw, field)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(InputError::Negative {
            field,
            raw: raw.to_string(),
        });
    }
    Ok(amount)
}

/// Accepts `YYYY-MM-DD` or an RFC3339 timestamp (its date part is used).
pub fn parse_date(raw: &str) -> Result<NaiveDate, InputError> {
    let trimmed = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    Err(InputError::Date(raw.to_string()))
}

fn parse_decimal_text(s: &str) -> Option<Decimal> {
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// Coerces any JSON value to a decimal. Numbers and numeric strings parse; everything else is zero.
pub fn coerce_decimal(raw: &serde_json::Value) -> Decimal {
    let parsed = match raw {
        serde_json::Value::Number(n) => parse_decimal_text(&n.to_string()),
        serde_json::Value::String(s) => parse_decimal_text(s.trim()),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        tracing::debug!(value = %raw, "non-numeric amount coerced to zero");
        Decimal::ZERO
    })
}

fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_decimal(&raw))
}

fn flexible_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

fn recurrence_or_default<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Recurrence, D::Error> {
    Ok(Option::<Recurrence>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn cash_entry_accepts_numeric_ids_and_string_amounts() {
        let raw = r#"{"id": 1718000000000, "amount": "250.50", "description": "Rent", "date": "2025-01-15", "type": "monthly"}"#;
        let entry: CashEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.id.as_str(), "1718000000000");
        assert_eq!(entry.amount, dec("250.50"));
        assert_eq!(entry.recurrence, Recurrence::Monthly);
    }

    #[test]
    fn garbage_amounts_coerce_to_zero() {
        let raw = r#"{"id": "a", "amount": "lots", "date": "2025-01-15"}"#;
        let entry: CashEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.amount, Decimal::ZERO);
        assert_eq!(entry.recurrence, Recurrence::OneTime);

        let raw = r#"{"id": "b", "amount": null, "date": "2025-01-15", "type": null}"#;
        let entry: CashEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.amount, Decimal::ZERO);
        assert_eq!(entry.recurrence, Recurrence::OneTime);
    }

    #[test]
    fn invalid_date_is_rejected() {
        let raw = r#"{"id": "a", "amount": 1, "date": "someday"}"#;
        assert!(serde_json::from_str::<CashEntry>(raw).is_err());
    }

    #[test]
    fn rfc3339_dates_use_their_date_part() {
        assert_eq!(
            parse_date("2025-03-01T10:00:00Z").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn loan_modes_deserialize_into_schedules() {
        let monthly = r#"{"id": 1, "person": "Ana", "startDate": "2025-01-15", "principalAmount": 1000,
            "mode": "monthly", "endDate": "2025-04-15", "monthlyPayout": "100"}"#;
        let loan: Loan = serde_json::from_str(monthly).unwrap();
        assert_eq!(
            loan.schedule,
            LoanSchedule::Monthly {
                end_date: NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
                monthly_payout: dec("100"),
            }
        );

        let manual = r#"{"id": 2, "person": "Bo", "startDate": "2025-01-15", "totalSum": 300,
            "mode": "manual", "payouts": [{"date": "2025-02-03", "amount": 50}]}"#;
        let loan: Loan = serde_json::from_str(manual).unwrap();
        assert_eq!(loan.principal_amount, dec("300"));
        match loan.schedule {
            LoanSchedule::Manual { payouts } => assert_eq!(payouts.len(), 1),
            other => panic!("unexpected schedule {other:?}"),
        }

        let odd = r#"{"id": 3, "startDate": "2025-01-15", "principalAmount": 1, "mode": "weekly"}"#;
        let loan: Loan = serde_json::from_str(odd).unwrap();
        assert_eq!(loan.schedule, LoanSchedule::Unknown);
    }

    #[test]
    fn realized_toggle_adds_then_removes() {
        let mut realized = RealizedSet::default();
        let id = EntryId::from("abc");
        let month = MonthKey::new(2025, 1).unwrap();
        assert!(realized.toggle(&id, month));
        assert!(realized.contains(&id, month));
        assert_eq!(realized.iter().collect::<Vec<_>>(), vec!["abc_2025-01"]);
        assert!(!realized.toggle(&id, month));
        assert!(realized.is_empty());
    }

    #[test]
    fn resolve_id_prefers_exact_match_and_rejects_ambiguity() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let entry = |id: &str| CashEntry {
            id: EntryId::from(id),
            amount: Decimal::ONE,
            description: String::new(),
            date,
            recurrence: Recurrence::OneTime,
        };
        let book = Book {
            income: vec![entry("abc"), entry("abcd")],
            expenses: vec![entry("xyz")],
            ..Book::default()
        };

        let (c, id) = book.resolve_id("abc", &Collection::ALL).unwrap();
        assert_eq!((c, id.as_str()), (Collection::Income, "abc"));
        let (c, _) = book.resolve_id("xy", &Collection::ALL).unwrap();
        assert_eq!(c, Collection::Expense);
        assert!(matches!(
            book.resolve_id("ab", &Collection::ALL),
            Err(InputError::AmbiguousId(_))
        ));
        assert!(matches!(
            book.resolve_id("xy", &[Collection::Income]),
            Err(InputError::UnknownId(_))
        ));
    }

    #[test]
    fn short_ids_only_cut_real_uuids() {
        let uuid = EntryId::from("67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(uuid.short(), "67e55044");

        // 36 bytes, but the first eight are not a char boundary.
        let odd = EntryId::from("€€€€€€€€€€€€");
        assert_eq!(odd.as_str().len(), 36);
        assert_eq!(odd.short(), odd.as_str());

        assert_eq!(EntryId::from("1718000000000").short(), "1718000000000");
    }

    #[test]
    fn investment_without_type_stays_untyped() {
        let raw = r#"{"id": 7, "amount": 100, "date": "2025-01-01", "annualReturn": 5}"#;
        let inv: Investment = serde_json::from_str(raw).unwrap();
        assert_eq!(inv.recurrence, None);
        let json = serde_json::to_value(&inv).unwrap();
        assert!(json.get("type").is_none());

        let raw = r#"{"id": 8, "amount": 100, "date": "2025-01-01", "type": "monthly"}"#;
        let inv: Investment = serde_json::from_str(raw).unwrap();
        assert_eq!(inv.recurrence, Some(Recurrence::Monthly));
    }

    #[test]
    fn negative_amounts_are_rejected_at_entry() {
        assert!(parse_amount("-5", "amount").is_err());
        assert_eq!(parse_amount("0", "amount").unwrap(), Decimal::ZERO);
        assert!(parse_decimal("1e3", "amount").is_ok());
    }
}
