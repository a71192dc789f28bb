use crate::config::{AppPaths, profile_slug};
use crate::domain::{Book, coerce_decimal};
use crate::errors::StoreError;
use crate::snapshot::migrate_initial_investment;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::PathBuf;

pub const KEY_INCOME: &str = "income";
pub const KEY_EXPENSES: &str = "expenses";
pub const KEY_LOANS_GIVEN: &str = "loans_given";
pub const KEY_LOANS_TAKEN: &str = "loans_taken";
pub const KEY_INVESTMENTS: &str = "investments";
pub const KEY_REALIZED: &str = "realized";
pub const KEY_STARTING_SAVINGS: &str = "starting_savings";
pub const KEY_ALLOCATIONS: &str = "portfolio_allocations";
/// Pre-allocation scalar; only read for migration, never written by current code.
pub const KEY_LEGACY_INITIAL_INVESTMENT: &str = "initial_investment_value";

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(paths: &AppPaths, profile: &str) -> Result<(Self, PathBuf)> {
        let profile_dir = paths.data_dir.join("profiles").join(profile_slug(profile));
        fs::create_dir_all(&profile_dir).with_context(|| {
            format!("Failed to create profile dir {}", profile_dir.display())
        })?;

        let db_path = profile_dir.join("outlook.sqlite3");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open DB {}", db_path.display()))?;

        let db = Self { conn };
        db.migrate()?;
        Ok((db, db_path))
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS store (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value_json FROM store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get<T: DeserializeOwned + Default>(&self, key: &'static str) -> Result<T, StoreError> {
        match self.get_raw(key)? {
            None => Ok(T::default()),
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|source| StoreError::Corrupted { key, source })
            }
        }
    }

    fn get_decimal(&self, key: &'static str) -> Result<Decimal, StoreError> {
        let value: serde_json::Value = self.get(key)?;
        Ok(if value.is_null() {
            Decimal::ZERO
        } else {
            coerce_decimal(&value)
        })
    }

    /// Reads the whole book. A legacy initial investment value is migrated into an allocation
    /// and removed from the store the first time it is seen.
    pub fn load_book(&mut self) -> Result<Book, StoreError> {
        let mut book = Book {
            income: self.get(KEY_INCOME)?,
            expenses: self.get(KEY_EXPENSES)?,
            loans_given: self.get(KEY_LOANS_GIVEN)?,
            loans_taken: self.get(KEY_LOANS_TAKEN)?,
            investments: self.get(KEY_INVESTMENTS)?,
            allocations: self.get(KEY_ALLOCATIONS)?,
            realized: self.get(KEY_REALIZED)?,
            starting_savings: self.get_decimal(KEY_STARTING_SAVINGS)?,
        };

        if self.get_raw(KEY_LEGACY_INITIAL_INVESTMENT)?.is_some() {
            let legacy = self.get_decimal(KEY_LEGACY_INITIAL_INVESTMENT)?;
            let migrated = migrate_initial_investment(&mut book.allocations, legacy);
            let tx = self.conn.transaction()?;
            if migrated {
                put(&tx, KEY_ALLOCATIONS, &book.allocations)?;
            }
            tx.execute(
                "DELETE FROM store WHERE key = ?1",
                params![KEY_LEGACY_INITIAL_INVESTMENT],
            )?;
            tx.commit()?;
        }

        tracing::debug!(entries = book.entry_count(), "loaded book");
        Ok(book)
    }

    /// Writes every collection in one transaction, replacing whatever was stored.
    pub fn save_book(&mut self, book: &Book) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        put(&tx, KEY_INCOME, &book.income)?;
        put(&tx, KEY_EXPENSES, &book.expenses)?;
        put(&tx, KEY_LOANS_GIVEN, &book.loans_given)?;
        put(&tx, KEY_LOANS_TAKEN, &book.loans_taken)?;
        put(&tx, KEY_INVESTMENTS, &book.investments)?;
        put(&tx, KEY_ALLOCATIONS, &book.allocations)?;
        put(&tx, KEY_REALIZED, &book.realized)?;
        put(&tx, KEY_STARTING_SAVINGS, &book.starting_savings)?;
        tx.execute(
            "DELETE FROM store WHERE key = ?1",
            params![KEY_LEGACY_INITIAL_INVESTMENT],
        )?;
        tx.commit()?;
        tracing::debug!(entries = book.entry_count(), "saved book");
        Ok(())
    }

    #[cfg(test)]
    fn put_raw(&self, key: &str, value_json: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO store (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

fn put<T: Serialize + ?Sized>(tx: &Transaction<'_>, key: &str, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string(value)?;
    tx.execute(
        r#"
        INSERT INTO store (key, value_json, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at
        "#,
        params![key, json, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CashEntry, EntryId, Recurrence};
    use crate::snapshot::INITIAL_INVESTMENT_LABEL;
    use chrono::NaiveDate;

    #[test]
    fn empty_store_loads_empty_book() {
        let mut db = Db::open_in_memory().unwrap();
        assert_eq!(db.load_book().unwrap(), Book::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut db = Db::open_in_memory().unwrap();
        let book = Book {
            income: vec![CashEntry {
                id: EntryId::generate(),
                amount: Decimal::new(1999, 2),
                description: "Side gig".into(),
                date: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
                recurrence: Recurrence::Monthly,
            }],
            starting_savings: Decimal::from(42),
            ..Book::default()
        };
        db.save_book(&book).unwrap();
        assert_eq!(db.load_book().unwrap(), book);
    }

    #[test]
    fn legacy_initial_investment_is_migrated_once() {
        let mut db = Db::open_in_memory().unwrap();
        db.put_raw(KEY_LEGACY_INITIAL_INVESTMENT, "5000").unwrap();

        let book = db.load_book().unwrap();
        assert_eq!(book.allocations.len(), 1);
        assert_eq!(book.allocations[0].amount, Decimal::from(5000));
        assert_eq!(book.allocations[0].description, INITIAL_INVESTMENT_LABEL);
        assert!(db.get_raw(KEY_LEGACY_INITIAL_INVESTMENT).unwrap().is_none());

        let again = db.load_book().unwrap();
        assert_eq!(again.allocations, book.allocations);
    }

    #[test]
    fn corrupted_value_names_its_key() {
        let mut db = Db::open_in_memory().unwrap();
        db.put_raw(KEY_INCOME, "{not json").unwrap();
        let err = db.load_book().unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { key: KEY_INCOME, .. }));
    }
}
