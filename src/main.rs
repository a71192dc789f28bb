mod calendar;
mod cli;
mod config;
mod db;
mod domain;
mod errors;
mod ledger;
mod loans;
mod recurrence;
mod report;
mod snapshot;
mod valuation;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;

use crate::calendar::MonthKey;
use crate::cli::{
    AllocCmd, CashCmd, Cli, Command, ConfigCmd, ContextFormat, EditEntryFlags, InvestCmd,
    LoanCmd, MonthFormat, NewEntryFlags, NewLoanArgs, ProjectFormat, SavingsCmd,
};
use crate::config::{AppConfig, AppPaths, app_paths, load_or_init_config, write_config};
use crate::db::Db;
use crate::domain::{
    Allocation, Book, CashEntry, Collection, EntryId, Investment, Loan, LoanSchedule, Payout,
    Recurrence, parse_amount, parse_date, parse_decimal,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = std::env::var("OUTLOOK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("outlook=warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let paths = app_paths(cli.home.clone())?;
    let (mut cfg, cfg_path) = load_or_init_config(&paths)?;
    let today = config::today(cli.today.as_deref())?;

    match cli.command {
        Command::Config(args) => handle_config(args.cmd, &paths, &mut cfg, &cfg_path),
        cmd => {
            let (mut db, db_path) = Db::open(&paths, &cfg.profile)?;
            let mut book = db
                .load_book()
                .with_context(|| format!("Failed to load {}", db_path.display()))?;
            tracing::debug!(profile = %cfg.profile, %today, "opened store");

            match cmd {
                Command::Income(args) => {
                    handle_cash(args.cmd, Collection::Income, &mut db, &mut book, today)
                }
                Command::Expense(args) => {
                    handle_cash(args.cmd, Collection::Expense, &mut db, &mut book, today)
                }
                Command::Invest(args) => handle_invest(args.cmd, &mut db, &mut book, today),
                Command::Alloc(args) => handle_alloc(args.cmd, &mut db, &mut book),
                Command::Loan(args) => handle_loan(args.cmd, &mut db, &mut book, today),
                Command::Realize(args) => {
                    let (collection, id) = book.resolve_id(&args.id, &Collection::CASH_FLOW)?;
                    let month = match args.month.as_deref() {
                        Some(raw) => raw.parse::<MonthKey>()?,
                        None => MonthKey::of(today),
                    };
                    let now_realized = book.realized.toggle(&id, month);
                    db.save_book(&book)?;
                    if now_realized {
                        println!("Marked {} {} as realized for {month}", collection.label(), id.short());
                    } else {
                        println!("Cleared realized mark on {} {} for {month}", collection.label(), id.short());
                    }
                    Ok(())
                }
                Command::Savings(args) => match args.cmd {
                    SavingsCmd::Set { amount } => {
                        book.starting_savings = parse_decimal(&amount, "starting savings")?;
                        db.save_book(&book)?;
                        println!("Starting savings set to {}", fmt_money(book.starting_savings));
                        Ok(())
                    }
                    SavingsCmd::Show => {
                        println!("{}", fmt_money(book.starting_savings));
                        Ok(())
                    }
                },
                Command::Project(args) => {
                    let months = args.months.unwrap_or(cfg.horizon_months);
                    let rows = ledger::project(&book, months, today);
                    print_projection(&rows, args.format)
                }
                Command::Month(args) => {
                    let month: MonthKey = args.month.parse()?;
                    let details = ledger::month_details(&book, month);
                    match args.format {
                        MonthFormat::Json => {
                            println!("{}", serde_json::to_string_pretty(&details)?);
                        }
                        MonthFormat::Table => print_month_details(month, &details),
                    }
                    Ok(())
                }
                Command::Context(args) => {
                    let months = args.months.unwrap_or(cfg.context_months);
                    let ctx = report::build_context(&book, months, today, &cfg.currency_symbol);
                    match args.format {
                        ContextFormat::Json => println!("{}", serde_json::to_string_pretty(&ctx)?),
                        ContextFormat::Markdown => print!("{}", report::to_markdown(&ctx)),
                    }
                    Ok(())
                }
                Command::Export(args) => {
                    let json = snapshot::to_json(&book, Utc::now())?;
                    ensure_parent_dir(&args.path)?;
                    fs::write(&args.path, json)
                        .with_context(|| format!("Failed to write {}", args.path.display()))?;
                    println!(
                        "Exported {} entries to {}",
                        book.entry_count(),
                        args.path.display()
                    );
                    Ok(())
                }
                Command::Import(args) => {
                    let raw = fs::read_to_string(&args.path)
                        .with_context(|| format!("Failed to read {}", args.path.display()))?;
                    let imported = snapshot::parse_document(&raw)
                        .with_context(|| format!("Failed to import {}", args.path.display()))?;
                    db.save_book(&imported)?;
                    println!(
                        "Imported {} entries from {} into {}",
                        imported.entry_count(),
                        args.path.display(),
                        db_path.display()
                    );
                    Ok(())
                }
                Command::Config(_) => unreachable!(),
            }
        }
    }
}

fn handle_config(
    cmd: ConfigCmd,
    paths: &AppPaths,
    cfg: &mut AppConfig,
    cfg_path: &Path,
) -> Result<()> {
    match cmd {
        ConfigCmd::Show => {
            println!("{}", serde_json::to_string_pretty(cfg)?);
            println!("config: {}", cfg_path.display());
            println!("data:   {}", paths.data_dir.display());
        }
        ConfigCmd::Set { key, value } => {
            cfg.set_key(&key, &value)?;
            write_config(cfg_path, cfg)?;
            println!("Set {key} = {value}");
        }
    }
    Ok(())
}

fn cash_entries_mut(book: &mut Book, collection: Collection) -> Result<&mut Vec<CashEntry>> {
    match collection {
        Collection::Income => Ok(&mut book.income),
        Collection::Expense => Ok(&mut book.expenses),
        other => Err(anyhow!("{} is not a cash entry collection", other.label())),
    }
}

fn entry_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    Ok(match raw {
        Some(raw) => parse_date(raw)?,
        None => today,
    })
}

fn recurrence_flag(monthly: bool) -> Recurrence {
    if monthly {
        Recurrence::Monthly
    } else {
        Recurrence::OneTime
    }
}

fn investment_type(inv: &Investment) -> &'static str {
    inv.recurrence.map_or("untyped", Recurrence::as_str)
}

fn handle_cash(
    cmd: CashCmd,
    collection: Collection,
    db: &mut Db,
    book: &mut Book,
    today: NaiveDate,
) -> Result<()> {
    match cmd {
        CashCmd::Add { amount, flags } => {
            let NewEntryFlags {
                description,
                date,
                monthly,
            } = flags;
            let entry = CashEntry {
                id: EntryId::generate(),
                amount: parse_amount(&amount, "amount")?,
                description: description.unwrap_or_default(),
                date: entry_date(date.as_deref(), today)?,
                recurrence: recurrence_flag(monthly),
            };
            let id = entry.id.clone();
            cash_entries_mut(book, collection)?.push(entry);
            db.save_book(book)?;
            println!("Added {} {}", collection.label(), id.short());
        }
        CashCmd::List => {
            let rows: Vec<Vec<String>> = cash_entries_mut(book, collection)?
                .iter()
                .map(|e| {
                    vec![
                        e.id.short().to_string(),
                        e.date.to_string(),
                        e.recurrence.as_str().to_string(),
                        fmt_money(e.amount),
                        e.description.clone(),
                    ]
                })
                .collect();
            print_table(&["id", "date", "type", "amount", "description"], &rows);
        }
        CashCmd::Rm { id } => {
            let (_, id) = book.resolve_id(&id, &[collection])?;
            book.remove(collection, &id);
            db.save_book(book)?;
            println!("Removed {} {}", collection.label(), id.short());
        }
        CashCmd::Edit { id, flags } => {
            let (_, id) = book.resolve_id(&id, &[collection])?;
            let entry = cash_entries_mut(book, collection)?
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| anyhow!("No entry matches id '{id}'"))?;
            apply_edit(
                &flags,
                &mut entry.amount,
                &mut entry.description,
                &mut entry.date,
            )?;
            if let Some(arg) = flags.recurrence {
                entry.recurrence = arg.into();
            }
            db.save_book(book)?;
            println!("Updated {} {}", collection.label(), id.short());
        }
    }
    Ok(())
}

fn apply_edit(
    flags: &EditEntryFlags,
    amount: &mut Decimal,
    description: &mut String,
    date: &mut NaiveDate,
) -> Result<()> {
    if let Some(raw) = flags.amount.as_deref() {
        *amount = parse_amount(raw, "amount")?;
    }
    if let Some(text) = flags.description.as_ref() {
        *description = text.clone();
    }
    if let Some(raw) = flags.date.as_deref() {
        *date = parse_date(raw)?;
    }
    Ok(())
}

fn handle_invest(cmd: InvestCmd, db: &mut Db, book: &mut Book, today: NaiveDate) -> Result<()> {
    match cmd {
        InvestCmd::Add {
            amount,
            flags,
            annual_return,
        } => {
            let inv = Investment {
                id: EntryId::generate(),
                amount: parse_amount(&amount, "amount")?,
                description: flags.description.unwrap_or_default(),
                date: entry_date(flags.date.as_deref(), today)?,
                recurrence: Some(recurrence_flag(flags.monthly)),
                annual_return: parse_decimal(&annual_return, "annual return")?,
            };
            let id = inv.id.clone();
            book.investments.push(inv);
            db.save_book(book)?;
            println!("Added investment {}", id.short());
        }
        InvestCmd::List => {
            let rows: Vec<Vec<String>> = book
                .investments
                .iter()
                .map(|i| {
                    vec![
                        i.id.short().to_string(),
                        i.date.to_string(),
                        investment_type(i).to_string(),
                        fmt_money(i.amount),
                        format!("{}%", i.annual_return.normalize()),
                        i.description.clone(),
                    ]
                })
                .collect();
            print_table(
                &["id", "date", "type", "amount", "annual return", "description"],
                &rows,
            );
        }
        InvestCmd::Rm { id } => {
            let (_, id) = book.resolve_id(&id, &[Collection::Investment])?;
            book.remove(Collection::Investment, &id);
            db.save_book(book)?;
            println!("Removed investment {}", id.short());
        }
        InvestCmd::Edit {
            id,
            flags,
            annual_return,
        } => {
            let (_, id) = book.resolve_id(&id, &[Collection::Investment])?;
            let inv = book
                .investments
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| anyhow!("No entry matches id '{id}'"))?;
            apply_edit(
                &flags,
                &mut inv.amount,
                &mut inv.description,
                &mut inv.date,
            )?;
            if let Some(arg) = flags.recurrence {
                inv.recurrence = Some(arg.into());
            }
            if let Some(raw) = annual_return.as_deref() {
                inv.annual_return = parse_decimal(raw, "annual return")?;
            }
            db.save_book(book)?;
            println!("Updated investment {}", id.short());
        }
    }
    Ok(())
}

fn handle_alloc(cmd: AllocCmd, db: &mut Db, book: &mut Book) -> Result<()> {
    match cmd {
        AllocCmd::Add {
            amount,
            description,
            annual_return,
        } => {
            let alloc = Allocation {
                id: EntryId::generate(),
                amount: parse_amount(&amount, "amount")?,
                description: description.unwrap_or_default(),
                annual_return: parse_decimal(&annual_return, "annual return")?,
            };
            let id = alloc.id.clone();
            book.allocations.push(alloc);
            db.save_book(book)?;
            println!("Added allocation {}", id.short());
        }
        AllocCmd::List => {
            let rows: Vec<Vec<String>> = book
                .allocations
                .iter()
                .map(|a| {
                    vec![
                        a.id.short().to_string(),
                        fmt_money(a.amount),
                        format!("{}%", a.annual_return.normalize()),
                        a.description.clone(),
                    ]
                })
                .collect();
            print_table(&["id", "amount", "annual return", "description"], &rows);
        }
        AllocCmd::Rm { id } => {
            let (_, id) = book.resolve_id(&id, &[Collection::Allocation])?;
            book.remove(Collection::Allocation, &id);
            db.save_book(book)?;
            println!("Removed allocation {}", id.short());
        }
        AllocCmd::Edit {
            id,
            amount,
            description,
            annual_return,
        } => {
            let (_, id) = book.resolve_id(&id, &[Collection::Allocation])?;
            let alloc = book
                .allocations
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| anyhow!("No entry matches id '{id}'"))?;
            if let Some(raw) = amount.as_deref() {
                alloc.amount = parse_amount(raw, "amount")?;
            }
            if let Some(text) = description {
                alloc.description = text;
            }
            if let Some(raw) = annual_return.as_deref() {
                alloc.annual_return = parse_decimal(raw, "annual return")?;
            }
            db.save_book(book)?;
            println!("Updated allocation {}", id.short());
        }
    }
    Ok(())
}

fn build_loan(args: NewLoanArgs, today: NaiveDate) -> Result<Loan> {
    let start_date = entry_date(args.start.as_deref(), today)?;
    let schedule = match (args.monthly.as_deref(), args.end.as_deref(), args.manual) {
        (_, _, true) => LoanSchedule::Manual {
            payouts: Vec::new(),
        },
        (Some(payout), Some(end), false) => {
            let end_date = parse_date(end)?;
            if end_date < start_date {
                bail!("--end ({end_date}) is before --start ({start_date})");
            }
            LoanSchedule::Monthly {
                end_date,
                monthly_payout: parse_amount(payout, "monthly payout")?,
            }
        }
        _ => bail!("Specify either --monthly <payout> --end <date> or --manual"),
    };

    Ok(Loan {
        id: EntryId::generate(),
        person: args.person,
        start_date,
        principal_amount: parse_amount(&args.principal, "principal")?,
        schedule,
    })
}

fn loan_terms(loan: &Loan) -> String {
    match &loan.schedule {
        LoanSchedule::Monthly {
            end_date,
            monthly_payout,
        } => format!("{}/month until {end_date}", fmt_money(*monthly_payout)),
        LoanSchedule::Manual { payouts } => {
            let paid: Decimal = payouts.iter().map(|p| p.amount).sum();
            format!("{} payouts, {} repaid", payouts.len(), fmt_money(paid))
        }
        LoanSchedule::Unknown => "-".to_string(),
    }
}

fn handle_loan(cmd: LoanCmd, db: &mut Db, book: &mut Book, today: NaiveDate) -> Result<()> {
    match cmd {
        LoanCmd::Give(args) => {
            let loan = build_loan(args, today)?;
            let id = loan.id.clone();
            book.loans_given.push(loan);
            db.save_book(book)?;
            println!("Added loan given {}", id.short());
        }
        LoanCmd::Take(args) => {
            let loan = build_loan(args, today)?;
            let id = loan.id.clone();
            book.loans_taken.push(loan);
            db.save_book(book)?;
            println!("Added loan taken {}", id.short());
        }
        LoanCmd::Payout { id, amount, date } => {
            let (collection, id) =
                book.resolve_id(&id, &[Collection::LoanGiven, Collection::LoanTaken])?;
            let payout = Payout {
                date: entry_date(date.as_deref(), today)?,
                amount: parse_amount(&amount, "payout")?,
            };
            let loans = match collection {
                Collection::LoanGiven => &mut book.loans_given,
                _ => &mut book.loans_taken,
            };
            let loan = loans
                .iter_mut()
                .find(|l| l.id == id)
                .ok_or_else(|| anyhow!("No entry matches id '{id}'"))?;
            let mode = loan.mode_label();
            match &mut loan.schedule {
                LoanSchedule::Manual { payouts } => payouts.push(payout),
                _ => bail!(
                    "Loan {} has {mode} repayments; payouts can only be recorded on manual loans",
                    id.short()
                ),
            }
            db.save_book(book)?;
            println!("Recorded payout on {} {}", collection.label(), id.short());
        }
        LoanCmd::List => {
            let rows: Vec<Vec<String>> = book
                .loans_given
                .iter()
                .map(|l| ("given", l))
                .chain(book.loans_taken.iter().map(|l| ("taken", l)))
                .map(|(direction, l)| {
                    vec![
                        l.id.short().to_string(),
                        direction.to_string(),
                        l.person.clone(),
                        l.start_date.to_string(),
                        fmt_money(l.principal_amount),
                        l.mode_label().to_string(),
                        loan_terms(l),
                    ]
                })
                .collect();
            print_table(
                &["id", "direction", "person", "start", "principal", "mode", "terms"],
                &rows,
            );
        }
        LoanCmd::Rm { id } => {
            let (collection, id) =
                book.resolve_id(&id, &[Collection::LoanGiven, Collection::LoanTaken])?;
            book.remove(collection, &id);
            db.save_book(book)?;
            println!("Removed {} {}", collection.label(), id.short());
        }
    }
    Ok(())
}

fn print_projection(rows: &[ledger::ProjectedMonth], format: ProjectFormat) -> Result<()> {
    const HEADERS: [&str; 9] = [
        "month",
        "income",
        "expenses",
        "invested",
        "investment value",
        "net loans",
        "total",
        "difference",
        "total worth",
    ];

    let cells = |r: &ledger::ProjectedMonth| {
        vec![
            r.key.to_string(),
            fmt_money(r.income),
            fmt_money(r.expenses),
            fmt_money(r.invested),
            fmt_money(r.investment_value),
            fmt_money(r.net_loans),
            fmt_money(r.total),
            fmt_money(r.difference),
            fmt_money(r.total_worth),
        ]
    };

    match format {
        ProjectFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        ProjectFormat::Tsv => {
            println!("{}", HEADERS.join("\t"));
            for r in rows {
                println!("{}", cells(r).join("\t"));
            }
        }
        ProjectFormat::Table => {
            let table: Vec<Vec<String>> = rows.iter().map(cells).collect();
            print_table(&HEADERS, &table);
        }
    }
    Ok(())
}

fn print_month_details(month: MonthKey, details: &ledger::MonthDetails) {
    println!("{} ({month})", month.label());
    if details.is_empty() {
        println!("(nothing scheduled)");
        return;
    }

    let cash_rows = |entries: &[CashEntry]| -> Vec<Vec<String>> {
        entries
            .iter()
            .map(|e| {
                vec![
                    e.id.short().to_string(),
                    e.date.to_string(),
                    e.recurrence.as_str().to_string(),
                    fmt_money(e.amount),
                    e.description.clone(),
                ]
            })
            .collect()
    };
    let loan_rows = |loans: &[ledger::ListedLoan]| -> Vec<Vec<String>> {
        loans
            .iter()
            .map(|l| {
                vec![
                    l.loan.id.short().to_string(),
                    l.loan.person.clone(),
                    fmt_money(l.loan.principal_amount),
                    l.loan.mode_label().to_string(),
                    if l.is_principal_month { "yes" } else { "no" }.to_string(),
                ]
            })
            .collect()
    };

    let cash_headers = ["id", "date", "type", "amount", "description"];
    let loan_headers = ["id", "person", "principal", "mode", "principal month"];

    if !details.incomes.is_empty() {
        println!("\nIncome");
        print_table(&cash_headers, &cash_rows(&details.incomes));
    }
    if !details.expenses.is_empty() {
        println!("\nExpenses");
        print_table(&cash_headers, &cash_rows(&details.expenses));
    }
    if !details.investments.is_empty() {
        println!("\nInvestments");
        let rows: Vec<Vec<String>> = details
            .investments
            .iter()
            .map(|i| {
                vec![
                    i.id.short().to_string(),
                    i.date.to_string(),
                    investment_type(i).to_string(),
                    fmt_money(i.amount),
                    i.description.clone(),
                ]
            })
            .collect();
        print_table(&cash_headers, &rows);
    }
    if !details.loans_given.is_empty() {
        println!("\nLoans given");
        print_table(&loan_headers, &loan_rows(&details.loans_given));
    }
    if !details.loans_taken.is_empty() {
        println!("\nLoans taken");
        print_table(&loan_headers, &loan_rows(&details.loans_taken));
    }
}

fn fmt_money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    Ok(())
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if headers.is_empty() {
        println!("(no columns)");
        return;
    }

    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for row in rows {
        for (i, cell) in row.iter().take(cols).enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    fn print_row(cells: &[String], widths: &[usize]) {
        print!("|");
        for (i, w) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            print!(" {:width$} |", cell, width = *w);
        }
        println!();
    }

    fn print_sep(widths: &[usize]) {
        print!("|");
        for w in widths {
            print!("{}|", "-".repeat(w + 2));
        }
        println!();
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    print_row(&header_cells, &widths);
    print_sep(&widths);
    for row in rows {
        print_row(row, &widths);
    }
}
