use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::calendar::MAX_HORIZON_MONTHS;
use crate::domain::Recurrence;

#[derive(Debug, Parser)]
#[command(name = "outlook")]
#[command(about = "Local-first cash-flow and net-worth projection", long_about = None)]
pub struct Cli {
    /// Override Outlook home directory (config/data subdirs will be created inside it).
    #[arg(long, global = true, env = "OUTLOOK_HOME")]
    pub home: Option<PathBuf>,

    /// Pretend today is this date (YYYY-MM-DD). Anchors the horizon and realized marks.
    #[arg(long, global = true, env = "OUTLOOK_TODAY")]
    pub today: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Income entries.
    Income(CashArgs),
    /// Expense entries.
    Expense(CashArgs),
    /// Investment contributions.
    Invest(InvestArgs),
    /// Portfolio allocations already held today.
    Alloc(AllocArgs),
    Loan(LoanArgs),
    /// Toggle whether an entry is already settled for a month.
    Realize(RealizeArgs),
    Savings(SavingsArgs),

    /// Month-by-month projection.
    Project(ProjectArgs),
    /// Entries touching one month.
    Month(MonthArgs),
    /// Flattened data for an assistant prompt.
    Context(ContextArgs),

    Export(ExportArgs),
    Import(ImportArgs),

    Config(ConfigArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecurrenceArg {
    OneTime,
    Monthly,
}

impl From<RecurrenceArg> for Recurrence {
    fn from(arg: RecurrenceArg) -> Self {
        match arg {
            RecurrenceArg::OneTime => Recurrence::OneTime,
            RecurrenceArg::Monthly => Recurrence::Monthly,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct NewEntryFlags {
    #[arg(long, short = 'd', alias = "note")]
    pub description: Option<String>,

    /// Start date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Repeat every month from the start date on.
    #[arg(long)]
    pub monthly: bool,
}

#[derive(Debug, Args, Clone)]
pub struct EditEntryFlags {
    #[arg(long)]
    pub amount: Option<String>,

    #[arg(long, short = 'd', alias = "note")]
    pub description: Option<String>,

    #[arg(long)]
    pub date: Option<String>,

    #[arg(long, value_enum)]
    pub recurrence: Option<RecurrenceArg>,
}

#[derive(Debug, Subcommand)]
pub enum CashCmd {
    Add {
        amount: String,
        #[command(flatten)]
        flags: NewEntryFlags,
    },
    List,
    Rm {
        id: String,
    },
    Edit {
        id: String,
        #[command(flatten)]
        flags: EditEntryFlags,
    },
}

#[derive(Debug, Args)]
pub struct CashArgs {
    #[command(subcommand)]
    pub cmd: CashCmd,
}

#[derive(Debug, Subcommand)]
pub enum InvestCmd {
    Add {
        amount: String,
        #[command(flatten)]
        flags: NewEntryFlags,
        /// Expected yearly return in percent.
        #[arg(long, default_value = "0")]
        annual_return: String,
    },
    List,
    Rm {
        id: String,
    },
    Edit {
        id: String,
        #[command(flatten)]
        flags: EditEntryFlags,
        #[arg(long)]
        annual_return: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct InvestArgs {
    #[command(subcommand)]
    pub cmd: InvestCmd,
}

#[derive(Debug, Subcommand)]
pub enum AllocCmd {
    Add {
        amount: String,
        #[arg(long, short = 'd', alias = "note")]
        description: Option<String>,
        #[arg(long, default_value = "0")]
        annual_return: String,
    },
    List,
    Rm {
        id: String,
    },
    Edit {
        id: String,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long, short = 'd', alias = "note")]
        description: Option<String>,
        #[arg(long)]
        annual_return: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct AllocArgs {
    #[command(subcommand)]
    pub cmd: AllocCmd,
}

#[derive(Debug, Args)]
pub struct NewLoanArgs {
    /// Who the money goes to (give) or comes from (take).
    pub person: String,
    pub principal: String,

    /// Date the principal changes hands (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub start: Option<String>,

    /// Fixed monthly repayment, paid from the month after the start through --end.
    #[arg(long, conflicts_with = "manual", requires = "end")]
    pub monthly: Option<String>,

    /// Last repayment month (YYYY-MM-DD).
    #[arg(long, requires = "monthly")]
    pub end: Option<String>,

    /// Repayments are recorded one by one with `loan payout`.
    #[arg(long)]
    pub manual: bool,
}

#[derive(Debug, Subcommand)]
pub enum LoanCmd {
    /// Lend money out.
    Give(NewLoanArgs),
    /// Borrow money.
    Take(NewLoanArgs),
    /// Record a repayment on a manual loan.
    Payout {
        id: String,
        amount: String,
        #[arg(long)]
        date: Option<String>,
    },
    List,
    Rm {
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct LoanArgs {
    #[command(subcommand)]
    pub cmd: LoanCmd,
}

#[derive(Debug, Args)]
pub struct RealizeArgs {
    pub id: String,

    /// Month to toggle (YYYY-MM). Defaults to the current month.
    #[arg(long)]
    pub month: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum SavingsCmd {
    Set { amount: String },
    Show,
}

#[derive(Debug, Args)]
pub struct SavingsArgs {
    #[command(subcommand)]
    pub cmd: SavingsCmd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectFormat {
    Table,
    Tsv,
    Json,
}

fn months_parser() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..=MAX_HORIZON_MONTHS as u64)
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Number of months to project. Defaults to the configured horizon.
    #[arg(long, value_parser = months_parser())]
    pub months: Option<usize>,

    #[arg(long, value_enum, default_value_t = ProjectFormat::Table)]
    pub format: ProjectFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MonthFormat {
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct MonthArgs {
    /// Month to inspect (YYYY-MM).
    pub month: String,

    #[arg(long, value_enum, default_value_t = MonthFormat::Table)]
    pub format: MonthFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContextFormat {
    Json,
    Markdown,
}

#[derive(Debug, Args)]
pub struct ContextArgs {
    #[arg(long, value_parser = months_parser())]
    pub months: Option<usize>,

    #[arg(long, value_enum, default_value_t = ContextFormat::Json)]
    pub format: ContextFormat,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    pub path: PathBuf,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    pub path: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    Show,
    Set { key: String, value: String },
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub cmd: ConfigCmd,
}
