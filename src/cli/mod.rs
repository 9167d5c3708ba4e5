pub mod backup;
pub mod categories;
pub mod categorize;
pub mod export;
pub mod import;
pub mod init;
pub mod matching;
pub mod report;
pub mod rules;
pub mod status;
pub mod transactions;
pub mod wipe;

use clap::{Parser, Subcommand, ValueEnum};

use crate::db::{open_store, SqliteStore};
use crate::error::{GestaoError, Result};
use crate::models::MatchStatus;
use crate::reports::ReportCategories;
use crate::session::Session;
use crate::settings::Settings;
use crate::store::{AmountSign, LedgerStore, TransactionFilter};

/// Settings and session shared by every command handler.
pub struct Context {
    pub settings: Settings,
    pub session: Session,
}

impl Context {
    pub fn open_store(&self) -> Result<SqliteStore> {
        self.session.require_auth()?;
        let db_path = self.settings.db_path();
        if !db_path.exists() {
            return Err(GestaoError::InvalidInput(
                "database not found; run `gestao init` first".to_string(),
            ));
        }
        open_store(&db_path)
    }

    pub fn report_categories(&self) -> ReportCategories {
        ReportCategories {
            payout: self.settings.payout_category.clone(),
            returns: self.settings.returns_category.clone(),
        }
    }

    pub fn check_company(&self, company: &str) -> Result<()> {
        if self.settings.companies.iter().any(|c| c == company) {
            Ok(())
        } else {
            Err(GestaoError::InvalidInput(format!(
                "unknown company '{company}' (configured: {})",
                self.settings.companies.join(", ")
            )))
        }
    }

    pub fn check_account(&self, account: &str) -> Result<()> {
        if self.settings.accounts.iter().any(|a| a == account) {
            Ok(())
        } else {
            Err(GestaoError::InvalidInput(format!(
                "unknown account '{account}' (configured: {})",
                self.settings.accounts.join(", ")
            )))
        }
    }
}

/// `YYYY-MM` -> (year, month).
pub(crate) fn parse_month(raw: &str) -> Result<(i32, u32)> {
    let invalid = || GestaoError::InvalidInput(format!("month must be YYYY-MM, got '{raw}'"));
    let (y, m) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

pub(crate) const SHORT_ID_LEN: usize = 12;

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Accept a full id or an unambiguous prefix of one.
pub(crate) fn resolve_id<S: LedgerStore>(store: &S, prefix: &str) -> Result<String> {
    if let Some(txn) = store.get_transaction(prefix)? {
        return Ok(txn.id);
    }
    if prefix.len() < 4 {
        return Err(GestaoError::UnknownTransaction(prefix.to_string()));
    }
    let matches: Vec<String> = store
        .query_transactions(&TransactionFilter::default())?
        .into_iter()
        .filter(|t| t.id.starts_with(prefix))
        .map(|t| t.id)
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.clone()),
        [] => Err(GestaoError::UnknownTransaction(prefix.to_string())),
        _ => Err(GestaoError::InvalidInput(format!("id prefix '{prefix}' is ambiguous"))),
    }
}

impl ListFilters {
    pub(crate) fn to_filter(&self) -> Result<TransactionFilter> {
        let mut filter = match (&self.month, &self.company) {
            (Some(month), Some(company)) => {
                let (year, month) = parse_month(month)?;
                TransactionFilter::for_month(company, year, month).unwrap_or_default()
            }
            (Some(_), None) => {
                return Err(GestaoError::InvalidInput("--month requires --company".to_string()));
            }
            (None, company) => TransactionFilter {
                company: company.clone(),
                ..Default::default()
            },
        };
        filter.sign = self.sign.map(AmountSign::from);
        filter.match_status = self.status.map(|s| match s {
            StatusArg::Pending => MatchStatus::Pending,
            StatusArg::NotApplicable => MatchStatus::NotApplicable,
            StatusArg::Reconciled => MatchStatus::Reconciled,
        });
        filter.category = self.category.clone();
        filter.text = self.search.clone();
        Ok(filter)
    }
}

#[derive(Parser)]
#[command(
    name = "gestao",
    version,
    about = "Bank and marketplace statement reconciliation with a monthly DRE."
)]
pub struct Cli {
    /// Password, when one is configured (prompted for otherwise)
    #[arg(long, global = true, env = "GESTAO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for gestao data (default: ~/Documents/gestao)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Prompt for a new access password
        #[arg(long = "set-password")]
        set_password: bool,
    },
    /// Import a bank or marketplace statement (CSV/XLSX).
    Import {
        /// Path to CSV or XLSX file
        file: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        account: String,
        /// Source column holding the date
        #[arg(long = "date-col")]
        date_col: Option<String>,
        /// Source column holding the description
        #[arg(long = "description-col")]
        description_col: Option<String>,
        /// Source column holding the document/reference number
        #[arg(long = "doc-col")]
        doc_col: Option<String>,
        /// Source column holding the signed amount
        #[arg(long = "amount-col")]
        amount_col: Option<String>,
        /// Source column holding the running balance
        #[arg(long = "balance-col")]
        balance_col: Option<String>,
    },
    /// Re-run classification rules on transactions with gaps.
    Categorize,
    /// List, add or erase transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Reconcile outflows against their documentation.
    Match {
        #[command(subcommand)]
        command: MatchCommands,
    },
    /// Manage classification rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Manage the category vocabulary.
    Categories {
        #[command(subcommand)]
        command: VocabCommands,
    },
    /// Manage the supplier vocabulary.
    Suppliers {
        #[command(subcommand)]
        command: VocabCommands,
    },
    /// Monthly reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export tables to CSV.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Show current database and summary statistics.
    Status,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/gestao-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Delete every transaction. Categories, suppliers and rules are kept.
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SignArg {
    In,
    Out,
}

impl From<SignArg> for AmountSign {
    fn from(s: SignArg) -> Self {
        match s {
            SignArg::In => AmountSign::Inbound,
            SignArg::Out => AmountSign::Outbound,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    NotApplicable,
    Reconciled,
}

#[derive(clap::Args, Clone, Default)]
pub struct ListFilters {
    #[arg(long)]
    pub company: Option<String>,
    /// Month filter: YYYY-MM
    #[arg(long)]
    pub month: Option<String>,
    #[arg(long, value_enum)]
    pub sign: Option<SignArg>,
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    #[arg(long)]
    pub category: Option<String>,
    /// Case-insensitive text in description or doc
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List transactions.
    List {
        #[command(flatten)]
        filters: ListFilters,
    },
    /// Record a transaction by hand.
    Add {
        #[arg(long)]
        company: String,
        #[arg(long)]
        account: String,
        /// Date: YYYY-MM-DD or DD/MM/YYYY
        #[arg(long)]
        date: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "")]
        doc: String,
        /// Signed amount, e.g. -1.234,56
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
    },
    /// Erase a manually entered transaction.
    Erase {
        /// Transaction ID (shown in `gestao transactions list`)
        id: String,
    },
}

#[derive(Subcommand)]
pub enum MatchCommands {
    /// Outflows awaiting reconciliation.
    Queue {
        #[arg(long)]
        company: String,
        /// Include reconciled and not-applicable outflows
        #[arg(long)]
        all: bool,
    },
    /// Save a match and mark the outflow reconciled.
    Save {
        id: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        supplier: Option<String>,
        /// Invoice (NF) reference
        #[arg(long, default_value = "")]
        nf: String,
        /// Installment label, e.g. 1/3
        #[arg(long, default_value = "")]
        installment: String,
        /// Free-form related date (repeat up to 3 times)
        #[arg(long = "free-date")]
        free_dates: Vec<String>,
    },
    /// Return a reconciled outflow to pending, keeping its match data.
    Reopen { id: String },
    /// Discard a match: clear its data and return it to pending.
    Undo { id: String },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules in evaluation order.
    List,
    /// Add a rule at the head of the list.
    Add {
        /// Comma-separated terms matched against the description
        #[arg(long, default_value = "")]
        terms: String,
        /// Comma-separated terms matched against the doc field
        #[arg(long = "doc-terms", default_value = "")]
        doc_terms: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        supplier: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum VocabCommands {
    /// List entries.
    List,
    /// Add an entry (no-op if it already exists).
    Add { name: String },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Income statement (DRE) for one month.
    Dre {
        #[arg(long)]
        company: String,
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Accounting ledger with consolidated payouts and running balance.
    Ledger {
        #[arg(long)]
        company: String,
        #[arg(long)]
        month: String,
    },
    /// Expenses grouped by category.
    Expenses {
        #[arg(long)]
        company: String,
        #[arg(long)]
        month: String,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export the filtered transaction view.
    Transactions {
        #[command(flatten)]
        filters: ListFilters,
        #[arg(long)]
        output: String,
    },
    /// Export the expense breakdown.
    Expenses {
        #[arg(long)]
        company: String,
        #[arg(long)]
        month: String,
        #[arg(long)]
        output: String,
    },
    /// Export the accounting ledger.
    Ledger {
        #[arg(long)]
        company: String,
        #[arg(long)]
        month: String,
        #[arg(long)]
        output: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2024-03").unwrap(), (2024, 3));
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("março").is_err());
    }

    #[test]
    fn test_cli_parses_match_save() {
        let cli = Cli::try_parse_from([
            "gestao", "match", "save", "abc", "--category", "Custo > Frete",
            "--free-date", "2024-04-01", "--free-date", "2024-05-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Match { command: MatchCommands::Save { id, free_dates, .. } } => {
                assert_eq!(id, "abc");
                assert_eq!(free_dates.len(), 2);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_cli_accepts_negative_amount() {
        let cli = Cli::try_parse_from([
            "gestao", "transactions", "add", "--company", "Alivvia", "--account", "Itaú",
            "--date", "2024-03-01", "--description", "Aluguel", "--amount", "-1.500,00",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Transactions { command: TransactionsCommands::Add { ref amount, .. } } if amount == "-1.500,00"
        ));
    }
}
