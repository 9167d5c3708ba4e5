mod categorizer;
mod cli;
mod db;
mod error;
mod export;
mod fmt;
mod hasher;
mod importer;
mod ledger;
mod logging;
mod models;
mod normalizer;
mod reconciler;
mod reports;
mod session;
mod settings;
mod store;

use clap::Parser;

use cli::{
    Cli, Commands, Context, ExportCommands, MatchCommands, ReportCommands, RulesCommands,
    TransactionsCommands, VocabCommands,
};
use error::Result;
use importer::ColumnMap;
use ledger::ManualEntry;
use session::Session;
use settings::load_settings;

fn main() {
    logging::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings();
    let session = Session::establish_interactive(&settings, cli.password)?;
    let ctx = Context { settings, session };

    match cli.command {
        Commands::Init { data_dir, set_password } => cli::init::run(&ctx, data_dir, set_password),
        Commands::Import {
            file,
            company,
            account,
            date_col,
            description_col,
            doc_col,
            amount_col,
            balance_col,
        } => {
            let overrides = ColumnMap {
                date: date_col,
                description: description_col,
                doc: doc_col,
                amount: amount_col,
                balance: balance_col,
            };
            cli::import::run(&ctx, &file, &company, &account, overrides)
        }
        Commands::Categorize => cli::categorize::run(&ctx),
        Commands::Transactions { command } => match command {
            TransactionsCommands::List { filters } => cli::transactions::list(&ctx, &filters),
            TransactionsCommands::Add {
                company,
                account,
                date,
                description,
                doc,
                amount,
            } => cli::transactions::add(
                &ctx,
                ManualEntry {
                    company,
                    account,
                    date,
                    description,
                    doc,
                    amount,
                },
            ),
            TransactionsCommands::Erase { id } => cli::transactions::erase(&ctx, &id),
        },
        Commands::Match { command } => match command {
            MatchCommands::Queue { company, all } => cli::matching::queue(&ctx, &company, all),
            MatchCommands::Save {
                id,
                category,
                supplier,
                nf,
                installment,
                free_dates,
            } => cli::matching::save(
                &ctx,
                &id,
                &category,
                supplier.as_deref(),
                &nf,
                &installment,
                &free_dates,
            ),
            MatchCommands::Reopen { id } => cli::matching::reopen(&ctx, &id),
            MatchCommands::Undo { id } => cli::matching::undo(&ctx, &id),
        },
        Commands::Rules { command } => match command {
            RulesCommands::List => cli::rules::list(&ctx),
            RulesCommands::Add {
                terms,
                doc_terms,
                category,
                supplier,
            } => cli::rules::add(&ctx, &terms, &doc_terms, category.as_deref(), supplier.as_deref()),
        },
        Commands::Categories { command } => match command {
            VocabCommands::List => cli::categories::list_categories(&ctx),
            VocabCommands::Add { name } => cli::categories::add_category(&ctx, &name),
        },
        Commands::Suppliers { command } => match command {
            VocabCommands::List => cli::categories::list_suppliers(&ctx),
            VocabCommands::Add { name } => cli::categories::add_supplier(&ctx, &name),
        },
        Commands::Report { command } => match command {
            ReportCommands::Dre { company, month } => cli::report::dre(&ctx, &company, &month),
            ReportCommands::Ledger { company, month } => cli::report::ledger(&ctx, &company, &month),
            ReportCommands::Expenses { company, month } => cli::report::expenses(&ctx, &company, &month),
        },
        Commands::Export { command } => match command {
            ExportCommands::Transactions { filters, output } => {
                cli::export::transactions(&ctx, &filters, &output)
            }
            ExportCommands::Expenses { company, month, output } => {
                cli::export::expenses(&ctx, &company, &month, &output)
            }
            ExportCommands::Ledger { company, month, output } => {
                cli::export::ledger(&ctx, &company, &month, &output)
            }
        },
        Commands::Status => cli::status::run(&ctx),
        Commands::Backup { output } => cli::backup::run(&ctx, output),
        Commands::Wipe { yes } => cli::wipe::run(&ctx, yes),
    }
}
