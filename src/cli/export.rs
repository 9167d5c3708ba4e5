use std::path::PathBuf;

use crate::cli::{parse_month, Context, ListFilters};
use crate::error::Result;
use crate::export::{expenses_table, ledger_table, transactions_table, write_csv, CsvTable};
use crate::reports;
use crate::store::LedgerStore;

fn write(table: &CsvTable, output: &str) -> Result<()> {
    let path = PathBuf::from(output);
    write_csv(table, &path)?;
    println!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

pub fn transactions(ctx: &Context, filters: &ListFilters, output: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let txns = store.query_transactions(&filters.to_filter()?)?;
    write(&transactions_table(&txns), output)
}

pub fn expenses(ctx: &Context, company: &str, month: &str, output: &str) -> Result<()> {
    ctx.check_company(company)?;
    let (year, m) = parse_month(month)?;
    let store = ctx.open_store()?;
    let lines = reports::get_expenses(&store, company, year, m, &ctx.report_categories())?;
    write(&expenses_table(&lines), output)
}

pub fn ledger(ctx: &Context, company: &str, month: &str, output: &str) -> Result<()> {
    ctx.check_company(company)?;
    let (year, m) = parse_month(month)?;
    let store = ctx.open_store()?;
    let report = reports::get_ledger(&store, company, year, m, &ctx.report_categories())?;
    write(&ledger_table(&report), output)
}
