use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::cli::{resolve_id, short_id, Context, ListFilters};
use crate::error::Result;
use crate::fmt::money;
use crate::ledger::{add_manual_entry, erase_manual_entry, ManualEntry};
use crate::models::{MatchStatus, Transaction};
use crate::store::LedgerStore;

pub(crate) fn amount_cell(amount: Decimal) -> Cell {
    if amount < Decimal::ZERO {
        Cell::new(money(amount).red())
    } else {
        Cell::new(money(amount).green())
    }
}

pub(crate) fn status_cell(status: MatchStatus) -> Cell {
    match status {
        MatchStatus::Pending => Cell::new(status.as_str().yellow()),
        MatchStatus::Reconciled => Cell::new(status.as_str().green()),
        MatchStatus::NotApplicable => Cell::new(status.as_str().dimmed()),
    }
}

pub(crate) fn transactions_view(txns: &[Transaction]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Account", "Description", "Doc", "Amount", "Category", "Supplier", "Status", "Flag",
    ]);
    for t in txns {
        table.add_row(vec![
            Cell::new(short_id(&t.id)),
            Cell::new(t.date.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string())),
            Cell::new(&t.account),
            Cell::new(&t.description),
            Cell::new(&t.doc),
            amount_cell(t.amount),
            Cell::new(t.category_name()),
            Cell::new(t.supplier_name()),
            status_cell(t.match_status),
            Cell::new(t.flag_reason.as_deref().unwrap_or_default().red()),
        ]);
    }
    table
}

pub fn list(ctx: &Context, filters: &ListFilters) -> Result<()> {
    let store = ctx.open_store()?;
    let txns = store.query_transactions(&filters.to_filter()?)?;
    if txns.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }
    let total: Decimal = txns.iter().map(|t| t.amount).sum();
    println!("Transactions\n{}", transactions_view(&txns));
    println!("{} transactions, net {}", txns.len(), money(total));
    Ok(())
}

pub fn add(ctx: &Context, entry: ManualEntry) -> Result<()> {
    ctx.check_company(&entry.company)?;
    ctx.check_account(&entry.account)?;
    let store = ctx.open_store()?;
    let id = add_manual_entry(&store, &entry, &ctx.settings.no_match_required_categories)?;
    let status = store
        .get_transaction(&id)?
        .map(|t| t.match_status.as_str())
        .unwrap_or_default();
    println!("Added {} ({status})", short_id(&id));
    Ok(())
}

pub fn erase(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let id = resolve_id(&store, id)?;
    erase_manual_entry(&store, &id)?;
    println!("Erased {}", short_id(&id));
    Ok(())
}
