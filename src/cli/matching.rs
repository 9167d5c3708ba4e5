use comfy_table::{Cell, Table};

use crate::cli::transactions::{amount_cell, status_cell};
use crate::cli::{resolve_id, short_id, Context};
use crate::error::{GestaoError, Result};
use crate::models::{Category, Supplier};
use crate::normalizer::parse_date;
use crate::reconciler::{self, reconciliation_queue, MatchInput};

pub fn queue(ctx: &Context, company: &str, include_all: bool) -> Result<()> {
    ctx.check_company(company)?;
    let store = ctx.open_store()?;
    let txns = reconciliation_queue(&store, company, include_all)?;
    if txns.is_empty() {
        println!("Nothing to reconcile for {company}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Description", "Amount", "Category", "Supplier", "NF", "Installment", "Status",
    ]);
    for t in &txns {
        table.add_row(vec![
            Cell::new(short_id(&t.id)),
            Cell::new(t.date.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string())),
            Cell::new(&t.description),
            amount_cell(t.amount),
            Cell::new(t.category_name()),
            Cell::new(t.supplier_name()),
            Cell::new(&t.invoice_ref),
            Cell::new(&t.installment_label),
            status_cell(t.match_status),
        ]);
    }
    println!("Reconciliation queue: {company}\n{table}");
    println!("{} outflows", txns.len());
    Ok(())
}

pub fn save(
    ctx: &Context,
    id: &str,
    category: &str,
    supplier: Option<&str>,
    nf: &str,
    installment: &str,
    free_dates: &[String],
) -> Result<()> {
    let free_dates = free_dates
        .iter()
        .map(|raw| {
            parse_date(raw).ok_or_else(|| GestaoError::InvalidInput(format!("invalid free date '{raw}'")))
        })
        .collect::<Result<Vec<_>>>()?;
    let input = MatchInput {
        category: Category::parse(category),
        supplier: supplier.and_then(Supplier::parse),
        invoice_ref: nf.to_string(),
        installment_label: installment.to_string(),
        free_dates,
    };

    let store = ctx.open_store()?;
    let id = resolve_id(&store, id)?;
    let saved = reconciler::save_match(&store, &id, &input)?;
    println!(
        "Reconciled {}: {} / {}",
        short_id(&saved.id),
        saved.category_name(),
        if saved.supplier_name().is_empty() { "-" } else { saved.supplier_name() }
    );
    Ok(())
}

pub fn reopen(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let id = resolve_id(&store, id)?;
    reconciler::reopen(&store, &id)?;
    println!("Reopened {}", short_id(&id));
    Ok(())
}

pub fn undo(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let id = resolve_id(&store, id)?;
    reconciler::undo(&store, &id)?;
    println!("Undid match for {}", short_id(&id));
    Ok(())
}
