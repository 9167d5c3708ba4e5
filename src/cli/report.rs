use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};
use rust_decimal::Decimal;

use crate::cli::{parse_month, Context};
use crate::error::Result;
use crate::fmt::money;
use crate::reports;

fn money_cell(val: Decimal) -> Cell {
    Cell::new(money(val)).set_alignment(CellAlignment::Right)
}

pub fn dre(ctx: &Context, company: &str, month: &str) -> Result<()> {
    ctx.check_company(company)?;
    let (year, m) = parse_month(month)?;
    let store = ctx.open_store()?;
    let dre = reports::get_dre(&store, company, year, m, &ctx.report_categories())?;

    let mut table = Table::new();
    table.set_header(vec!["DRE", "Valor"]);
    table.add_row(vec![Cell::new("Receita bruta".green().bold()), money_cell(dre.gross_revenue)]);
    table.add_row(vec![Cell::new("  (-) Devoluções/Estornos"), money_cell(dre.returns)]);
    table.add_row(vec![Cell::new("Receita líquida".bold()), money_cell(dre.net_revenue)]);
    table.add_row(vec![Cell::new(""), Cell::new("")]);

    if !dre.expenses.is_empty() {
        table.add_row(vec![Cell::new("DESPESAS".red().bold()), Cell::new("")]);
        for line in &dre.expenses {
            table.add_row(vec![Cell::new(format!("  {}", line.category)), money_cell(line.total)]);
        }
        table.add_row(vec![Cell::new("Total despesas".bold()), money_cell(dre.total_expenses)]);
        table.add_row(vec![Cell::new(""), Cell::new("")]);
    }

    let result_label = if dre.result >= Decimal::ZERO {
        "RESULTADO".green().bold()
    } else {
        "RESULTADO".red().bold()
    };
    table.add_row(vec![Cell::new(result_label), money_cell(dre.result)]);

    println!("DRE {company} {month}\n{table}");
    Ok(())
}

pub fn expenses(ctx: &Context, company: &str, month: &str) -> Result<()> {
    ctx.check_company(company)?;
    let (year, m) = parse_month(month)?;
    let store = ctx.open_store()?;
    let lines = reports::get_expenses(&store, company, year, m, &ctx.report_categories())?;
    let total: Decimal = lines.iter().map(|l| l.total).sum();

    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "%", "Count"]);
    for line in &lines {
        let pct = if total.is_zero() {
            Decimal::ZERO
        } else {
            (line.total / total * Decimal::ONE_HUNDRED).round_dp(1)
        };
        table.add_row(vec![
            Cell::new(&line.category),
            money_cell(line.total),
            Cell::new(format!("{pct:.1}%")),
            Cell::new(line.count),
        ]);
    }
    table.add_row(vec![Cell::new("Total".bold()), money_cell(total), Cell::new(""), Cell::new("")]);
    println!("Expenses {company} {month}\n{table}");
    Ok(())
}

pub fn ledger(ctx: &Context, company: &str, month: &str) -> Result<()> {
    ctx.check_company(company)?;
    let (year, m) = parse_month(month)?;
    let store = ctx.open_store()?;
    let report = reports::get_ledger(&store, company, year, m, &ctx.report_categories())?;

    let mut table = Table::new();
    table.set_header(vec!["Date", "Description", "Category", "Supplier", "NF", "Parcela", "Entrada", "Saída", "Saldo"]);
    for row in &report.rows {
        let entrada = if row.inflow.is_zero() { Cell::new("") } else { money_cell(row.inflow) };
        let saida = if row.outflow.is_zero() { Cell::new("") } else { money_cell(row.outflow) };
        table.add_row(vec![
            Cell::new(row.date),
            Cell::new(&row.description),
            Cell::new(&row.category),
            Cell::new(&row.supplier),
            Cell::new(&row.invoice_ref),
            Cell::new(&row.installment_label),
            entrada,
            saida,
            money_cell(row.balance),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        money_cell(report.total_in),
        money_cell(report.total_out),
        money_cell(report.total_in - report.total_out),
    ]);
    println!("Ledger {company} {month}\n{table}");
    Ok(())
}
