use std::path::Path;

use crate::error::Result;
use crate::fmt::plain;
use crate::models::Transaction;
use crate::reports::{ExpenseLine, LedgerReport};

pub const TRANSACTION_HEADERS: &[&str] = &[
    "id",
    "company",
    "account",
    "date",
    "description",
    "doc",
    "amount",
    "category",
    "supplier",
    "invoice_ref",
    "installment_label",
    "free_dates",
    "match_status",
    "origin",
    "flag_reason",
];

pub const EXPENSE_HEADERS: &[&str] = &["category", "count", "total"];

pub const LEDGER_HEADERS: &[&str] = &[
    "date",
    "description",
    "category",
    "supplier",
    "nf",
    "parcela",
    "account",
    "entrada",
    "saida",
    "saldo",
];

/// A header row plus string cells, ready for CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    fn with_headers(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

pub fn transactions_table(txns: &[Transaction]) -> CsvTable {
    let mut table = CsvTable::with_headers(TRANSACTION_HEADERS);
    for t in txns {
        let free_dates: Vec<String> = t.free_dates.iter().map(|d| d.to_string()).collect();
        table.rows.push(vec![
            t.id.clone(),
            t.company.clone(),
            t.account.clone(),
            t.date.map(|d| d.to_string()).unwrap_or_default(),
            t.description.clone(),
            t.doc.clone(),
            plain(t.amount),
            t.category_name().to_string(),
            t.supplier_name().to_string(),
            t.invoice_ref.clone(),
            t.installment_label.clone(),
            free_dates.join(";"),
            t.match_status.as_str().to_string(),
            t.origin.as_str().to_string(),
            t.flag_reason.clone().unwrap_or_default(),
        ]);
    }
    table
}

pub fn expenses_table(lines: &[ExpenseLine]) -> CsvTable {
    let mut table = CsvTable::with_headers(EXPENSE_HEADERS);
    for line in lines {
        table
            .rows
            .push(vec![line.category.clone(), line.count.to_string(), plain(line.total)]);
    }
    table
}

pub fn ledger_table(report: &LedgerReport) -> CsvTable {
    let mut table = CsvTable::with_headers(LEDGER_HEADERS);
    for row in &report.rows {
        table.rows.push(vec![
            row.date.to_string(),
            row.description.clone(),
            row.category.clone(),
            row.supplier.clone(),
            row.invoice_ref.clone(),
            row.installment_label.clone(),
            row.account.clone(),
            plain(row.inflow),
            plain(row.outflow),
            plain(row.balance),
        ]);
    }
    table
}

pub fn write_csv(table: &CsvTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    tracing::debug!(path = %path.display(), rows = table.rows.len(), "csv written");
    Ok(())
}
