use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{GestaoError, Result};
use crate::models::Transaction;
use crate::store::{LedgerStore, TransactionFilter};

pub const UNCATEGORIZED_LABEL: &str = "(sem categoria)";
pub const CONSOLIDATED_PAYOUT: &str = "Consolidated payout";

/// The two categories the DRE treats specially.
#[derive(Debug, Clone)]
pub struct ReportCategories {
    pub payout: String,
    pub returns: String,
}

fn month_transactions<S: LedgerStore>(
    store: &S,
    company: &str,
    year: i32,
    month: u32,
) -> Result<Vec<Transaction>> {
    let filter = TransactionFilter::for_month(company, year, month)
        .ok_or_else(|| GestaoError::InvalidInput(format!("invalid month {year}-{month:02}")))?;
    store.query_transactions(&filter)
}

fn is_payout(txn: &Transaction, cats: &ReportCategories) -> bool {
    !txn.is_outflow() && txn.category_name() == cats.payout
}

/// Same-day payouts summed into one figure per day.
fn consolidate_payouts(txns: &[Transaction], cats: &ReportCategories) -> BTreeMap<NaiveDate, Decimal> {
    let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for txn in txns.iter().filter(|t| is_payout(t, cats)) {
        if let Some(date) = txn.date {
            *by_day.entry(date).or_default() += txn.amount;
        }
    }
    by_day
}

// ---------------------------------------------------------------------------
// DRE
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseLine {
    pub category: String,
    pub total: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct DreReport {
    pub gross_revenue: Decimal,
    pub returns: Decimal,
    pub net_revenue: Decimal,
    pub expenses: Vec<ExpenseLine>,
    pub total_expenses: Decimal,
    pub result: Decimal,
}

/// Outflows grouped by category, largest expense first. Payouts and returns
/// are revenue lines, not expenses.
pub fn expense_breakdown(txns: &[Transaction], cats: &ReportCategories) -> Vec<ExpenseLine> {
    let mut groups: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    for txn in txns.iter().filter(|t| t.is_outflow()) {
        let name = txn.category_name();
        if name == cats.payout || name == cats.returns {
            continue;
        }
        let label = if name.is_empty() { UNCATEGORIZED_LABEL } else { name };
        let entry = groups.entry(label.to_string()).or_default();
        entry.0 += txn.amount;
        entry.1 += 1;
    }

    let mut lines: Vec<ExpenseLine> = groups
        .into_iter()
        .map(|(category, (total, count))| ExpenseLine { category, total, count })
        .collect();
    lines.sort_by(|a, b| a.total.cmp(&b.total).then_with(|| a.category.cmp(&b.category)));
    lines
}

pub fn build_dre(txns: &[Transaction], cats: &ReportCategories) -> DreReport {
    let gross_revenue: Decimal = consolidate_payouts(txns, cats).values().copied().sum();
    let returns: Decimal = txns
        .iter()
        .filter(|t| t.category_name() == cats.returns)
        .map(|t| t.amount)
        .sum();
    let net_revenue = gross_revenue + returns;
    let expenses = expense_breakdown(txns, cats);
    let total_expenses: Decimal = expenses.iter().map(|e| e.total).sum();

    DreReport {
        gross_revenue,
        returns,
        net_revenue,
        expenses,
        total_expenses,
        result: net_revenue + total_expenses,
    }
}

pub fn get_dre<S: LedgerStore>(
    store: &S,
    company: &str,
    year: i32,
    month: u32,
    cats: &ReportCategories,
) -> Result<DreReport> {
    let txns = month_transactions(store, company, year, month)?;
    Ok(build_dre(&txns, cats))
}

pub fn get_expenses<S: LedgerStore>(
    store: &S,
    company: &str,
    year: i32,
    month: u32,
    cats: &ReportCategories,
) -> Result<Vec<ExpenseLine>> {
    let txns = month_transactions(store, company, year, month)?;
    Ok(expense_breakdown(&txns, cats))
}

// ---------------------------------------------------------------------------
// Accounting ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub supplier: String,
    pub invoice_ref: String,
    pub installment_label: String,
    pub account: String,
    pub inflow: Decimal,
    pub outflow: Decimal,
    /// Display-only cumulative sum; never stored.
    pub balance: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct LedgerReport {
    pub rows: Vec<LedgerRow>,
    pub total_in: Decimal,
    pub total_out: Decimal,
}

struct Entry {
    date: NaiveDate,
    description: String,
    category: String,
    supplier: String,
    invoice_ref: String,
    installment_label: String,
    account: String,
    amount: Decimal,
}

pub fn build_ledger(txns: &[Transaction], cats: &ReportCategories) -> LedgerReport {
    let mut entries: Vec<Entry> = consolidate_payouts(txns, cats)
        .into_iter()
        .map(|(date, amount)| Entry {
            date,
            description: CONSOLIDATED_PAYOUT.to_string(),
            category: cats.payout.clone(),
            supplier: String::new(),
            invoice_ref: String::new(),
            installment_label: String::new(),
            account: String::new(),
            amount,
        })
        .collect();

    for txn in txns.iter().filter(|t| !is_payout(t, cats)) {
        let Some(date) = txn.date else { continue };
        entries.push(Entry {
            date,
            description: txn.description.clone(),
            category: txn.category_name().to_string(),
            supplier: txn.supplier_name().to_string(),
            invoice_ref: txn.invoice_ref.clone(),
            installment_label: txn.installment_label.clone(),
            account: txn.account.clone(),
            amount: txn.amount,
        });
    }
    entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.description.cmp(&b.description)));

    let mut report = LedgerReport::default();
    let mut balance = Decimal::ZERO;
    for e in entries {
        let (inflow, outflow) = if e.amount >= Decimal::ZERO {
            (e.amount, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -e.amount)
        };
        balance += inflow - outflow;
        report.total_in += inflow;
        report.total_out += outflow;
        report.rows.push(LedgerRow {
            date: e.date,
            description: e.description,
            category: e.category,
            supplier: e.supplier,
            invoice_ref: e.invoice_ref,
            installment_label: e.installment_label,
            account: e.account,
            inflow,
            outflow,
            balance,
        });
    }
    report
}

pub fn get_ledger<S: LedgerStore>(
    store: &S,
    company: &str,
    year: i32,
    month: u32,
    cats: &ReportCategories,
) -> Result<LedgerReport> {
    let txns = month_transactions(store, company, year, month)?;
    Ok(build_ledger(&txns, cats))
}
