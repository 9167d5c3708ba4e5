use chrono::NaiveDate;

use crate::categorizer::learn_rule;
use crate::error::{GestaoError, Result};
use crate::models::{Category, MatchStatus, Supplier, Transaction};
use crate::store::{AmountSign, LedgerStore, TransactionFilter, TransactionUpdate};

pub const MAX_FREE_DATES: usize = 3;

/// What the user fills in when matching an outflow to its documentation.
#[derive(Debug, Clone, Default)]
pub struct MatchInput {
    pub category: Option<Category>,
    pub supplier: Option<Supplier>,
    pub invoice_ref: String,
    pub installment_label: String,
    pub free_dates: Vec<NaiveDate>,
}

/// Outflows for a company, pending ones only unless `include_all`.
pub fn reconciliation_queue<S: LedgerStore>(
    store: &S,
    company: &str,
    include_all: bool,
) -> Result<Vec<Transaction>> {
    let filter = TransactionFilter {
        company: Some(company.to_string()),
        sign: Some(AmountSign::Outbound),
        match_status: (!include_all).then_some(MatchStatus::Pending),
        ..Default::default()
    };
    store.query_transactions(&filter)
}

fn load_outflow<S: LedgerStore>(store: &S, id: &str) -> Result<Transaction> {
    let txn = store
        .get_transaction(id)?
        .ok_or_else(|| GestaoError::UnknownTransaction(id.to_string()))?;
    if !txn.is_outflow() {
        return Err(GestaoError::InboundNotReconcilable(id.to_string()));
    }
    Ok(txn)
}

/// Record the match and mark the transaction reconciled.
///
/// A category and supplier the vocabularies have not seen are added, and a
/// rule is learned from the description so similar rows classify themselves
/// on the next import. Saving over an already reconciled row overwrites it.
pub fn save_match<S: LedgerStore>(store: &S, id: &str, input: &MatchInput) -> Result<Transaction> {
    store.atomically(|store| {
        let txn = load_outflow(store, id)?;
        let category = input.category.as_ref().ok_or(GestaoError::CategoryRequired)?;
        if input.free_dates.len() > MAX_FREE_DATES {
            return Err(GestaoError::TooManyFreeDates(input.free_dates.len()));
        }

        store.update_transaction(
            id,
            &TransactionUpdate {
                category: Some(Some(category.clone())),
                supplier: Some(input.supplier.clone()),
                invoice_ref: Some(input.invoice_ref.trim().to_string()),
                installment_label: Some(input.installment_label.trim().to_string()),
                free_dates: Some(input.free_dates.clone()),
                match_status: Some(MatchStatus::Reconciled),
            },
        )?;

        store.add_category(category)?;
        if let Some(supplier) = &input.supplier {
            store.add_supplier(supplier)?;
        }
        if let Some(rule) = learn_rule(&txn.description, Some(category), input.supplier.as_ref()) {
            tracing::debug!(terms = ?rule.match_terms, category = %category, "learned rule");
            store.append_rule(&rule)?;
        }

        tracing::info!(%id, category = %category, "match saved");
        store
            .get_transaction(id)?
            .ok_or_else(|| GestaoError::UnknownTransaction(id.to_string()))
    })
}

fn require_reconciled<S: LedgerStore>(store: &S, id: &str) -> Result<Transaction> {
    let txn = load_outflow(store, id)?;
    if txn.match_status != MatchStatus::Reconciled {
        return Err(GestaoError::NotReconciled(id.to_string()));
    }
    Ok(txn)
}

/// Send a reconciled transaction back to the queue, keeping what was filled in.
pub fn reopen<S: LedgerStore>(store: &S, id: &str) -> Result<()> {
    require_reconciled(store, id)?;
    store.update_transaction(
        id,
        &TransactionUpdate {
            match_status: Some(MatchStatus::Pending),
            ..Default::default()
        },
    )?;
    tracing::info!(%id, "match reopened");
    Ok(())
}

/// Discard a match entirely: classification and match data are cleared and
/// the transaction goes back to pending. Learned rules are kept.
pub fn undo<S: LedgerStore>(store: &S, id: &str) -> Result<()> {
    require_reconciled(store, id)?;
    store.update_transaction(
        id,
        &TransactionUpdate {
            category: Some(None),
            supplier: Some(None),
            invoice_ref: Some(String::new()),
            installment_label: Some(String::new()),
            free_dates: Some(Vec::new()),
            match_status: Some(MatchStatus::Pending),
        },
    )?;
    tracing::info!(%id, "match undone");
    Ok(())
}
