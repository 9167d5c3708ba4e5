use crate::categorizer::classify_new;
use crate::db::now_timestamp;
use crate::error::{GestaoError, Result};
use crate::hasher::{manual_transaction_id, IdentityFields};
use crate::models::{MatchStatus, NormalizedRow, Origin, RawRow, Transaction};
use crate::normalizer::normalize_row;
use crate::store::LedgerStore;

/// Build an unclassified transaction from a normalized row.
pub(crate) fn new_transaction(
    id: String,
    company: &str,
    account: &str,
    row: NormalizedRow,
    origin: Origin,
) -> Transaction {
    let now = now_timestamp();
    let flag_reason = row.flag_reason();
    Transaction {
        id,
        company: company.to_string(),
        account: account.to_string(),
        date: row.date,
        description: row.description,
        doc: row.doc,
        amount: row.amount,
        balance: row.balance,
        category: None,
        supplier: None,
        invoice_ref: String::new(),
        installment_label: String::new(),
        free_dates: Vec::new(),
        match_status: MatchStatus::Pending,
        origin,
        flag_reason,
        raw: row.raw,
        created_at: now.clone(),
        updated_at: now,
    }
}

pub struct ManualEntry {
    pub company: String,
    pub account: String,
    pub date: String,
    pub description: String,
    pub doc: String,
    pub amount: String,
}

/// Record a user-entered transaction. Unlike imports, unparseable values are
/// rejected outright since the user can simply retype them.
pub fn add_manual_entry<S: LedgerStore>(
    store: &S,
    entry: &ManualEntry,
    no_match_required: &[String],
) -> Result<String> {
    let company = entry.company.trim();
    let account = entry.account.trim();
    if company.is_empty() || account.is_empty() {
        return Err(GestaoError::InvalidInput("company and account are required".to_string()));
    }

    let row = normalize_row(RawRow {
        date: entry.date.clone(),
        description: entry.description.clone(),
        doc: entry.doc.clone(),
        amount: entry.amount.clone(),
        balance: None,
        unmapped: Default::default(),
    });
    if let Some(reason) = row.flag_reason() {
        return Err(GestaoError::InvalidInput(reason));
    }

    let id = manual_transaction_id(&IdentityFields {
        company,
        account,
        date: row.date,
        description: &row.description,
        doc: &row.doc,
        amount: row.amount,
    });
    let mut txn = new_transaction(id.clone(), company, account, row, Origin::Manual);

    let rules = store.list_rules()?;
    classify_new(&rules, &mut txn, no_match_required);
    store.insert_transactions(&[txn])?;
    tracing::info!(%id, "manual entry recorded");
    Ok(id)
}

/// Physically delete a manual entry. Imported rows cannot be erased this way.
pub fn erase_manual_entry<S: LedgerStore>(store: &S, id: &str) -> Result<()> {
    let txn = store
        .get_transaction(id)?
        .ok_or_else(|| GestaoError::UnknownTransaction(id.to_string()))?;
    if txn.origin != Origin::Manual {
        return Err(GestaoError::NotManual(id.to_string()));
    }
    store.delete_transaction(id)?;
    tracing::info!(%id, "manual entry erased");
    Ok(())
}

/// Administrative wipe of every transaction. Vocabularies and rules survive.
pub fn wipe_ledger<S: LedgerStore>(store: &S) -> Result<usize> {
    let removed = store.wipe_transactions()?;
    tracing::warn!(removed, "ledger wiped");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_store, SqliteStore};
    use crate::store::TransactionFilter;
    use rust_decimal::Decimal;

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn entry(description: &str, amount: &str) -> ManualEntry {
        ManualEntry {
            company: "Alivvia".into(),
            account: "Itaú".into(),
            date: "05/03/2024".into(),
            description: description.into(),
            doc: String::new(),
            amount: amount.into(),
        }
    }

    #[test]
    fn test_identical_manual_entries_do_not_collide() {
        let (_dir, store) = test_store();
        let a = add_manual_entry(&store, &entry("Aluguel", "-1.500,00"), &[]).unwrap();
        let b = add_manual_entry(&store, &entry("Aluguel", "-1.500,00"), &[]).unwrap();
        assert_ne!(a, b);
        let all = store.query_transactions(&TransactionFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|t| t.origin == Origin::Manual));
        assert_eq!(all[0].amount, Decimal::new(-150000, 2));
    }

    #[test]
    fn test_manual_entry_is_classified() {
        let (_dir, store) = test_store();
        let fees = vec!["Despesas > Tarifas bancárias".to_string()];
        let id = add_manual_entry(&store, &entry("Tarifa pacote", "-30"), &fees).unwrap();
        let t = store.get_transaction(&id).unwrap().unwrap();
        assert_eq!(t.category_name(), "Despesas > Tarifas bancárias");
        assert_eq!(t.match_status, MatchStatus::NotApplicable);

        let id = add_manual_entry(&store, &entry("Aluguel", "-30"), &fees).unwrap();
        let t = store.get_transaction(&id).unwrap().unwrap();
        assert_eq!(t.match_status, MatchStatus::Pending);
    }

    #[test]
    fn test_manual_entry_rejects_bad_values() {
        let (_dir, store) = test_store();
        let mut bad_date = entry("Aluguel", "-30");
        bad_date.date = "ontem".into();
        assert!(matches!(
            add_manual_entry(&store, &bad_date, &[]),
            Err(GestaoError::InvalidInput(_))
        ));
        assert!(add_manual_entry(&store, &entry("Aluguel", "trinta"), &[]).is_err());
        assert_eq!(store.query_transactions(&TransactionFilter::default()).unwrap().len(), 0);
    }

    #[test]
    fn test_erase_only_manual() {
        let (_dir, store) = test_store();
        let id = add_manual_entry(&store, &entry("Aluguel", "-30"), &[]).unwrap();
        erase_manual_entry(&store, &id).unwrap();
        assert!(store.get_transaction(&id).unwrap().is_none());
        assert!(matches!(
            erase_manual_entry(&store, &id),
            Err(GestaoError::UnknownTransaction(_))
        ));

        let mut imported = new_transaction(
            "imp".into(),
            "Alivvia",
            "Itaú",
            normalize_row(RawRow {
                date: "2024-03-01".into(),
                amount: "-1".into(),
                ..Default::default()
            }),
            Origin::Imported,
        );
        imported.match_status = MatchStatus::Pending;
        store.insert_transactions(&[imported]).unwrap();
        assert!(matches!(erase_manual_entry(&store, "imp"), Err(GestaoError::NotManual(_))));
    }

    #[test]
    fn test_wipe_keeps_vocabularies() {
        let (_dir, store) = test_store();
        add_manual_entry(&store, &entry("Aluguel", "-30"), &[]).unwrap();
        assert_eq!(wipe_ledger(&store).unwrap(), 1);
        assert!(!store.list_categories().unwrap().is_empty());
        assert!(!store.list_rules().unwrap().is_empty());
    }
}
