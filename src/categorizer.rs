use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{Category, ClassificationRule, MatchStatus, Supplier, Transaction};
use crate::store::{LedgerStore, TransactionFilter, TransactionUpdate};

/// Rules in priority order: index 0 is evaluated first.
///
/// Order carries meaning, so the only mutation is `insert_at_head` and the
/// only lookup is `evaluate_in_order`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    pub fn insert_at_head(&mut self, rule: ClassificationRule) {
        self.rules.insert(0, rule);
    }

    /// Matching rules, highest priority first.
    pub fn evaluate_in_order<'a>(
        &'a self,
        description: &str,
        doc: &str,
    ) -> impl Iterator<Item = &'a ClassificationRule> + 'a {
        let description = description.to_lowercase();
        let doc = doc.to_lowercase();
        self.rules
            .iter()
            .filter(move |rule| rule_matches(rule, &description, &doc))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// Inputs are already lower-cased; rule terms are stored lower-cased.
fn rule_matches(rule: &ClassificationRule, description: &str, doc: &str) -> bool {
    rule.match_terms.iter().any(|t| !t.is_empty() && description.contains(t.as_str()))
        || rule.match_doc_terms.iter().any(|t| !t.is_empty() && doc.contains(t.as_str()))
}

/// Fill an empty category and/or supplier from the rule set.
///
/// Each field takes its value from the first matching rule that provides
/// one. Fields that already hold a value are never overwritten. Returns
/// whether anything was filled.
pub fn apply_rules(rules: &RuleSet, txn: &mut Transaction) -> bool {
    if txn.category.is_some() && txn.supplier.is_some() {
        return false;
    }
    let mut changed = false;
    for rule in rules.evaluate_in_order(&txn.description, &txn.doc) {
        if txn.category.is_none() {
            if let Some(category) = &rule.category {
                txn.category = Some(category.clone());
                changed = true;
            }
        }
        if txn.supplier.is_none() {
            if let Some(supplier) = &rule.supplier {
                txn.supplier = Some(supplier.clone());
                changed = true;
            }
        }
        if txn.category.is_some() && txn.supplier.is_some() {
            break;
        }
    }
    changed
}

/// Status a transaction starts with, from its sign and classification.
pub fn initial_status(
    amount: Decimal,
    category: Option<&Category>,
    no_match_required: &[String],
) -> MatchStatus {
    if amount >= Decimal::ZERO {
        return MatchStatus::NotApplicable;
    }
    match category {
        Some(c) if no_match_required.iter().any(|n| n == c.as_str()) => MatchStatus::NotApplicable,
        _ => MatchStatus::Pending,
    }
}

/// Classify a transaction entering the ledger and assign its starting status.
/// Returns whether any rule filled a field.
pub fn classify_new(rules: &RuleSet, txn: &mut Transaction, no_match_required: &[String]) -> bool {
    let matched = apply_rules(rules, txn);
    txn.match_status = initial_status(txn.amount, txn.category.as_ref(), no_match_required);
    matched
}

/// First alphanumeric token of four or more characters, lower-cased.
pub fn keyword_for(description: &str) -> Option<String> {
    let lowered = description.trim().to_lowercase();
    keyword_re().find(&lowered).map(|m| m.as_str().to_string())
}

fn keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9]{4,}").expect("keyword regex"))
}

/// Rule learned from a manual match. Naive by nature: the keyword may be an
/// incidental word of the description.
pub fn learn_rule(
    description: &str,
    category: Option<&Category>,
    supplier: Option<&Supplier>,
) -> Option<ClassificationRule> {
    let category = category?;
    let token = keyword_for(description)?;
    Some(ClassificationRule::new(
        &[token.as_str()],
        &[],
        Some(category.clone()),
        supplier.cloned(),
    ))
}

pub struct CategorizeResult {
    pub categorized: usize,
    pub still_unclassified: usize,
}

/// Re-apply the rule set to stored transactions with gaps in their
/// classification. Reconciled transactions are left alone.
pub fn categorize_transactions<S: LedgerStore>(
    store: &S,
    no_match_required: &[String],
) -> Result<CategorizeResult> {
    let rules = store.list_rules()?;
    let candidates: Vec<Transaction> = store
        .query_transactions(&TransactionFilter::default())?
        .into_iter()
        .filter(|t| t.match_status != MatchStatus::Reconciled)
        .filter(|t| t.category.is_none() || t.supplier.is_none())
        .collect();

    store.atomically(|store| {
        let mut categorized = 0usize;
        let mut still_unclassified = 0usize;
        for mut txn in candidates {
            if !apply_rules(&rules, &mut txn) {
                if txn.category.is_none() {
                    still_unclassified += 1;
                }
                continue;
            }
            let mut update = TransactionUpdate {
                category: Some(txn.category.clone()),
                supplier: Some(txn.supplier.clone()),
                ..Default::default()
            };
            if txn.match_status == MatchStatus::Pending {
                let status = initial_status(txn.amount, txn.category.as_ref(), no_match_required);
                if status != txn.match_status {
                    update.match_status = Some(status);
                }
            }
            store.update_transaction(&txn.id, &update)?;
            tracing::debug!(id = %txn.id, category = txn.category_name(), "auto-classified");
            categorized += 1;
        }
        Ok(CategorizeResult {
            categorized,
            still_unclassified,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_store, SqliteStore};
    use crate::ledger::{add_manual_entry, ManualEntry};

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    /// Highest priority first.
    fn ordered(rules: Vec<ClassificationRule>) -> RuleSet {
        let mut set = RuleSet::default();
        for rule in rules.into_iter().rev() {
            set.insert_at_head(rule);
        }
        set
    }

    fn rule(terms: &[&str], doc_terms: &[&str], category: &str, supplier: &str) -> ClassificationRule {
        ClassificationRule::new(terms, doc_terms, Category::parse(category), Supplier::parse(supplier))
    }

    fn txn(description: &str, doc: &str) -> Transaction {
        Transaction {
            id: "t".into(),
            company: "Alivvia".into(),
            account: "Mercado Pago".into(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
            description: description.into(),
            doc: doc.into(),
            amount: Decimal::new(-1000, 2),
            balance: None,
            category: None,
            supplier: None,
            invoice_ref: String::new(),
            installment_label: String::new(),
            free_dates: vec![],
            match_status: MatchStatus::Pending,
            origin: crate::models::Origin::Imported,
            flag_reason: None,
            raw: Default::default(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_description_match_is_case_insensitive() {
        let rules = ordered(vec![rule(&["JadLog"], &[], "Custo > Frete", "")]);
        let mut t = txn("PAGAMENTO JADLOG LTDA", "");
        assert!(apply_rules(&rules, &mut t));
        assert_eq!(t.category_name(), "Custo > Frete");
        assert!(t.supplier.is_none());
    }

    #[test]
    fn test_doc_terms_match_doc_field_only() {
        let rules = ordered(vec![rule(&[], &["nf-77"], "Custo > Fornecedores", "Thor")]);
        let mut by_desc = txn("nf-77 in description", "");
        assert!(!apply_rules(&rules, &mut by_desc));
        let mut by_doc = txn("Pagamento", "REF NF-77/2024");
        assert!(apply_rules(&rules, &mut by_doc));
        assert_eq!(by_doc.supplier_name(), "Thor");
    }

    #[test]
    fn test_most_recent_rule_wins() {
        let mut rules = RuleSet::default();
        rules.insert_at_head(rule(&["frete"], &[], "Custo > Frete", ""));
        rules.insert_at_head(rule(&["frete"], &[], "Despesas > Marketing", ""));
        let mut t = txn("frete campanha", "");
        apply_rules(&rules, &mut t);
        assert_eq!(t.category_name(), "Despesas > Marketing");
    }

    #[test]
    fn test_never_overwrites_existing_fields() {
        let rules = ordered(vec![rule(&["thor"], &[], "Custo > Fornecedores", "Thor")]);
        let mut t = txn("THOR COMERCIO", "");
        t.category = Category::parse("Outros");
        t.supplier = Supplier::parse("Other Supplier");
        assert!(!apply_rules(&rules, &mut t));
        assert_eq!(t.category_name(), "Outros");
        assert_eq!(t.supplier_name(), "Other Supplier");
    }

    #[test]
    fn test_fills_only_the_gap() {
        let rules = ordered(vec![rule(&["thor"], &[], "Custo > Fornecedores", "Thor")]);
        let mut t = txn("THOR COMERCIO", "");
        t.category = Category::parse("Outros");
        assert!(apply_rules(&rules, &mut t));
        assert_eq!(t.category_name(), "Outros");
        assert_eq!(t.supplier_name(), "Thor");
    }

    #[test]
    fn test_supplier_from_later_rule_when_first_has_none() {
        let rules = ordered(vec![
            rule(&["thor"], &[], "Custo > Fornecedores", ""),
            rule(&["thor"], &[], "Outros", "Thor"),
        ]);
        let mut t = txn("THOR", "");
        apply_rules(&rules, &mut t);
        assert_eq!(t.category_name(), "Custo > Fornecedores");
        assert_eq!(t.supplier_name(), "Thor");
    }

    #[test]
    fn test_no_match_leaves_fields_empty() {
        let rules = ordered(vec![rule(&["tarifa"], &[], "Despesas > Tarifas bancárias", "")]);
        let mut t = txn("Compra aleatória", "");
        assert!(!apply_rules(&rules, &mut t));
        assert!(t.category.is_none());
    }

    #[test]
    fn test_initial_status() {
        let no_match = vec!["Despesas > Tarifas bancárias".to_string()];
        let fee = Category::parse("Despesas > Tarifas bancárias");
        let freight = Category::parse("Custo > Frete");
        assert_eq!(initial_status(Decimal::new(-5, 0), fee.as_ref(), &no_match), MatchStatus::NotApplicable);
        assert_eq!(initial_status(Decimal::new(-5, 0), freight.as_ref(), &no_match), MatchStatus::Pending);
        assert_eq!(initial_status(Decimal::new(-5, 0), None, &no_match), MatchStatus::Pending);
        assert_eq!(initial_status(Decimal::new(5, 0), fee.as_ref(), &no_match), MatchStatus::NotApplicable);
        assert_eq!(initial_status(Decimal::ZERO, None, &no_match), MatchStatus::NotApplicable);
    }

    #[test]
    fn test_keyword_for() {
        assert_eq!(keyword_for("PIX ENVIADO Jadlog"), Some("enviado".to_string()));
        assert_eq!(keyword_for("Pag 12 ab 2024"), Some("2024".to_string()));
        assert_eq!(keyword_for("a b c"), None);
        assert_eq!(keyword_for(""), None);
        assert_eq!(keyword_for("Água Sabesp"), Some("sabesp".to_string()));
        assert_eq!(keyword_for("Água Sabesp"), keyword_for("ÁGUA SABESP"));
    }

    #[test]
    fn test_learn_rule_requires_category_and_token() {
        let cat = Category::parse("Custo > Frete");
        let sup = Supplier::parse("Jadlog");
        let learned = learn_rule("Boleto JADLOG", cat.as_ref(), sup.as_ref()).unwrap();
        assert_eq!(learned.match_terms, vec!["boleto".to_string()]);
        assert!(learned.match_doc_terms.is_empty());
        assert_eq!(learned.category, cat);
        assert_eq!(learned.supplier, sup);
        assert!(learn_rule("Boleto JADLOG", None, sup.as_ref()).is_none());
        assert!(learn_rule("x y z", cat.as_ref(), None).is_none());
    }

    #[test]
    fn test_categorize_transactions_fills_gaps_in_store() {
        let (_dir, store) = test_store();
        let no_match = vec!["Despesas > Tarifas bancárias".to_string()];
        let id = add_manual_entry(
            &store,
            &ManualEntry {
                company: "Alivvia".into(),
                account: "Itaú".into(),
                date: "2024-03-01".into(),
                description: "Cobrança mensal".into(),
                doc: String::new(),
                amount: "-12,90".into(),
            },
            &no_match,
        )
        .unwrap();
        assert!(store.get_transaction(&id).unwrap().unwrap().category.is_none());

        store
            .append_rule(&rule(&["mensal"], &[], "Despesas > Tarifas bancárias", "Itaú"))
            .unwrap();
        let result = categorize_transactions(&store, &no_match).unwrap();
        assert_eq!(result.categorized, 1);

        let t = store.get_transaction(&id).unwrap().unwrap();
        assert_eq!(t.category_name(), "Despesas > Tarifas bancárias");
        assert_eq!(t.match_status, MatchStatus::NotApplicable);
    }
}
