use std::cell::RefCell;
use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::categorizer::RuleSet;
use crate::error::Result;
use crate::models::{Category, ClassificationRule, MatchStatus, Supplier, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSign {
    /// `amount >= 0`
    Inbound,
    /// `amount < 0`
    Outbound,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub company: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sign: Option<AmountSign>,
    pub match_status: Option<MatchStatus>,
    pub category: Option<String>,
    /// Case-insensitive substring of description or doc.
    pub text: Option<String>,
}

impl TransactionFilter {
    pub fn for_month(company: &str, year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            company: Some(company.to_string()),
            date_from: Some(first),
            date_to: next.pred_opt(),
            ..Default::default()
        })
    }
}

/// Partial update. `None` leaves a field unchanged; `updated_at` is always touched.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub category: Option<Option<Category>>,
    pub supplier: Option<Option<Supplier>>,
    pub invoice_ref: Option<String>,
    pub installment_label: Option<String>,
    pub free_dates: Option<Vec<NaiveDate>>,
    pub match_status: Option<MatchStatus>,
}

/// Persistence consumed by the engine. Every call is synchronous and
/// fallible; nothing retries.
pub trait LedgerStore {
    fn find_existing_hashes(&self, hashes: &BTreeSet<String>) -> Result<BTreeSet<String>>;

    /// Rows whose id already exists are skipped. Returns the number inserted.
    fn insert_transactions(&self, rows: &[Transaction]) -> Result<usize>;

    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>>;

    fn update_transaction(&self, id: &str, update: &TransactionUpdate) -> Result<()>;

    /// Ordered by date (undated last), then description, then id.
    fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;

    fn delete_transaction(&self, id: &str) -> Result<bool>;

    fn wipe_transactions(&self) -> Result<usize>;

    fn list_categories(&self) -> Result<Vec<Category>>;

    fn list_suppliers(&self) -> Result<Vec<Supplier>>;

    fn list_rules(&self) -> Result<RuleSet>;

    /// Returns false when the category already existed.
    fn add_category(&self, category: &Category) -> Result<bool>;

    fn add_supplier(&self, supplier: &Supplier) -> Result<bool>;

    /// Inserts at the head of the rule list.
    fn append_rule(&self, rule: &ClassificationRule) -> Result<()>;

    /// Run `f` as one unit of work: either every write lands or none does.
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T>;
}

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    pub categories: Vec<Category>,
    pub suppliers: Vec<Supplier>,
    pub rules: RuleSet,
}

/// Read-through cache for the rarely-changing vocabularies.
#[derive(Debug, Default)]
pub struct VocabularyCache {
    inner: RefCell<Option<Vocabulary>>,
}

impl VocabularyCache {
    pub fn get_or_load(&self, load: impl FnOnce() -> Result<Vocabulary>) -> Result<Vocabulary> {
        if let Some(vocab) = self.inner.borrow().as_ref() {
            return Ok(vocab.clone());
        }
        let vocab = load()?;
        *self.inner.borrow_mut() = Some(vocab.clone());
        Ok(vocab)
    }

    pub fn invalidate(&self) {
        self.inner.borrow_mut().take();
    }

    #[cfg(test)]
    pub fn is_loaded(&self) -> bool {
        self.inner.borrow().is_some()
    }
}
