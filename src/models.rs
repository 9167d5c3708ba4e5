use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Reconciliation state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Pending,
    NotApplicable,
    Reconciled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::NotApplicable => "not_applicable",
            Self::Reconciled => "reconciled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "not_applicable" | "n/a" | "na" => Some(Self::NotApplicable),
            "reconciled" => Some(Self::Reconciled),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Imported,
    Manual,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::Manual => "manual",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "imported" => Some(Self::Imported),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Category label, e.g. `"Despesas > Frete"`. The `>` path is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Category(String);

impl Category {
    /// Trims the label; an empty label means "no category".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplier name. The empty string is the "unset" sentinel and maps to `None`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Supplier(String);

impl Supplier {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Supplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub company: String,
    pub account: String,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub doc: String,
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub category: Option<Category>,
    pub supplier: Option<Supplier>,
    pub invoice_ref: String,
    pub installment_label: String,
    pub free_dates: Vec<NaiveDate>,
    pub match_status: MatchStatus,
    pub origin: Origin,
    /// Set when normalization had to fall back to a sentinel value.
    pub flag_reason: Option<String>,
    /// Unmapped source columns, kept for diagnostics only.
    pub raw: BTreeMap<String, String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Transaction {
    pub fn is_outflow(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn is_flagged(&self) -> bool {
        self.flag_reason.is_some()
    }

    pub fn category_name(&self) -> &str {
        self.category.as_ref().map_or("", |c| c.as_str())
    }

    pub fn supplier_name(&self) -> &str {
        self.supplier.as_ref().map_or("", |s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRule {
    pub id: Option<i64>,
    pub match_terms: Vec<String>,
    pub match_doc_terms: Vec<String>,
    pub category: Option<Category>,
    pub supplier: Option<Supplier>,
}

impl ClassificationRule {
    /// Lower-cases, trims and de-duplicates terms; empty terms are dropped.
    pub fn new(
        match_terms: &[&str],
        match_doc_terms: &[&str],
        category: Option<Category>,
        supplier: Option<Supplier>,
    ) -> Self {
        Self {
            id: None,
            match_terms: clean_terms(match_terms.iter().copied()),
            match_doc_terms: clean_terms(match_doc_terms.iter().copied()),
            category,
            supplier,
        }
    }
}

pub(crate) fn clean_terms<'a>(terms: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let t = term.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

/// A source row after column mapping, before any parsing.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub date: String,
    pub description: String,
    pub doc: String,
    pub amount: String,
    pub balance: Option<String>,
    pub unmapped: BTreeMap<String, String>,
}

/// Intermediate representation from the normalizer before hashing and insert.
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub date: Option<NaiveDate>,
    pub description: String,
    pub doc: String,
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub problems: Vec<&'static str>,
    pub raw: BTreeMap<String, String>,
}

impl NormalizedRow {
    pub fn flag_reason(&self) -> Option<String> {
        if self.problems.is_empty() {
            None
        } else {
            Some(self.problems.join("; "))
        }
    }
}
