use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, SecondsFormat};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::categorizer::RuleSet;
use crate::error::{GestaoError, Result};
use crate::models::{
    clean_terms, Category, ClassificationRule, MatchStatus, Origin, Supplier, Transaction,
};
use crate::store::{AmountSign, LedgerStore, TransactionFilter, TransactionUpdate, Vocabulary, VocabularyCache};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    company TEXT NOT NULL,
    account TEXT NOT NULL,
    date TEXT,
    description TEXT NOT NULL DEFAULT '',
    doc TEXT NOT NULL DEFAULT '',
    amount TEXT NOT NULL,
    balance TEXT,
    category TEXT,
    supplier TEXT,
    invoice_ref TEXT NOT NULL DEFAULT '',
    installment_label TEXT NOT NULL DEFAULT '',
    free_dates TEXT NOT NULL DEFAULT '[]',
    match_status TEXT NOT NULL,
    origin TEXT NOT NULL,
    is_flagged INTEGER DEFAULT 0,
    flag_reason TEXT,
    raw_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_company_date ON transactions (company, date);

CREATE TABLE IF NOT EXISTS categories (
    name TEXT PRIMARY KEY,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS suppliers (
    name TEXT PRIMARY KEY,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    match_terms TEXT NOT NULL DEFAULT '[]',
    match_doc_terms TEXT NOT NULL DEFAULT '[]',
    category TEXT,
    supplier TEXT,
    priority INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);
";

const DEFAULT_CATEGORIES: &[&str] = &[
    "Receita > Vendas (marketplace)",
    "Receita > Estorno/Devolução",
    "Custo > Frete",
    "Custo > Fornecedores",
    "Despesas > Tarifas bancárias",
    "Despesas > Impostos/Taxas",
    "Despesas > Marketing",
    "Despesas > Salários/Encargos",
    "Transferência entre empresas",
    "Retirada dos sócios",
    "Outros",
];

const DEFAULT_SUPPLIERS: &[&str] = &["Thor"];

// (description terms, category, supplier), highest priority first.
const DEFAULT_RULES: &[(&[&str], &str, &str)] = &[
    (&["entrada de dinheiro", "pix recebido", "qris"], "Receita > Vendas (marketplace)", ""),
    (&["devolu", "estorno", "reembolso"], "Receita > Estorno/Devolução", ""),
    (&["tarifa", "iof", "taxa"], "Despesas > Tarifas bancárias", ""),
    (&["jadlog", "correios", "total express"], "Custo > Frete", ""),
    (&["thor"], "Custo > Fornecedores", "Thor"),
];

const TX_COLUMNS: &str = "id, company, account, date, description, doc, amount, balance, \
     category, supplier, invoice_ref, installment_label, free_dates, match_status, origin, \
     flag_reason, raw_json, created_at, updated_at";

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for name in DEFAULT_CATEGORIES {
            conn.execute("INSERT OR IGNORE INTO categories (name) VALUES (?1)", [name])?;
        }
        for name in DEFAULT_SUPPLIERS {
            conn.execute("INSERT OR IGNORE INTO suppliers (name) VALUES (?1)", [name])?;
        }
    }

    let rules: i64 = conn.query_row("SELECT count(*) FROM rules", [], |row| row.get(0))?;
    if rules == 0 {
        let total = DEFAULT_RULES.len() as i64;
        for (i, (terms, category, supplier)) in DEFAULT_RULES.iter().enumerate() {
            conn.execute(
                "INSERT INTO rules (match_terms, match_doc_terms, category, supplier, priority) \
                 VALUES (?1, '[]', ?2, ?3, ?4)",
                rusqlite::params![
                    serde_json::to_string(&clean_terms(terms.iter().copied()))?,
                    Category::parse(category).map(|c| c.as_str().to_string()),
                    Supplier::parse(supplier).map(|s| s.as_str().to_string()),
                    total - i as i64,
                ],
            )?;
        }
    }
    Ok(())
}

/// Open (creating if needed) the ledger database and wrap it as a store.
pub fn open_store(db_path: &Path) -> Result<SqliteStore> {
    let conn = get_connection(db_path)?;
    init_db(&conn)?;
    Ok(SqliteStore::new(conn))
}

pub struct LedgerStats {
    pub transactions: i64,
    pub pending: i64,
    pub flagged: i64,
    pub rules: i64,
    pub categories: i64,
    pub suppliers: i64,
}

pub struct SqliteStore {
    conn: Connection,
    vocab: VocabularyCache,
    depth: Cell<u32>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            vocab: VocabularyCache::default(),
            depth: Cell::new(0),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        let count = |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |r| r.get(0))?) };
        Ok(LedgerStats {
            transactions: count("SELECT count(*) FROM transactions")?,
            pending: count("SELECT count(*) FROM transactions WHERE match_status = 'pending'")?,
            flagged: count("SELECT count(*) FROM transactions WHERE is_flagged = 1")?,
            rules: count("SELECT count(*) FROM rules")?,
            categories: count("SELECT count(*) FROM categories")?,
            suppliers: count("SELECT count(*) FROM suppliers")?,
        })
    }

    fn vocabulary(&self) -> Result<Vocabulary> {
        self.vocab.get_or_load(|| {
            Ok(Vocabulary {
                categories: self.load_names("SELECT name FROM categories ORDER BY name", Category::parse)?,
                suppliers: self.load_names("SELECT name FROM suppliers ORDER BY name", Supplier::parse)?,
                rules: self.load_rules()?,
            })
        })
    }

    fn load_names<T>(&self, sql: &str, parse: fn(&str) -> Option<T>) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names.iter().filter_map(|n| parse(n)).collect())
    }

    fn load_rules(&self) -> Result<RuleSet> {
        let mut stmt = self.conn.prepare(
            "SELECT id, match_terms, match_doc_terms, category, supplier FROM rules \
             ORDER BY priority ASC, id ASC",
        )?;
        let raw: Vec<(i64, String, String, Option<String>, Option<String>)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Replay in append order so the newest rule ends up first.
        let mut rules = RuleSet::default();
        for (id, terms, doc_terms, category, supplier) in raw {
            let terms: Vec<String> = serde_json::from_str(&terms)?;
            let doc_terms: Vec<String> = serde_json::from_str(&doc_terms)?;
            rules.insert_at_head(ClassificationRule {
                id: Some(id),
                match_terms: clean_terms(terms.iter().map(String::as_str)),
                match_doc_terms: clean_terms(doc_terms.iter().map(String::as_str)),
                category: category.as_deref().and_then(Category::parse),
                supplier: supplier.as_deref().and_then(Supplier::parse),
            });
        }
        Ok(rules)
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn date_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    let free_dates: String = row.get(12)?;
    let free_dates: Vec<String> = serde_json::from_str(&free_dates).map_err(|e| conversion_error(12, e))?;
    let free_dates = free_dates
        .iter()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_error(12, e)))
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let status: String = row.get(13)?;
    let match_status = MatchStatus::parse(&status)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(13, "match_status".into(), Type::Text))?;
    let origin: String = row.get(14)?;
    let origin = Origin::parse(&origin)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(14, "origin".into(), Type::Text))?;

    let raw_json: String = row.get(16)?;
    let raw: BTreeMap<String, String> = serde_json::from_str(&raw_json).map_err(|e| conversion_error(16, e))?;

    let category: Option<String> = row.get(8)?;
    let supplier: Option<String> = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        company: row.get(1)?,
        account: row.get(2)?,
        date: date_col(row, 3)?,
        description: row.get(4)?,
        doc: row.get(5)?,
        amount: decimal_col(row, 6)?.unwrap_or_default(),
        balance: decimal_col(row, 7)?,
        category: category.as_deref().and_then(Category::parse),
        supplier: supplier.as_deref().and_then(Supplier::parse),
        invoice_ref: row.get(10)?,
        installment_label: row.get(11)?,
        free_dates,
        match_status,
        origin,
        flag_reason: row.get(15)?,
        raw,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

fn iso(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn free_dates_json(dates: &[NaiveDate]) -> Result<String> {
    Ok(serde_json::to_string(&dates.iter().map(iso).collect::<Vec<_>>())?)
}

impl LedgerStore for SqliteStore {
    fn find_existing_hashes(&self, hashes: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare_cached("SELECT 1 FROM transactions WHERE id = ?1")?;
        let mut existing = BTreeSet::new();
        for hash in hashes {
            if stmt.exists([hash])? {
                existing.insert(hash.clone());
            }
        }
        Ok(existing)
    }

    fn insert_transactions(&self, rows: &[Transaction]) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO transactions (id, company, account, date, description, doc, amount, \
             balance, category, supplier, invoice_ref, installment_label, free_dates, match_status, \
             origin, is_flagged, flag_reason, raw_json, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        )?;
        let mut inserted = 0usize;
        for t in rows {
            inserted += stmt.execute(rusqlite::params![
                t.id,
                t.company,
                t.account,
                t.date.as_ref().map(iso),
                t.description,
                t.doc,
                t.amount.to_string(),
                t.balance.map(|b| b.to_string()),
                t.category.as_ref().map(|c| c.as_str()),
                t.supplier.as_ref().map(|s| s.as_str()),
                t.invoice_ref,
                t.installment_label,
                free_dates_json(&t.free_dates)?,
                t.match_status.as_str(),
                t.origin.as_str(),
                t.is_flagged() as i32,
                t.flag_reason,
                serde_json::to_string(&t.raw)?,
                t.created_at,
                t.updated_at,
            ])?;
        }
        Ok(inserted)
    }

    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = ?1"))?;
        let mut rows = stmt.query_map([id], row_to_transaction)?;
        Ok(rows.next().transpose()?)
    }

    fn update_transaction(&self, id: &str, update: &TransactionUpdate) -> Result<()> {
        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(category) = &update.category {
            sets.push("category");
            params.push(Box::new(category.as_ref().map(|c| c.as_str().to_string())));
        }
        if let Some(supplier) = &update.supplier {
            sets.push("supplier");
            params.push(Box::new(supplier.as_ref().map(|s| s.as_str().to_string())));
        }
        if let Some(invoice_ref) = &update.invoice_ref {
            sets.push("invoice_ref");
            params.push(Box::new(invoice_ref.clone()));
        }
        if let Some(label) = &update.installment_label {
            sets.push("installment_label");
            params.push(Box::new(label.clone()));
        }
        if let Some(dates) = &update.free_dates {
            sets.push("free_dates");
            params.push(Box::new(free_dates_json(dates)?));
        }
        if let Some(status) = update.match_status {
            sets.push("match_status");
            params.push(Box::new(status.as_str()));
        }
        sets.push("updated_at");
        params.push(Box::new(now_timestamp()));

        let assignments: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect();
        params.push(Box::new(id.to_string()));
        let sql = format!(
            "UPDATE transactions SET {} WHERE id = ?{}",
            assignments.join(", "),
            params.len()
        );

        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let changed = self.conn.execute(&sql, param_refs.as_slice())?;
        if changed == 0 {
            return Err(GestaoError::UnknownTransaction(id.to_string()));
        }
        Ok(())
    }

    fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();
        let mut bind = |clause: &str, value: String, clauses: &mut Vec<String>| {
            params.push(value);
            clauses.push(clause.replace("?", &format!("?{}", params.len())));
        };

        if let Some(company) = &filter.company {
            bind("company = ?", company.clone(), &mut clauses);
        }
        if let Some(from) = &filter.date_from {
            bind("date >= ?", iso(from), &mut clauses);
        }
        if let Some(to) = &filter.date_to {
            bind("date <= ?", iso(to), &mut clauses);
        }
        if let Some(status) = filter.match_status {
            bind("match_status = ?", status.as_str().to_string(), &mut clauses);
        }
        if let Some(category) = &filter.category {
            bind("category = ?", category.clone(), &mut clauses);
        }
        match filter.sign {
            Some(AmountSign::Outbound) => clauses.push("CAST(amount AS REAL) < 0".to_string()),
            Some(AmountSign::Inbound) => clauses.push("CAST(amount AS REAL) >= 0".to_string()),
            None => {}
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {TX_COLUMNS} FROM transactions {where_clause} \
             ORDER BY date IS NULL, date, description, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let param_values: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let mut rows = stmt
            .query_map(param_values.as_slice(), row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // SQLite's lower() folds ASCII only, so text search runs here.
        if let Some(needle) = filter.text.as_deref().map(|t| t.trim().to_lowercase()) {
            if !needle.is_empty() {
                rows.retain(|t| {
                    t.description.to_lowercase().contains(&needle)
                        || t.doc.to_lowercase().contains(&needle)
                });
            }
        }
        Ok(rows)
    }

    fn delete_transaction(&self, id: &str) -> Result<bool> {
        Ok(self.conn.execute("DELETE FROM transactions WHERE id = ?1", [id])? > 0)
    }

    fn wipe_transactions(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM transactions", [])?)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.vocabulary()?.categories)
    }

    fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        Ok(self.vocabulary()?.suppliers)
    }

    fn list_rules(&self) -> Result<RuleSet> {
        Ok(self.vocabulary()?.rules)
    }

    fn add_category(&self, category: &Category) -> Result<bool> {
        let added = self
            .conn
            .execute("INSERT OR IGNORE INTO categories (name) VALUES (?1)", [category.as_str()])?;
        self.vocab.invalidate();
        Ok(added > 0)
    }

    fn add_supplier(&self, supplier: &Supplier) -> Result<bool> {
        let added = self
            .conn
            .execute("INSERT OR IGNORE INTO suppliers (name) VALUES (?1)", [supplier.as_str()])?;
        self.vocab.invalidate();
        Ok(added > 0)
    }

    fn append_rule(&self, rule: &ClassificationRule) -> Result<()> {
        self.conn.execute(
            "INSERT INTO rules (match_terms, match_doc_terms, category, supplier, priority) \
             VALUES (?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(priority), 0) + 1 FROM rules))",
            rusqlite::params![
                serde_json::to_string(&rule.match_terms)?,
                serde_json::to_string(&rule.match_doc_terms)?,
                rule.category.as_ref().map(|c| c.as_str()),
                rule.supplier.as_ref().map(|s| s.as_str()),
            ],
        )?;
        self.vocab.invalidate();
        Ok(())
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        // Nested calls join the outermost transaction.
        if self.depth.get() > 0 {
            return f(self);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.depth.set(1);
        let result = f(self);
        self.depth.set(0);
        match result {
            Ok(value) => match self.conn.execute_batch("COMMIT") {
                Ok(()) => Ok(value),
                Err(e) => {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    self.vocab.invalidate();
                    Err(e.into())
                }
            },
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                self.vocab.invalidate();
                Err(e)
            }
        }
    }
}
