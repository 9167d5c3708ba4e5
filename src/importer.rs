use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::categorizer::classify_new;
use crate::error::{GestaoError, Result};
use crate::hasher::{transaction_id, IdentityFields};
use crate::ledger::new_transaction;
use crate::models::{Origin, RawRow, Transaction};
use crate::normalizer::normalize_row;
use crate::settings::ColumnMapSettings;
use crate::store::LedgerStore;

// ---------------------------------------------------------------------------
// Source tables
// ---------------------------------------------------------------------------

/// A row-oriented file as read from disk: header names plus string cells.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn read_table(file_path: &Path) -> Result<SourceTable> {
    let is_xlsx = file_path
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xls"));
    if is_xlsx {
        read_xlsx(file_path)
    } else {
        read_csv(file_path)
    }
}

/// Brazilian exports are often `;`-separated; pick whichever separator
/// dominates the header line.
fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn read_csv(file_path: &Path) -> Result<SourceTable> {
    let content = std::fs::read_to_string(file_path)?;
    let content = content.trim_start_matches('\u{feff}');
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(detect_delimiter(content))
        .from_reader(content.as_bytes());

    let headers = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(SourceTable { headers, rows })
}

#[cfg(feature = "xlsx")]
fn read_xlsx(file_path: &Path) -> Result<SourceTable> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| GestaoError::InvalidInput(format!("Failed to open workbook: {e}")))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| GestaoError::InvalidInput("Workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| GestaoError::InvalidInput(format!("Failed to read sheet {sheet}: {e}")))?;

    let mut sheet_rows = range.rows();
    let headers = sheet_rows
        .next()
        .map(|r| r.iter().map(|c| cell_to_string(c).trim().to_string()).collect())
        .unwrap_or_default();
    let rows = sheet_rows
        .map(|r| r.iter().map(cell_to_string).collect())
        .collect();
    Ok(SourceTable { headers, rows })
}

#[cfg(not(feature = "xlsx"))]
fn read_xlsx(file_path: &Path) -> Result<SourceTable> {
    Err(GestaoError::InvalidInput(format!(
        "{} is a spreadsheet; rebuild with the `xlsx` feature to import it",
        file_path.display()
    )))
}

#[cfg(feature = "xlsx")]
fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).unwrap_or_default(),
    }
}

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_date(serial: f64) -> Option<String> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = base.checked_add_signed(chrono::Duration::days(serial.trunc() as i64))?;
    Some(date.format("%Y-%m-%d").to_string())
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Which source column feeds each internal field. `None` = unmapped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    pub date: Option<String>,
    pub description: Option<String>,
    pub doc: Option<String>,
    pub amount: Option<String>,
    pub balance: Option<String>,
}

impl From<&ColumnMapSettings> for ColumnMap {
    fn from(s: &ColumnMapSettings) -> Self {
        let opt = |v: &str| Some(v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            date: opt(&s.date),
            description: opt(&s.description),
            doc: opt(&s.doc),
            amount: opt(&s.amount),
            balance: opt(&s.balance),
        }
    }
}

impl ColumnMap {
    /// Header index for each internal field. Mandatory fields that are
    /// unmapped or absent from the header fail the whole batch.
    fn resolve(&self, headers: &[String]) -> Result<ResolvedColumns> {
        let find = |col: &Option<String>| -> Option<usize> {
            let col = col.as_deref()?;
            headers.iter().position(|h| h == col)
        };
        let date = find(&self.date);
        let description = find(&self.description);
        let doc = find(&self.doc);
        let amount = find(&self.amount);

        let missing: Vec<String> = [
            ("date", date),
            ("description", description),
            ("doc", doc),
            ("amount", amount),
        ]
        .iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name.to_string())
        .collect();

        match (date, description, doc, amount) {
            (Some(date), Some(description), Some(doc), Some(amount)) => Ok(ResolvedColumns {
                date,
                description,
                doc,
                amount,
                balance: find(&self.balance),
            }),
            _ => Err(GestaoError::MissingColumns(missing)),
        }
    }
}

struct ResolvedColumns {
    date: usize,
    description: usize,
    doc: usize,
    amount: usize,
    balance: Option<usize>,
}

impl ResolvedColumns {
    fn is_mapped(&self, idx: usize) -> bool {
        [self.date, self.description, self.doc, self.amount].contains(&idx) || self.balance == Some(idx)
    }
}

/// Apply the column map. Unmapped columns go to the diagnostic sidecar.
pub fn map_rows(table: &SourceTable, map: &ColumnMap) -> Result<Vec<RawRow>> {
    let cols = map.resolve(&table.headers)?;
    let cell = |row: &[String], idx: usize| row.get(idx).cloned().unwrap_or_default();

    Ok(table
        .rows
        .iter()
        .map(|row| {
            let unmapped: BTreeMap<String, String> = table
                .headers
                .iter()
                .enumerate()
                .filter(|(i, h)| !cols.is_mapped(*i) && !h.is_empty())
                .filter_map(|(i, h)| row.get(i).map(|v| (h.clone(), v.clone())))
                .filter(|(_, v)| !v.trim().is_empty())
                .collect();
            RawRow {
                date: cell(row, cols.date),
                description: cell(row, cols.description),
                doc: cell(row, cols.doc),
                amount: cell(row, cols.amount),
                balance: cols.balance.map(|i| cell(row, i)),
                unmapped,
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportResult {
    pub total_in_file: usize,
    pub already_existing: usize,
    pub newly_inserted: usize,
    pub auto_classified: usize,
    pub flagged: usize,
}

/// Normalize, hash, de-duplicate, classify and insert one batch.
///
/// Rows whose id is already stored (or repeated earlier in the batch) are
/// skipped and counted, never reported as errors. The batch lands atomically.
pub fn import_rows<S: LedgerStore>(
    store: &S,
    company: &str,
    account: &str,
    raw_rows: Vec<RawRow>,
    no_match_required: &[String],
) -> Result<ImportResult> {
    let total_in_file = raw_rows.len();

    let mut seen = BTreeSet::new();
    let mut candidates: Vec<Transaction> = Vec::new();
    for raw in raw_rows {
        let row = normalize_row(raw);
        let id = transaction_id(&IdentityFields {
            company,
            account,
            date: row.date,
            description: &row.description,
            doc: &row.doc,
            amount: row.amount,
        });
        if seen.insert(id.clone()) {
            candidates.push(new_transaction(id, company, account, row, Origin::Imported));
        }
    }

    let existing = store.find_existing_hashes(&seen)?;
    let rules = store.list_rules()?;

    let mut auto_classified = 0usize;
    let mut flagged = 0usize;
    let mut fresh = Vec::new();
    for mut txn in candidates.into_iter().filter(|t| !existing.contains(&t.id)) {
        if classify_new(&rules, &mut txn, no_match_required) {
            auto_classified += 1;
        }
        if txn.is_flagged() {
            flagged += 1;
        }
        fresh.push(txn);
    }

    let newly_inserted = store.atomically(|s| s.insert_transactions(&fresh))?;
    let result = ImportResult {
        total_in_file,
        already_existing: total_in_file - newly_inserted,
        newly_inserted,
        auto_classified,
        flagged,
    };
    tracing::info!(
        company,
        account,
        total = result.total_in_file,
        existing = result.already_existing,
        inserted = result.newly_inserted,
        "import finished"
    );
    Ok(result)
}

pub fn import_file<S: LedgerStore>(
    store: &S,
    file_path: &Path,
    company: &str,
    account: &str,
    map: &ColumnMap,
    no_match_required: &[String],
) -> Result<ImportResult> {
    if company.trim().is_empty() || account.trim().is_empty() {
        return Err(GestaoError::InvalidInput("company and account are required".to_string()));
    }
    let table = read_table(file_path)?;
    let raw_rows = map_rows(&table, map)?;
    tracing::debug!(file = %file_path.display(), rows = raw_rows.len(), "read source file");
    import_rows(store, company.trim(), account.trim(), raw_rows, no_match_required)
}
