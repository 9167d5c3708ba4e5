use std::path::PathBuf;

use crate::cli::Context;
use crate::error::Result;
use crate::importer::{import_file, ColumnMap};

/// `overrides` replaces the configured source column for each field it sets.
pub fn run(ctx: &Context, file: &str, company: &str, account: &str, overrides: ColumnMap) -> Result<()> {
    ctx.check_company(company)?;
    ctx.check_account(account)?;
    let store = ctx.open_store()?;

    let configured = ColumnMap::from(&ctx.settings.column_map);
    let map = ColumnMap {
        date: overrides.date.or(configured.date),
        description: overrides.description.or(configured.description),
        doc: overrides.doc.or(configured.doc),
        amount: overrides.amount.or(configured.amount),
        balance: overrides.balance.or(configured.balance),
    };

    let file_path = PathBuf::from(file);
    let result = import_file(
        &store,
        &file_path,
        company,
        account,
        &map,
        &ctx.settings.no_match_required_categories,
    )?;

    println!(
        "{} rows in file: {} new, {} already imported",
        result.total_in_file, result.newly_inserted, result.already_existing
    );
    println!(
        "{} auto-classified, {} flagged for review",
        result.auto_classified, result.flagged
    );
    Ok(())
}
