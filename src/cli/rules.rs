use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::error::{GestaoError, Result};
use crate::models::{Category, ClassificationRule, Supplier};
use crate::store::LedgerStore;

pub fn add(
    ctx: &Context,
    terms: &str,
    doc_terms: &str,
    category: Option<&str>,
    supplier: Option<&str>,
) -> Result<()> {
    let terms: Vec<&str> = terms.split(',').collect();
    let doc_terms: Vec<&str> = doc_terms.split(',').collect();
    let rule = ClassificationRule::new(
        &terms,
        &doc_terms,
        category.and_then(Category::parse),
        supplier.and_then(Supplier::parse),
    );
    if rule.match_terms.is_empty() && rule.match_doc_terms.is_empty() {
        return Err(GestaoError::InvalidInput("a rule needs --terms or --doc-terms".to_string()));
    }
    if rule.category.is_none() && rule.supplier.is_none() {
        return Err(GestaoError::InvalidInput("a rule needs --category or --supplier".to_string()));
    }

    let store = ctx.open_store()?;
    store.atomically(|s| {
        if let Some(c) = &rule.category {
            s.add_category(c)?;
        }
        if let Some(sup) = &rule.supplier {
            s.add_supplier(sup)?;
        }
        s.append_rule(&rule)
    })?;
    println!(
        "Added rule: [{}] \u{2192} {}",
        rule.match_terms.iter().chain(&rule.match_doc_terms).cloned().collect::<Vec<_>>().join(", "),
        rule.category.as_ref().map_or("-", |c| c.as_str())
    );
    Ok(())
}

pub fn list(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let rules = store.list_rules()?;
    if rules.is_empty() {
        println!("No rules yet. Saving a match learns one.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Terms", "Doc terms", "Category", "Supplier"]);
    for (i, rule) in rules.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(rule.match_terms.join(", ")),
            Cell::new(rule.match_doc_terms.join(", ")),
            Cell::new(rule.category.as_ref().map_or("", |c| c.as_str())),
            Cell::new(rule.supplier.as_ref().map_or("", |s| s.as_str())),
        ]);
    }
    println!("Rules (evaluated top to bottom)\n{table}");
    println!("{} rules", rules.len());
    Ok(())
}
