use comfy_table::Table;

use crate::cli::Context;
use crate::error::{GestaoError, Result};
use crate::models::{Category, Supplier};
use crate::store::LedgerStore;

fn print_names<'a>(title: &str, names: impl Iterator<Item = &'a str>) {
    let mut table = Table::new();
    table.set_header(vec!["Name"]);
    for name in names {
        table.add_row(vec![name]);
    }
    println!("{title}\n{table}");
}

pub fn list_categories(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let categories = store.list_categories()?;
    print_names("Categories", categories.iter().map(|c| c.as_str()));
    Ok(())
}

pub fn add_category(ctx: &Context, name: &str) -> Result<()> {
    let category =
        Category::parse(name).ok_or_else(|| GestaoError::InvalidInput("category name is empty".to_string()))?;
    let store = ctx.open_store()?;
    if store.add_category(&category)? {
        println!("Added category: {category}");
    } else {
        println!("Category already exists: {category}");
    }
    Ok(())
}

pub fn list_suppliers(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let suppliers = store.list_suppliers()?;
    print_names("Suppliers", suppliers.iter().map(|s| s.as_str()));
    Ok(())
}

pub fn add_supplier(ctx: &Context, name: &str) -> Result<()> {
    let supplier =
        Supplier::parse(name).ok_or_else(|| GestaoError::InvalidInput("supplier name is empty".to_string()))?;
    let store = ctx.open_store()?;
    if store.add_supplier(&supplier)? {
        println!("Added supplier: {supplier}");
    } else {
        println!("Supplier already exists: {supplier}");
    }
    Ok(())
}
