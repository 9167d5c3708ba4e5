use crate::categorizer::categorize_transactions;
use crate::cli::Context;
use crate::error::Result;

pub fn run(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let result = categorize_transactions(&store, &ctx.settings.no_match_required_categories)?;
    println!(
        "{} categorized, {} still without category",
        result.categorized, result.still_unclassified
    );
    Ok(())
}
