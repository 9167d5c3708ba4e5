use crate::cli::Context;
use crate::error::{GestaoError, Result};
use crate::ledger::wipe_ledger;

pub fn run(ctx: &Context, yes: bool) -> Result<()> {
    if !yes {
        return Err(GestaoError::InvalidInput(
            "wipe deletes every transaction; pass --yes to confirm".to_string(),
        ));
    }
    let store = ctx.open_store()?;
    let removed = wipe_ledger(&store)?;
    println!("Removed {removed} transactions. Categories, suppliers and rules were kept.");
    Ok(())
}
