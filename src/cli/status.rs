use crate::cli::Context;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::settings_file_exists;

pub fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;
    let db_path = settings.db_path();

    println!(
        "Settings:   {}",
        if settings_file_exists() { "saved" } else { "(defaults, run `gestao init`)" }
    );
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Companies:  {}", settings.companies.join(", "));
    println!("Accounts:   {}", settings.accounts.join(", "));
    println!(
        "Password:   {}",
        if settings.password_sha256.is_some() { "required" } else { "not set" }
    );

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let stats = ctx.open_store()?.stats()?;
        println!();
        println!("Transactions:  {}", stats.transactions);
        println!("Pending:       {}", stats.pending);
        println!("Flagged:       {}", stats.flagged);
        println!("Rules:         {}", stats.rules);
        println!("Categories:    {}", stats.categories);
        println!("Suppliers:     {}", stats.suppliers);
    } else {
        println!();
        println!("Database not found. Run `gestao init` to set up.");
    }

    Ok(())
}
