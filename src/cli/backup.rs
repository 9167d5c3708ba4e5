use std::path::PathBuf;

use rusqlite::backup::Backup;

use crate::cli::Context;
use crate::error::Result;
use crate::fmt::format_bytes;

pub fn run(ctx: &Context, output: Option<String>) -> Result<()> {
    let store = ctx.open_store()?;
    let data_dir = PathBuf::from(&ctx.settings.data_dir);

    let dest_path = match output {
        Some(p) => PathBuf::from(p),
        None => {
            let backups_dir = data_dir.join("backups");
            std::fs::create_dir_all(&backups_dir)?;
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            backups_dir.join(format!("gestao-{stamp}.db"))
        }
    };

    let mut dest_conn = rusqlite::Connection::open(&dest_path)?;
    let backup = Backup::new(store.connection(), &mut dest_conn)?;
    backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;
    drop(backup);
    tracing::info!(path = %dest_path.display(), "backup written");

    let size = std::fs::metadata(&dest_path)?.len();
    println!("Backup saved to {}", dest_path.display());
    println!("Size: {}", format_bytes(size));
    Ok(())
}
