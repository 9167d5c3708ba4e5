use std::path::PathBuf;

use zeroize::Zeroize;

use crate::cli::Context;
use crate::db::{get_connection, init_db};
use crate::error::{GestaoError, Result};
use crate::session::hash_password;
use crate::settings::{save_settings, shellexpand_path};

fn prompt_new_password() -> Result<String> {
    let mut first = rpassword::prompt_password("New password: ")?;
    let mut confirm = rpassword::prompt_password("Confirm password: ")?;
    let outcome = if first.is_empty() {
        Err(GestaoError::InvalidInput("password cannot be empty".to_string()))
    } else if first != confirm {
        Err(GestaoError::InvalidInput("passwords do not match".to_string()))
    } else {
        Ok(hash_password(&first))
    };
    first.zeroize();
    confirm.zeroize();
    outcome
}

pub fn run(ctx: &Context, data_dir: Option<String>, set_password: bool) -> Result<()> {
    if ctx.settings.password_sha256.is_some() {
        ctx.session.require_auth()?;
    }
    let mut settings = ctx.settings.clone();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if set_password {
        settings.password_sha256 = Some(prompt_new_password()?);
        println!("Password updated.");
    }

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("exports"))?;
    save_settings(&settings)?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    println!("Initialized gestao at {}", resolved.display());
    Ok(())
}
