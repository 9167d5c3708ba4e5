use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GestaoError, Result};

/// Source column names for the five internal import fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapSettings {
    pub date: String,
    pub description: String,
    pub doc: String,
    pub amount: String,
    #[serde(default)]
    pub balance: String,
}

impl Default for ColumnMapSettings {
    fn default() -> Self {
        Self {
            date: "RELEASE_DATE".to_string(),
            description: "TRANSACTION_TYPE".to_string(),
            doc: "REFERENCE_ID".to_string(),
            amount: "TRANSACTION_NET_AMOUNT".to_string(),
            balance: "PARTIAL_BALANCE".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_companies")]
    pub companies: Vec<String>,
    #[serde(default = "default_accounts")]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub column_map: ColumnMapSettings,
    #[serde(default = "default_payout_category")]
    pub payout_category: String,
    #[serde(default = "default_returns_category")]
    pub returns_category: String,
    #[serde(default = "default_no_match_required")]
    pub no_match_required_categories: Vec<String>,
    #[serde(default)]
    pub password_sha256: Option<String>,
}

fn default_companies() -> Vec<String> {
    vec!["Alivvia".to_string(), "JCA".to_string()]
}

fn default_accounts() -> Vec<String> {
    ["Mercado Pago", "Banco do Brasil", "Itaú", "Outra"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_payout_category() -> String {
    "Receita > Vendas (marketplace)".to_string()
}

fn default_returns_category() -> String {
    "Receita > Estorno/Devolução".to_string()
}

fn default_no_match_required() -> Vec<String> {
    vec![
        "Despesas > Tarifas bancárias".to_string(),
        "Receita > Estorno/Devolução".to_string(),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            companies: default_companies(),
            accounts: default_accounts(),
            column_map: ColumnMapSettings::default(),
            payout_category: default_payout_category(),
            returns_category: default_returns_category(),
            no_match_required_categories: default_no_match_required(),
            password_sha256: None,
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("gestao.db")
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("GESTAO_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("gestao")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("gestao")
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed settings file");
            Settings::default()
        })
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| GestaoError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
