use thiserror::Error;

#[derive(Error, Debug)]
pub enum GestaoError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing mandatory columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Transaction {0} is inbound and cannot be reconciled")]
    InboundNotReconcilable(String),

    #[error("A category is required to save a match")]
    CategoryRequired,

    #[error("At most 3 free dates are allowed, got {0}")]
    TooManyFreeDates(usize),

    #[error("Transaction {0} is not reconciled")]
    NotReconciled(String),

    #[error("Transaction {0} was imported; only manual entries can be erased")]
    NotManual(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Not authenticated")]
    AuthRequired,

    #[error("Incorrect password")]
    InvalidPassword,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, GestaoError>;
