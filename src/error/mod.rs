use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sheets error: {0}")]
    Sheets(#[from] SheetsError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Google Sheets API errors
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised while mirroring a branch into its export tab
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Branch '{branch}' is not enabled for export")]
    BranchDisabled { branch: String },

    #[error("Failed to read collection '{collection}': {source}")]
    Storage {
        collection: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to write tab '{tab}': {source}")]
    Sheets {
        tab: String,
        #[source]
        source: SheetsError,
    },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for Sheets operations
pub type SheetsResult<T> = Result<T, SheetsError>;

/// Result type alias for export operations
pub type ExportResult<T> = Result<T, ExportError>;
