mod auth;
mod client;
mod types;

pub use auth::{
    ServiceAccountKey, SheetsCredentials, TokenProvider, DEFAULT_TOKEN_URI, SPREADSHEETS_SCOPE,
};
pub use client::SheetsClient;
pub use types::*;

use async_trait::async_trait;

use crate::error::SheetsResult;

/// A spreadsheet-like destination for exported rows.
///
/// One tab per branch. [`SheetsClient`] is the production implementation.
#[async_trait]
pub trait ExportTarget: Send + Sync {
    /// Titles of the existing tabs.
    async fn list_tabs(&self) -> SheetsResult<Vec<String>>;

    /// Create a new empty tab.
    async fn add_tab(&self, title: &str) -> SheetsResult<()>;

    /// Remove every value from a tab.
    async fn clear_tab(&self, tab: &str) -> SheetsResult<()>;

    /// Write rows starting at the top-left cell of a tab. Returns rows written.
    async fn write_rows(&self, tab: &str, rows: &[Vec<String>]) -> SheetsResult<usize>;
}
