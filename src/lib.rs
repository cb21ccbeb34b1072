//! # Lead Intake
//!
//! Webhook intake service for chat leads. Inbound WhatsApp messages are
//! classified into business branches by keyword, appended to a per-phone
//! conversation in the branch's collection, and periodically mirrored into a
//! Google Sheets spreadsheet with one tab per branch.
//!
//! ## Architecture
//!
//! ```text
//! Interakt webhook → axum (/webhook) → classifier → SQLite (conversations)
//!                                                         ↓
//!                               export scheduler → Google Sheets (tabs)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lead_intake::{Config, AppState};
//! use lead_intake::intake::IntakeService;
//! use lead_intake::storage::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteStore::new(&config.database).await?);
//!     let intake = IntakeService::new(Some(store), config.collections.clone(), 3);
//!     let state = Arc::new(AppState::new(config, intake, None));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     lead_intake::server::serve(listener, state, std::future::pending()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Keyword classification of messages into branches.
pub mod classifier;
/// Configuration management.
#[allow(missing_docs)]
pub mod config;
/// Error types and result aliases for the application.
#[allow(missing_docs)]
pub mod error;
/// Spreadsheet export of stored conversations.
pub mod export;
/// Conversation append operation.
pub mod intake;
/// HTTP server and request handling.
pub mod server;
/// Google Sheets client and the export target seam.
pub mod sheets;
/// SQLite storage layer for conversations and branch memory.
pub mod storage;
/// Webhook payload parsing.
pub mod webhook;

pub use classifier::{classify, Branch};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, SharedState};
