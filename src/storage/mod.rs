//! Storage layer for lead conversations.
//!
//! Conversations are grouped into named collections, one per branch. Each
//! collection holds at most one [`ConversationDocument`] per phone number, and
//! a global branch memory table records the last branch seen for each phone.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// Follow-up status stamped on a conversation whenever a new message arrives.
pub const FOLLOWUP_PENDING: &str = "Pending";

/// A single inbound message inside a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntry {
    /// Message text as extracted from the webhook.
    pub text: String,
    /// When the message was received. `None` if the stored value was unreadable.
    pub time: Option<DateTime<Utc>>,
}

/// All messages received from one phone number within one branch collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDocument {
    /// Phone number, unique within the collection.
    pub phone: String,
    /// Messages in arrival order.
    pub messages: Vec<MessageEntry>,
    /// Follow-up marker, reset to [`FOLLOWUP_PENDING`] on every new message.
    pub followup_status: String,
    /// When the document was first created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the document was last touched.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Last branch detected for a phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchMemoryRecord {
    /// Trimmed phone number.
    pub phone: String,
    /// Collection name of the branch.
    pub branch: String,
    /// Time of the last classification.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Whether an upsert inserted a new conversation or extended an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First message for this phone in the collection.
    Created,
    /// Appended to an existing conversation.
    Updated,
}

/// Conversation persistence.
///
/// Implementations must make [`ConversationStore::append_message`] atomic per
/// (collection, phone): the message push, status update and timestamps either
/// all land or none do.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Cheap liveness probe.
    async fn ping(&self) -> StorageResult<()>;

    /// Upsert the branch memory record for a phone number.
    async fn record_branch(
        &self,
        phone: &str,
        branch: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Read back the branch memory record for a phone number.
    async fn get_branch_memory(&self, phone: &str) -> StorageResult<Option<BranchMemoryRecord>>;

    /// Push a message onto the conversation for `phone` in `collection`,
    /// creating the conversation if it does not exist yet.
    async fn append_message(
        &self,
        collection: &str,
        phone: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<UpsertOutcome>;

    /// Fetch one conversation.
    async fn get_conversation(
        &self,
        collection: &str,
        phone: &str,
    ) -> StorageResult<Option<ConversationDocument>>;

    /// Fetch every conversation in a collection, ordered by phone.
    async fn list_conversations(&self, collection: &str)
        -> StorageResult<Vec<ConversationDocument>>;
}

/// Parse a stored timestamp.
///
/// RFC 3339 values keep their offset; values without a zone are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Format a timestamp for storage.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-05-01T15:30:00+05:30").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_assumes_utc() {
        let ts = parse_timestamp("2024-05-01 10:00:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());

        let ts = parse_timestamp("2024-05-01T10:00:00.250").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let stored = format_timestamp(now);
        assert_eq!(stored, "2025-01-02T03:04:05.000000Z");
        assert_eq!(parse_timestamp(&stored), Some(now));
    }
}
