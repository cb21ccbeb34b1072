//! Mirror stored conversations into spreadsheet tabs.
//!
//! Every sync is a full overwrite: the tab is cleared, then the header and
//! every flattened message row are written back. Running it twice against an
//! unchanged store leaves the tab identical.

mod scheduler;

pub use scheduler::ExportScheduler;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::classifier::Branch;
use crate::config::CollectionConfig;
use crate::error::{ExportError, ExportResult, SheetsResult};
use crate::sheets::ExportTarget;
use crate::storage::{ConversationDocument, ConversationStore};

/// Header row written at the top of every export tab.
pub const EXPORT_HEADER: [&str; 4] = ["Timestamp", "Phone", "Message", "Branch"];

/// India Standard Time, UTC+05:30. No DST.
const IST_OFFSET_SECS: i32 = (5 * 60 + 30) * 60;

/// Display format for exported timestamps.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of one pass over all export branches, keyed by tab name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Rows written per tab.
    pub results: BTreeMap<String, usize>,
    /// Failure reason per tab.
    pub errors: BTreeMap<String, String>,
}

impl SyncReport {
    /// True when every branch synced.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Rows written across all tabs.
    pub fn total_rows(&self) -> usize {
        self.results.values().sum()
    }
}

/// Reads conversations from the store and rewrites the export tabs.
pub struct Exporter {
    store: Arc<dyn ConversationStore>,
    target: Arc<dyn ExportTarget>,
    collections: CollectionConfig,
    branches: Vec<Branch>,
    auto_create_tabs: bool,
}

impl Exporter {
    /// Create a new exporter over the given branches.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        target: Arc<dyn ExportTarget>,
        collections: CollectionConfig,
        branches: Vec<Branch>,
        auto_create_tabs: bool,
    ) -> Self {
        Self {
            store,
            target,
            collections,
            branches,
            auto_create_tabs,
        }
    }

    /// Branches this exporter mirrors.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Tab (and collection) name for a branch.
    pub fn tab_name(&self, branch: Branch) -> &str {
        self.collections.name(branch)
    }

    /// Sync every configured branch. A failing branch does not stop the rest.
    pub async fn sync_once(&self) -> SyncReport {
        let mut report = SyncReport::default();

        for &branch in &self.branches {
            let tab = self.tab_name(branch).to_string();
            match self.sync_branch(branch).await {
                Ok(rows) => {
                    report.results.insert(tab, rows);
                }
                Err(e) => {
                    error!(tab = %tab, error = %e, "Branch export failed");
                    report.errors.insert(tab, e.to_string());
                }
            }
        }

        info!(
            tabs = report.results.len(),
            failed = report.errors.len(),
            rows = report.total_rows(),
            "Sync complete"
        );
        report
    }

    /// Rewrite one branch's tab. Returns the number of data rows written.
    pub async fn sync_branch(&self, branch: Branch) -> ExportResult<usize> {
        if !self.branches.contains(&branch) {
            return Err(ExportError::BranchDisabled {
                branch: branch.to_string(),
            });
        }

        let collection = self.collections.name(branch);
        info!(collection, "Fetching conversations for export");

        let documents = self
            .store
            .list_conversations(collection)
            .await
            .map_err(|source| ExportError::Storage {
                collection: collection.to_string(),
                source,
            })?;

        let rows = flatten_rows(&documents, collection);
        let row_count = rows.len();

        let mut values: Vec<Vec<String>> = Vec::with_capacity(row_count + 1);
        values.push(EXPORT_HEADER.iter().map(|h| h.to_string()).collect());
        values.extend(rows);

        self.write_tab(collection, &values)
            .await
            .map_err(|source| ExportError::Sheets {
                tab: collection.to_string(),
                source,
            })?;

        info!(tab = collection, rows = row_count, "Updated sheet tab");
        Ok(row_count)
    }

    async fn write_tab(&self, tab: &str, values: &[Vec<String>]) -> SheetsResult<()> {
        if self.auto_create_tabs {
            let existing = self.target.list_tabs().await?;
            if !existing.iter().any(|t| t == tab) {
                self.target.add_tab(tab).await?;
            }
        }

        self.target.clear_tab(tab).await?;
        self.target.write_rows(tab, values).await?;
        Ok(())
    }
}

/// Flatten conversations into `[timestamp, phone, text, branch]` rows.
///
/// Documents keep their given order; messages keep arrival order.
pub fn flatten_rows(documents: &[ConversationDocument], branch_label: &str) -> Vec<Vec<String>> {
    documents
        .iter()
        .flat_map(|doc| {
            doc.messages.iter().map(move |m| {
                vec![
                    m.time.map(format_local).unwrap_or_default(),
                    doc.phone.clone(),
                    m.text.clone(),
                    branch_label.to_string(),
                ]
            })
        })
        .collect()
}

/// The India Standard Time offset.
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).expect("IST offset is less than a day")
}

/// Render a UTC instant as India Standard Time wall-clock text.
pub fn format_local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&ist()).format(TIMESTAMP_FORMAT).to_string()
}
