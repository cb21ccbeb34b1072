//! Conversation append: classify an inbound message and persist it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::classifier::{classify, Branch};
use crate::config::CollectionConfig;
use crate::storage::{ConversationStore, UpsertOutcome};

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new conversation document was created.
    Created { branch: Branch },
    /// The message was appended to an existing conversation.
    Updated { branch: Branch },
    /// No store is available; the message was classified but not persisted.
    Skipped { branch: Branch },
    /// Every write attempt failed.
    Failed { branch: Branch, attempts: u32 },
}

impl AppendOutcome {
    /// Branch the message was classified into.
    pub fn branch(&self) -> Branch {
        match self {
            AppendOutcome::Created { branch }
            | AppendOutcome::Updated { branch }
            | AppendOutcome::Skipped { branch }
            | AppendOutcome::Failed { branch, .. } => *branch,
        }
    }

    /// Whether the message landed in the store.
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            AppendOutcome::Created { .. } | AppendOutcome::Updated { .. }
        )
    }
}

/// Classifies inbound messages and appends them to their branch collection.
#[derive(Clone)]
pub struct IntakeService {
    store: Option<Arc<dyn ConversationStore>>,
    collections: CollectionConfig,
    write_attempts: u32,
}

impl IntakeService {
    /// Create a new intake service.
    ///
    /// `store` is `None` when the database could not be reached at startup.
    pub fn new(
        store: Option<Arc<dyn ConversationStore>>,
        collections: CollectionConfig,
        write_attempts: u32,
    ) -> Self {
        Self {
            store,
            collections,
            write_attempts: write_attempts.max(1),
        }
    }

    /// Whether messages are being persisted.
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Collection names in use.
    pub fn collections(&self) -> &CollectionConfig {
        &self.collections
    }

    /// Classify `text` and append it to the conversation for `phone`.
    ///
    /// Store failures are retried, logged and swallowed; they never reach the
    /// caller.
    pub async fn append_message(&self, phone: &str, text: &str) -> AppendOutcome {
        let branch = classify(text);
        let collection = self.collections.name(branch);

        let Some(store) = self.store.as_ref() else {
            warn!(
                phone,
                branch = %branch,
                "Store not available, skipping persistence"
            );
            return AppendOutcome::Skipped { branch };
        };

        self.remember_branch(store.as_ref(), phone, collection).await;

        let now = Utc::now();
        for attempt in 1..=self.write_attempts {
            match store.append_message(collection, phone, text, now).await {
                Ok(UpsertOutcome::Created) => {
                    info!(collection, phone, "Created new conversation");
                    return AppendOutcome::Created { branch };
                }
                Ok(UpsertOutcome::Updated) => {
                    info!(collection, phone, "Appended message to conversation");
                    return AppendOutcome::Updated { branch };
                }
                Err(e) => {
                    warn!(
                        collection,
                        phone,
                        attempt,
                        max_attempts = self.write_attempts,
                        error = %e,
                        "Conversation upsert failed"
                    );
                }
            }
        }

        error!(
            collection,
            phone,
            attempts = self.write_attempts,
            "Giving up on conversation upsert"
        );
        AppendOutcome::Failed {
            branch,
            attempts: self.write_attempts,
        }
    }

    /// Record the detected branch for a phone number.
    ///
    /// Non-critical: failures are logged and never abort the append.
    async fn remember_branch(&self, store: &dyn ConversationStore, phone: &str, collection: &str) {
        let phone = phone.trim();
        match store.record_branch(phone, collection, Utc::now()).await {
            Ok(()) => info!(phone, branch = collection, "Updated branch memory"),
            Err(e) => warn!(phone, error = %e, "Failed to update branch memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_degraded_mode_still_classifies() {
        let service = IntakeService::new(None, CollectionConfig::default(), 3);

        let outcome = service.append_message("1", "Need an ecommerce site").await;

        assert_eq!(
            outcome,
            AppendOutcome::Skipped {
                branch: Branch::ECommerceLeads
            }
        );
        assert!(!outcome.is_persisted());
        assert!(!service.has_store());
    }

    #[test]
    fn test_outcome_branch() {
        let outcome = AppendOutcome::Failed {
            branch: Branch::StaticLeads,
            attempts: 3,
        };
        assert_eq!(outcome.branch(), Branch::StaticLeads);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let service = IntakeService::new(None, CollectionConfig::default(), 0);
        assert_eq!(service.write_attempts, 1);
    }
}
