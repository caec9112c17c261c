//! # Account Lifecycle
//!
//! Each operation is one identity store call followed by one document store
//! call. The two writes are not atomic: if the identity call succeeds and the
//! document call fails, the identity change stays in place and the stores
//! disagree until someone reconciles them by hand. The mismatch is logged.
//!
//! ## Transitions
//!
//! - `active -> soft-deleted`: account disabled, `deletedAt` stamped
//! - `soft-deleted -> active`: account enabled, `deletedAt` removed
//! - `any -> gone`: account and document both deleted
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    documents::{FieldValue, Fields},
    error::StoreError,
    state::Admin,
};

pub const STATUS_FIELD: &str = "status";
pub const DELETED_AT_FIELD: &str = "deletedAt";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UserStatus {
    Active,
    SoftDeleted,
    DeletedPending,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::SoftDeleted => "soft-deleted",
            UserStatus::DeletedPending => "deleted-pending",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SoftDelete,
    Reactivate,
    PermanentDelete,
}

impl Operation {
    pub fn success_message(&self) -> &'static str {
        match self {
            Operation::SoftDelete => "User account soft-deleted successfully",
            Operation::Reactivate => "User account reactivated successfully",
            Operation::PermanentDelete => "User account permanently deleted",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::SoftDelete => "soft-delete",
            Operation::Reactivate => "reactivate",
            Operation::PermanentDelete => "permanent-delete",
        })
    }
}

pub fn soft_delete_fields(now: DateTime<Utc>) -> Fields {
    Fields::from([
        (
            STATUS_FIELD.to_string(),
            FieldValue::Text(UserStatus::SoftDeleted.to_string()),
        ),
        (DELETED_AT_FIELD.to_string(), FieldValue::Timestamp(now)),
    ])
}

pub fn reactivate_fields() -> Fields {
    Fields::from([
        (
            STATUS_FIELD.to_string(),
            FieldValue::Text(UserStatus::Active.to_string()),
        ),
        (DELETED_AT_FIELD.to_string(), FieldValue::Remove),
    ])
}

async fn run(
    admin: &Admin,
    collection: &str,
    operation: Operation,
    user_id: &str,
) -> Result<(), StoreError> {
    match operation {
        Operation::SoftDelete => {
            admin.identity.disable(user_id).await?;
            reconcile(
                operation,
                user_id,
                admin
                    .documents
                    .update(collection, user_id, soft_delete_fields(Utc::now()))
                    .await,
            )?;
        }
        Operation::Reactivate => {
            admin.identity.enable(user_id).await?;
            reconcile(
                operation,
                user_id,
                admin
                    .documents
                    .update(collection, user_id, reactivate_fields())
                    .await,
            )?;
        }
        Operation::PermanentDelete => {
            admin.identity.delete(user_id).await?;
            reconcile(
                operation,
                user_id,
                admin.documents.delete(collection, user_id).await,
            )?;
        }
    }

    info!(%user_id, %operation, "Account lifecycle operation completed");

    Ok(())
}

pub async fn soft_delete(admin: &Admin, collection: &str, user_id: &str) -> Result<(), StoreError> {
    run(admin, collection, Operation::SoftDelete, user_id).await
}

pub async fn reactivate(admin: &Admin, collection: &str, user_id: &str) -> Result<(), StoreError> {
    run(admin, collection, Operation::Reactivate, user_id).await
}

pub async fn permanently_delete(
    admin: &Admin,
    collection: &str,
    user_id: &str,
) -> Result<(), StoreError> {
    run(admin, collection, Operation::PermanentDelete, user_id).await
}

/// Second-step failures are passed through untouched; the identity change
/// already made is not undone.
fn reconcile(
    operation: Operation,
    user_id: &str,
    result: Result<(), StoreError>,
) -> Result<(), StoreError> {
    result.inspect_err(|e| {
        warn!(
            %user_id,
            %operation,
            error = %e,
            "Identity store updated but document store failed, stores are out of sync"
        );
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::fake::{Call, FakeDocuments, FakeIdentity, Journal};

    fn admin(journal: &Journal) -> (Arc<FakeIdentity>, Arc<FakeDocuments>, Admin) {
        let identity = Arc::new(FakeIdentity::new(journal.clone()));
        let documents = Arc::new(FakeDocuments::new(journal.clone()));
        let admin = Admin {
            identity: identity.clone(),
            documents: documents.clone(),
        };
        (identity, documents, admin)
    }

    #[test]
    fn test_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&UserStatus::SoftDeleted).unwrap(),
            "\"soft-deleted\""
        );
        assert_eq!(
            serde_json::from_str::<UserStatus>("\"deleted-pending\"").unwrap(),
            UserStatus::DeletedPending
        );
        assert_eq!(UserStatus::Active.to_string(), "active");
    }

    #[test]
    fn test_soft_delete_fields() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 12, 30, 0).unwrap();
        let fields = soft_delete_fields(now);

        assert_eq!(
            fields.get(STATUS_FIELD),
            Some(&FieldValue::Text("soft-deleted".to_string()))
        );
        assert_eq!(fields.get(DELETED_AT_FIELD), Some(&FieldValue::Timestamp(now)));
    }

    #[test]
    fn test_reactivate_clears_deleted_at() {
        let fields = reactivate_fields();

        assert_eq!(
            fields.get(STATUS_FIELD),
            Some(&FieldValue::Text("active".to_string()))
        );
        assert_eq!(fields.get(DELETED_AT_FIELD), Some(&FieldValue::Remove));
    }

    #[tokio::test]
    async fn test_soft_delete_then_reactivate() {
        let journal = Journal::default();
        let (identity, documents, admin) = admin(&journal);
        documents.insert("users", "u-1", UserStatus::Active).await;

        soft_delete(&admin, "users", "u-1").await.unwrap();

        assert!(identity.is_disabled("u-1").await);
        let doc = documents.stored("users", "u-1").await.unwrap();
        assert_eq!(doc[STATUS_FIELD], "soft-deleted");
        assert!(doc.contains_key(DELETED_AT_FIELD));

        reactivate(&admin, "users", "u-1").await.unwrap();

        assert!(!identity.is_disabled("u-1").await);
        let doc = documents.stored("users", "u-1").await.unwrap();
        assert_eq!(doc[STATUS_FIELD], "active");
        assert!(!doc.contains_key(DELETED_AT_FIELD));

        let calls = journal.calls().await;
        assert!(matches!(calls[0], Call::Disable(ref id) if id == "u-1"));
        assert!(matches!(calls[1], Call::Update { .. }));
        assert!(matches!(calls[2], Call::Enable(ref id) if id == "u-1"));
        assert!(matches!(calls[3], Call::Update { .. }));
    }

    #[tokio::test]
    async fn test_permanently_delete_removes_both() {
        let journal = Journal::default();
        let (identity, documents, admin) = admin(&journal);
        documents.insert("users", "u-1", UserStatus::SoftDeleted).await;

        permanently_delete(&admin, "users", "u-1").await.unwrap();

        assert!(identity.is_deleted("u-1").await);
        assert!(documents.stored("users", "u-1").await.is_none());
        assert_eq!(
            journal.calls().await,
            vec![
                Call::DeleteAccount("u-1".to_string()),
                Call::DeleteDocument {
                    collection: "users".to_string(),
                    id: "u-1".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_identity_failure_short_circuits() {
        let journal = Journal::default();
        let (identity, _documents, admin) = admin(&journal);
        identity.fail_with("USER_NOT_FOUND").await;

        let err = soft_delete(&admin, "users", "u-1").await.unwrap_err();

        assert_eq!(err.to_string(), "USER_NOT_FOUND");
        assert_eq!(journal.calls().await, vec![Call::Disable("u-1".to_string())]);
    }

    #[tokio::test]
    async fn test_document_failure_keeps_identity_change() {
        let journal = Journal::default();
        let (identity, documents, admin) = admin(&journal);
        documents.fail_with("deadline exceeded").await;

        let err = soft_delete(&admin, "users", "u-1").await.unwrap_err();

        assert_eq!(err.to_string(), "deadline exceeded");
        assert!(identity.is_disabled("u-1").await);
        assert_eq!(journal.calls().await.len(), 2);
    }
}
