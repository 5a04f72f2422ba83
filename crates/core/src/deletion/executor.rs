use std::collections::BTreeMap;

use serde::Serialize;

use super::scope::{DeletionKind, DeletionScope, DeletionTarget, PRIVILEGED_ACCOUNT};
use crate::schema::{CellValue, CoercionError, STAFF_MASTER};
use crate::store::{Filter, KeyedStore, StoreError, StoreTransaction};

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("invalid credentials")]
    Unauthorized,

    #[error("invalid deletion scope: {0}")]
    InvalidScope(#[from] CoercionError),

    /// A read outside any transaction failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The transactional body failed and every kind was rolled back.
    #[error("deletion rolled back: {0}")]
    Transaction(StoreError),
}

/// Rows removed per kind. Produced only after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeletionReceipt {
    deleted: BTreeMap<DeletionKind, u64>,
}

impl DeletionReceipt {
    /// A receipt listing every kind with a zero count.
    fn empty() -> Self {
        Self {
            deleted: DeletionKind::ALL.iter().map(|k| (*k, 0)).collect(),
        }
    }

    pub fn get(&self, kind: DeletionKind) -> u64 {
        self.deleted.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.deleted.values().sum()
    }
}

/// Applies a [`DeletionScope`] across kinds in a single transaction.
pub struct DeletionExecutor;

impl DeletionExecutor {
    /// Check `credential` against the privileged account's stored password.
    pub async fn authorize(store: &dyn KeyedStore, credential: &str) -> Result<(), DeletionError> {
        if credential.is_empty() {
            return Err(DeletionError::Unauthorized);
        }

        let filter = Filter::all()
            .eq("staff_id", CellValue::Text(PRIVILEGED_ACCOUNT.to_string()))
            .eq("staff_pass", CellValue::Text(credential.to_string()));
        match store.count(&STAFF_MASTER, &filter).await? {
            0 => Err(DeletionError::Unauthorized),
            _ => Ok(()),
        }
    }

    /// Authorize, then count-then-delete every populated kind inside one
    /// transaction. Any failure rolls the whole scope back.
    pub async fn execute(
        store: &dyn KeyedStore,
        credential: &str,
        scope: &DeletionScope,
    ) -> Result<DeletionReceipt, DeletionError> {
        if let Err(err) = Self::authorize(store, credential).await {
            tracing::warn!(error = %err, "Rejected deletion request");
            return Err(err);
        }

        let targets = scope.targets()?;
        let mut tx = store.begin().await.map_err(DeletionError::Transaction)?;

        let mut receipt = DeletionReceipt::empty();
        match Self::apply(tx.as_mut(), &targets, &mut receipt).await {
            Ok(()) => {
                tx.commit().await.map_err(DeletionError::Transaction)?;
                tracing::info!(total = receipt.total(), kinds = targets.len(), "Deletion committed");
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback after failed deletion also failed");
                }
                tracing::error!(error = %err, "Deletion rolled back");
                Err(DeletionError::Transaction(err))
            }
        }
    }

    async fn apply(
        tx: &mut dyn StoreTransaction,
        targets: &[DeletionTarget],
        receipt: &mut DeletionReceipt,
    ) -> Result<(), StoreError> {
        for target in targets {
            let table = target.kind.table();
            let filter = target.filter();
            // The pre-delete count is the reported figure.
            let count = tx.count(table, &filter).await?;
            tx.delete(table, &filter).await?;
            tracing::debug!(kind = %target.kind, count, "Deleted rows");
            receipt.deleted.insert(target.kind, count);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::deletion::preview::PreviewCounter;
    use crate::deletion::scope::Selector;
    use crate::schema::{MENTOR, STUDENT_MASTER};
    use crate::store::Field;
    use crate::testing::MemoryStore;

    const PASSWORD: &str = "s3cret";

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::default();
        store.insert(
            &STAFF_MASTER,
            vec![
                Field::new("staff_id", text("ADMIN")),
                Field::new("staff_pass", text(PASSWORD)),
                Field::new("staff_dept", text("CSE")),
            ],
        );
        store.insert(
            &STAFF_MASTER,
            vec![
                Field::new("staff_id", text("S1")),
                Field::new("staff_pass", text("other")),
                Field::new("staff_dept", text("CSE")),
            ],
        );
        for (prefix, batch, n) in [("A", "2020-2024", 5), ("B", "2021-2025", 7)] {
            for i in 0..n {
                store.insert(
                    &STUDENT_MASTER,
                    vec![
                        Field::new("reg_no", text(&format!("{prefix}{i}"))),
                        Field::new("batch", text(batch)),
                    ],
                );
            }
        }
        store.insert(
            &MENTOR,
            vec![
                Field::new("staff_id", text("S1")),
                Field::new("academic_year", text("2023-2024")),
            ],
        );
        store
    }

    fn two_batches() -> DeletionScope {
        DeletionScope::default().with(
            DeletionKind::Students,
            Selector::values(["2020-2024", "2021-2025"]),
        )
    }

    #[tokio::test]
    async fn deleted_counts_match_preview() {
        let store = seeded();
        let scope = two_batches();

        let preview = PreviewCounter::preview(&store, &scope).await.unwrap();
        let receipt = DeletionExecutor::execute(&store, PASSWORD, &scope)
            .await
            .unwrap();

        assert_eq!(receipt.get(DeletionKind::Students), 12);
        assert_eq!(preview[&DeletionKind::Students].total(), 12);
        assert_eq!(store.row_count(&STUDENT_MASTER), 0);
        assert_eq!(
            serde_json::to_value(&receipt).unwrap(),
            json!({
                "students": 12,
                "mentors": 0,
                "mark_entries": 0,
                "reports": 0,
                "hods": 0,
                "staff": 0
            })
        );
    }

    #[tokio::test]
    async fn wrong_credential_changes_nothing() {
        let store = seeded();

        let err = DeletionExecutor::execute(&store, "guess", &two_batches())
            .await
            .unwrap_err();

        assert_matches!(err, DeletionError::Unauthorized);
        assert_eq!(store.row_count(&STUDENT_MASTER), 12);
    }

    #[tokio::test]
    async fn empty_credential_is_unauthorized() {
        let store = seeded();
        assert_matches!(
            DeletionExecutor::authorize(&store, "").await,
            Err(DeletionError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn non_privileged_password_is_unauthorized() {
        let store = seeded();
        assert_matches!(
            DeletionExecutor::authorize(&store, "other").await,
            Err(DeletionError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn failure_on_last_kind_rolls_back_every_kind() {
        let store = seeded();
        store.fail_deletes_on("staffmaster", StoreError::Backend("connection reset".into()));
        let scope = two_batches()
            .with(DeletionKind::Mentors, Selector::all())
            .with(DeletionKind::Staff, Selector::values(["CSE"]));

        let err = DeletionExecutor::execute(&store, PASSWORD, &scope)
            .await
            .unwrap_err();

        assert_matches!(err, DeletionError::Transaction(StoreError::Backend(_)));
        assert_eq!(store.row_count(&STUDENT_MASTER), 12);
        assert_eq!(store.row_count(&MENTOR), 1);
        assert_eq!(store.row_count(&STAFF_MASTER), 2);
    }

    #[tokio::test]
    async fn all_flag_deletes_every_row_of_the_kind() {
        let store = seeded();
        let scope = DeletionScope::default().with(
            DeletionKind::Students,
            Selector {
                values: vec![json!("2020-2024")],
                all: true,
            },
        );

        let receipt = DeletionExecutor::execute(&store, PASSWORD, &scope)
            .await
            .unwrap();

        assert_eq!(receipt.get(DeletionKind::Students), 12);
        assert_eq!(store.row_count(&STUDENT_MASTER), 0);
    }

    #[tokio::test]
    async fn privileged_account_survives_staff_deletion() {
        let store = seeded();
        let scope = DeletionScope::default().with(DeletionKind::Staff, Selector::all());

        let receipt = DeletionExecutor::execute(&store, PASSWORD, &scope)
            .await
            .unwrap();

        assert_eq!(receipt.get(DeletionKind::Staff), 1);
        let remaining = store.rows(&STAFF_MASTER);
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].contains(&Field::new("staff_id", text("ADMIN"))));
    }

    #[tokio::test]
    async fn empty_scope_commits_a_zero_receipt() {
        let store = seeded();
        let receipt = DeletionExecutor::execute(&store, PASSWORD, &DeletionScope::default())
            .await
            .unwrap();
        assert_eq!(receipt.total(), 0);
        assert_eq!(store.row_count(&STUDENT_MASTER), 12);
    }
}
