use std::collections::BTreeMap;

use futures::future::try_join_all;
use serde::Serialize;

use super::executor::DeletionError;
use super::scope::{DeletionKind, DeletionScope, DeletionTarget, Selection};
use crate::schema::CellValue;
use crate::store::KeyedStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: CellValue,
    pub count: u64,
}

/// What one kind of a scope would remove.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindPreview {
    pub values: Vec<ValueCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<u64>,
}

impl KindPreview {
    pub fn total(&self) -> u64 {
        self.all
            .unwrap_or_else(|| self.values.iter().map(|v| v.count).sum())
    }
}

/// Only kinds the scope actually populates have an entry.
pub type DeletionPreview = BTreeMap<DeletionKind, KindPreview>;

/// Selector values currently present for one kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindOptions {
    pub values: Vec<CellValue>,
    /// Rows the kind's "all" flag would delete.
    pub all_count: u64,
}

pub type DeletionOptions = BTreeMap<DeletionKind, KindOptions>;

/// Read-only counting over a [`DeletionScope`].
pub struct PreviewCounter;

impl PreviewCounter {
    /// Count, per populated kind and selector value, the rows a scope would
    /// delete. Never mutates.
    pub async fn preview(
        store: &dyn KeyedStore,
        scope: &DeletionScope,
    ) -> Result<DeletionPreview, DeletionError> {
        let targets = scope.targets()?;
        let previews = try_join_all(targets.iter().map(|t| Self::count_target(store, t))).await?;

        Ok(targets
            .iter()
            .map(|t| t.kind)
            .zip(previews)
            .collect())
    }

    async fn count_target(
        store: &dyn KeyedStore,
        target: &DeletionTarget,
    ) -> Result<KindPreview, DeletionError> {
        let table = target.kind.table();
        match &target.selection {
            Selection::All => {
                let count = store.count(table, &target.filter()).await?;
                Ok(KindPreview {
                    values: Vec::new(),
                    all: Some(count),
                })
            }
            Selection::Values(values) => {
                let counts = try_join_all(values.iter().map(|value| async move {
                    let filter = target.value_filter(value);
                    store.count(table, &filter).await
                }))
                .await?;
                Ok(KindPreview {
                    values: values
                        .iter()
                        .cloned()
                        .zip(counts)
                        .map(|(value, count)| ValueCount { value, count })
                        .collect(),
                    all: None,
                })
            }
        }
    }

    /// Distinct selector values and "all" counts for every deletion kind.
    pub async fn options(store: &dyn KeyedStore) -> Result<DeletionOptions, DeletionError> {
        let per_kind = try_join_all(DeletionKind::ALL.iter().map(|kind| async move {
            let table = kind.table();
            let base = kind.base_filter();
            let values = store.distinct(table, kind.selector_column(), &base).await?;
            let all_count = store.count(table, &base).await?;
            Ok::<_, DeletionError>((*kind, KindOptions { values, all_count }))
        }))
        .await?;

        Ok(per_kind.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::deletion::scope::Selector;
    use crate::schema::{HOD, STAFF_MASTER, STUDENT_MASTER};
    use crate::store::Field;
    use crate::testing::MemoryStore;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn student(store: &MemoryStore, reg_no: &str, batch: &str) {
        store.insert(
            &STUDENT_MASTER,
            vec![
                Field::new("reg_no", text(reg_no)),
                Field::new("batch", text(batch)),
            ],
        );
    }

    #[tokio::test]
    async fn counts_each_selected_value() {
        let store = MemoryStore::default();
        for i in 0..5 {
            student(&store, &format!("A{i}"), "2020-2024");
        }
        for i in 0..7 {
            student(&store, &format!("B{i}"), "2021-2025");
        }
        student(&store, "C0", "2022-2026");

        let scope = DeletionScope::default().with(
            DeletionKind::Students,
            Selector::values(["2020-2024", "2021-2025"]),
        );
        let preview = PreviewCounter::preview(&store, &scope).await.unwrap();

        let students = &preview[&DeletionKind::Students];
        assert_eq!(
            students.values,
            vec![
                ValueCount { value: text("2020-2024"), count: 5 },
                ValueCount { value: text("2021-2025"), count: 7 },
            ]
        );
        assert_eq!(students.total(), 12);
        assert_eq!(preview.len(), 1);
    }

    #[tokio::test]
    async fn unpopulated_kinds_have_no_entry() {
        let store = MemoryStore::default();
        let scope = DeletionScope::default()
            .with(DeletionKind::Mentors, Selector::values(Vec::<String>::new()))
            .with(DeletionKind::Hods, Selector::all());

        let preview = PreviewCounter::preview(&store, &scope).await.unwrap();

        assert!(!preview.contains_key(&DeletionKind::Mentors));
        assert_eq!(preview[&DeletionKind::Hods].all, Some(0));
        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json, json!({"hods": {"values": [], "all": 0}}));
    }

    #[tokio::test]
    async fn preview_is_repeatable() {
        let store = MemoryStore::default();
        student(&store, "R1", "2021-2025");
        let scope = DeletionScope::default()
            .with(DeletionKind::Students, Selector::values(["2021-2025"]));

        let first = PreviewCounter::preview(&store, &scope).await.unwrap();
        let second = PreviewCounter::preview(&store, &scope).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.row_count(&STUDENT_MASTER), 1);
    }

    #[tokio::test]
    async fn options_list_values_and_all_counts() {
        let store = MemoryStore::default();
        student(&store, "R1", "2021-2025");
        student(&store, "R2", "2020-2024");
        student(&store, "R3", "2021-2025");
        store.insert(
            &STAFF_MASTER,
            vec![
                Field::new("staff_id", text("ADMIN")),
                Field::new("staff_dept", text("OFFICE")),
            ],
        );
        store.insert(
            &STAFF_MASTER,
            vec![
                Field::new("staff_id", text("S1")),
                Field::new("staff_dept", text("CSE")),
            ],
        );
        store.insert(&HOD, vec![Field::new("staff_id", text("S1"))]);

        let options = PreviewCounter::options(&store).await.unwrap();

        assert_eq!(options.len(), DeletionKind::ALL.len());
        let students = &options[&DeletionKind::Students];
        assert_eq!(students.values, vec![text("2020-2024"), text("2021-2025")]);
        assert_eq!(students.all_count, 3);

        let staff = &options[&DeletionKind::Staff];
        assert_eq!(staff.values, vec![text("CSE")]);
        assert_eq!(staff.all_count, 1);

        let hods = &options[&DeletionKind::Hods];
        assert!(hods.values.is_empty());
        assert_eq!(hods.all_count, 1);
    }
}
