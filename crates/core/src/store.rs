//! The persistence seam.
//!
//! [`KeyedStore`] is the only way domain code touches persisted rows. Every
//! operation is filter/value based; no entity handles survive across calls.

use async_trait::async_trait;

use crate::schema::{CellValue, TableSpec};

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The backend rejected the write (unique, not-null, check, foreign key).
    #[error("{0}")]
    Constraint(String),

    /// Any other backend failure (connectivity, type mismatch, ...).
    #[error("{0}")]
    Backend(String),
}

// ── Records and filters ──────────────────────────────────────────────

/// One column assignment in an upsert or patch.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub column: &'static str,
    pub value: CellValue,
}

impl Field {
    pub fn new(column: &'static str, value: CellValue) -> Self {
        Self { column, value }
    }
}

/// Comparison applied to a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(CellValue),
    NotEq(CellValue),
    In(Vec<CellValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub column: &'static str,
    pub condition: Condition,
}

/// Conjunction of column clauses. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub clauses: Vec<Clause>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: CellValue) -> Self {
        self.clauses.push(Clause {
            column,
            condition: Condition::Eq(value),
        });
        self
    }

    pub fn not_eq(mut self, column: &'static str, value: CellValue) -> Self {
        self.clauses.push(Clause {
            column,
            condition: Condition::NotEq(value),
        });
        self
    }

    pub fn is_in(mut self, column: &'static str, values: Vec<CellValue>) -> Self {
        self.clauses.push(Clause {
            column,
            condition: Condition::In(values),
        });
        self
    }

    /// Evaluate the filter against an in-memory row (SQL semantics: a NULL
    /// column never satisfies a comparison).
    pub fn matches(&self, row: &[Field]) -> bool {
        self.clauses.iter().all(|clause| {
            let value = row
                .iter()
                .find(|f| f.column == clause.column)
                .map(|f| &f.value)
                .unwrap_or(&CellValue::Null);
            if value.is_null() {
                return false;
            }
            match &clause.condition {
                Condition::Eq(v) => value == v,
                Condition::NotEq(v) => value != v,
                Condition::In(vs) => vs.contains(value),
            }
        })
    }
}

// ── Traits ───────────────────────────────────────────────────────────

/// Per-table keyed persistence.
///
/// Calls made directly on the store are unscoped and durable on return.
/// [`KeyedStore::begin`] opens a transaction for callers that need
/// all-or-nothing semantics.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Insert `row`, or merge its non-key columns into the row that shares
    /// its natural key.
    async fn upsert(&self, table: &'static TableSpec, row: &[Field]) -> Result<(), StoreError>;

    /// Apply `patch` to every row matching `filter`; returns rows matched.
    async fn update(
        &self,
        table: &'static TableSpec,
        filter: &Filter,
        patch: &[Field],
    ) -> Result<u64, StoreError>;

    async fn count(&self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError>;

    async fn delete(&self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError>;

    /// Read `column` from the first row matching `filter`.
    async fn lookup(
        &self,
        table: &'static TableSpec,
        filter: &Filter,
        column: &'static str,
    ) -> Result<Option<CellValue>, StoreError>;

    /// Sorted distinct non-null values of `column` among rows matching `filter`.
    async fn distinct(
        &self,
        table: &'static TableSpec,
        column: &'static str,
        filter: &Filter,
    ) -> Result<Vec<CellValue>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// A transaction opened by [`KeyedStore::begin`].
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn count(&mut self, table: &'static TableSpec, filter: &Filter)
        -> Result<u64, StoreError>;

    async fn delete(
        &mut self,
        table: &'static TableSpec,
        filter: &Filter,
    ) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
