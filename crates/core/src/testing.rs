//! In-memory [`KeyedStore`] and row fixtures for unit tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::ingest::RowRecord;
use crate::schema::{CellValue, TableSpec};
use crate::store::{Field, Filter, KeyedStore, StoreError, StoreTransaction};

type Tables = HashMap<&'static str, Vec<Vec<Field>>>;

#[derive(Default)]
struct State {
    tables: Tables,
    upsert_failures: HashMap<&'static str, StoreError>,
    delete_failures: HashMap<&'static str, StoreError>,
}

/// Store backed by plain vectors. Rows keep insertion order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Seed a row without going through upsert.
    pub fn insert(&self, table: &'static TableSpec, row: Vec<Field>) {
        self.lock().tables.entry(table.name).or_default().push(row);
    }

    pub fn rows(&self, table: &'static TableSpec) -> Vec<Vec<Field>> {
        self.lock()
            .tables
            .get(table.name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &'static TableSpec) -> usize {
        self.lock().tables.get(table.name).map_or(0, Vec::len)
    }

    /// Make every upsert into `table` fail with `err`.
    pub fn fail_upserts_on(&self, table: &'static str, err: StoreError) {
        self.lock().upsert_failures.insert(table, err);
    }

    /// Make every delete from `table` fail with `err`, inside transactions too.
    pub fn fail_deletes_on(&self, table: &'static str, err: StoreError) {
        self.lock().delete_failures.insert(table, err);
    }
}

fn value_of<'a>(row: &'a [Field], column: &str) -> &'a CellValue {
    row.iter()
        .find(|f| f.column == column)
        .map(|f| &f.value)
        .unwrap_or(&CellValue::Null)
}

fn merge(target: &mut Vec<Field>, patch: &[Field]) {
    for field in patch {
        match target.iter_mut().find(|f| f.column == field.column) {
            Some(existing) => existing.value = field.value.clone(),
            None => target.push(field.clone()),
        }
    }
}

fn compare(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Text(x), CellValue::Text(y)) => x.cmp(y),
        (CellValue::Integer(x), CellValue::Integer(y)) => x.cmp(y),
        (CellValue::Number(x), CellValue::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn count_in(tables: &Tables, table: &TableSpec, filter: &Filter) -> u64 {
    tables
        .get(table.name)
        .map_or(0, |rows| rows.iter().filter(|r| filter.matches(r)).count() as u64)
}

fn delete_in(tables: &mut Tables, table: &TableSpec, filter: &Filter) -> u64 {
    let Some(rows) = tables.get_mut(table.name) else {
        return 0;
    };
    let before = rows.len();
    rows.retain(|r| !filter.matches(r));
    (before - rows.len()) as u64
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn upsert(&self, table: &'static TableSpec, row: &[Field]) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(err) = state.upsert_failures.get(table.name) {
            return Err(err.clone());
        }

        let rows = state.tables.entry(table.name).or_default();
        let existing = rows.iter_mut().find(|candidate| {
            table
                .key
                .iter()
                .all(|key| value_of(candidate, key) == value_of(row, key))
        });
        match existing {
            Some(existing) => merge(existing, row),
            None => rows.push(row.to_vec()),
        }
        Ok(())
    }

    async fn update(
        &self,
        table: &'static TableSpec,
        filter: &Filter,
        patch: &[Field],
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut matched = 0;
        if let Some(rows) = state.tables.get_mut(table.name) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                merge(row, patch);
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn count(&self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError> {
        Ok(count_in(&self.lock().tables, table, filter))
    }

    async fn delete(&self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError> {
        let mut state = self.lock();
        if let Some(err) = state.delete_failures.get(table.name) {
            return Err(err.clone());
        }
        Ok(delete_in(&mut state.tables, table, filter))
    }

    async fn lookup(
        &self,
        table: &'static TableSpec,
        filter: &Filter,
        column: &'static str,
    ) -> Result<Option<CellValue>, StoreError> {
        Ok(self.lock().tables.get(table.name).and_then(|rows| {
            rows.iter()
                .find(|r| filter.matches(r))
                .map(|r| value_of(r, column).clone())
        }))
    }

    async fn distinct(
        &self,
        table: &'static TableSpec,
        column: &'static str,
        filter: &Filter,
    ) -> Result<Vec<CellValue>, StoreError> {
        let mut values: Vec<CellValue> = self
            .lock()
            .tables
            .get(table.name)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filter.matches(r))
                    .map(|r| value_of(r, column).clone())
                    .filter(|v| !v.is_null())
                    .collect()
            })
            .unwrap_or_default();
        values.sort_by(compare);
        values.dedup();
        Ok(values)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let working = self.lock().tables.clone();
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            working,
        }))
    }
}

/// Works on a copy of the tables; commit swaps the copy in.
struct MemoryTransaction {
    store: MemoryStore,
    working: Tables,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn count(&mut self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError> {
        Ok(count_in(&self.working, table, filter))
    }

    async fn delete(&mut self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError> {
        if let Some(err) = self.store.lock().delete_failures.get(table.name) {
            return Err(err.clone());
        }
        Ok(delete_in(&mut self.working, table, filter))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.store.lock().tables = this.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Build a [`RowRecord`] from a JSON object literal.
pub fn row(position: usize, value: Value) -> RowRecord {
    match value {
        Value::Object(map) => RowRecord::new(position, map),
        other => panic!("row fixture must be a JSON object, got {other}"),
    }
}
