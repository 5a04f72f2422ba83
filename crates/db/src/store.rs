//! PostgreSQL implementation of the [`KeyedStore`] seam.
//!
//! Table and column identifiers come from the static schema in
//! `registrar_core::schema`; every value is sent as a bind parameter.

use async_trait::async_trait;
use sqlx::postgres::{PgDatabaseError, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use registrar_core::schema::{CellValue, Column, ColumnType, TableSpec};
use registrar_core::store::{Condition, Field, Filter, KeyedStore, StoreError, StoreTransaction};

/// `KeyedStore` over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyedStore for PgStore {
    async fn upsert(&self, table: &'static TableSpec, row: &[Field]) -> Result<(), StoreError> {
        let mut query = upsert_query(table, row)?;
        query
            .build()
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update(
        &self,
        table: &'static TableSpec,
        filter: &Filter,
        patch: &[Field],
    ) -> Result<u64, StoreError> {
        let mut query = update_query(table, filter, patch)?;
        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn count(&self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError> {
        let mut query = count_query(table, filter)?;
        let row = query
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        read_count(&row)
    }

    async fn delete(&self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError> {
        let mut query = delete_query(table, filter)?;
        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn lookup(
        &self,
        table: &'static TableSpec,
        filter: &Filter,
        column: &'static str,
    ) -> Result<Option<CellValue>, StoreError> {
        let column = declared(table, column)?;
        let mut query = QueryBuilder::new(format!(
            "SELECT \"{}\" FROM \"{}\"",
            column.name, table.name
        ));
        push_filter(&mut query, table, filter)?;
        query.push(" ORDER BY id LIMIT 1");

        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(|row| read_cell(&row, column)).transpose()
    }

    async fn distinct(
        &self,
        table: &'static TableSpec,
        column: &'static str,
        filter: &Filter,
    ) -> Result<Vec<CellValue>, StoreError> {
        let column = declared(table, column)?;
        let mut query = QueryBuilder::new(format!(
            "SELECT DISTINCT \"{}\" FROM \"{}\"",
            column.name, table.name
        ));
        push_filter(&mut query, table, filter)?;
        query.push(format!(
            " AND \"{0}\" IS NOT NULL ORDER BY \"{0}\"",
            column.name
        ));

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        rows.iter().map(|row| read_cell(row, column)).collect()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// A pool transaction. Dropping it without commit rolls back.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn count(&mut self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError> {
        let mut query = count_query(table, filter)?;
        let row = query
            .build()
            .fetch_one(&mut *self.tx)
            .await
            .map_err(store_error)?;
        read_count(&row)
    }

    async fn delete(&mut self, table: &'static TableSpec, filter: &Filter) -> Result<u64, StoreError> {
        let mut query = delete_query(table, filter)?;
        let result = query
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(store_error)
    }
}

// ---------------------------------------------------------------------------
// Query builders
// ---------------------------------------------------------------------------

/// `INSERT ... ON CONFLICT (natural key) DO UPDATE` merging only the
/// non-key columns present in `row`.
fn upsert_query(
    table: &'static TableSpec,
    row: &[Field],
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    if row.is_empty() {
        return Err(StoreError::Backend(format!("empty row for {table}")));
    }

    let columns = row
        .iter()
        .map(|f| declared(table, f.column))
        .collect::<Result<Vec<_>, _>>()?;

    let names = columns
        .iter()
        .map(|c| format!("\"{}\"", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut query =
        QueryBuilder::new(format!("INSERT INTO \"{}\" ({names}) VALUES (", table.name));
    for (i, (column, field)) in columns.iter().zip(row).enumerate() {
        if i > 0 {
            query.push(", ");
        }
        push_value(&mut query, column, &field.value);
    }

    let conflict = table
        .key
        .iter()
        .map(|k| format!("\"{k}\""))
        .collect::<Vec<_>>()
        .join(", ");
    query.push(format!(") ON CONFLICT ({conflict}) "));

    let merged: Vec<_> = columns.iter().filter(|c| !table.is_key(c.name)).collect();
    if merged.is_empty() {
        query.push("DO NOTHING");
    } else {
        let assignments = merged
            .iter()
            .map(|c| format!("\"{0}\" = EXCLUDED.\"{0}\"", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let current = merged
            .iter()
            .map(|c| format!("\"{}\".\"{}\"", table.name, c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let incoming = merged
            .iter()
            .map(|c| format!("EXCLUDED.\"{}\"", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        // Identical re-imports leave the row (and updated_at) untouched.
        query.push(format!(
            "DO UPDATE SET {assignments} \
             WHERE ROW({current}) IS DISTINCT FROM ROW({incoming})"
        ));
    }
    Ok(query)
}

fn update_query(
    table: &'static TableSpec,
    filter: &Filter,
    patch: &[Field],
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    if patch.is_empty() {
        return Err(StoreError::Backend(format!("empty patch for {table}")));
    }

    let mut query = QueryBuilder::new(format!("UPDATE \"{}\" SET ", table.name));
    for (i, field) in patch.iter().enumerate() {
        let column = declared(table, field.column)?;
        if i > 0 {
            query.push(", ");
        }
        query.push(format!("\"{}\" = ", column.name));
        push_value(&mut query, column, &field.value);
    }
    push_filter(&mut query, table, filter)?;
    Ok(query)
}

fn count_query(
    table: &'static TableSpec,
    filter: &Filter,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut query = QueryBuilder::new(format!("SELECT COUNT(*) FROM \"{}\"", table.name));
    push_filter(&mut query, table, filter)?;
    Ok(query)
}

fn delete_query(
    table: &'static TableSpec,
    filter: &Filter,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut query = QueryBuilder::new(format!("DELETE FROM \"{}\"", table.name));
    push_filter(&mut query, table, filter)?;
    Ok(query)
}

/// Append ` WHERE TRUE AND ...` for every clause of `filter`.
fn push_filter(
    query: &mut QueryBuilder<'static, Postgres>,
    table: &'static TableSpec,
    filter: &Filter,
) -> Result<(), StoreError> {
    query.push(" WHERE TRUE");
    for clause in &filter.clauses {
        let column = declared(table, clause.column)?;
        if matches!(&clause.condition, Condition::In(values) if values.is_empty()) {
            query.push(" AND FALSE");
            continue;
        }
        query.push(format!(" AND \"{}\"", column.name));
        match &clause.condition {
            Condition::Eq(value) => {
                query.push(" = ");
                push_value(query, column, value);
            }
            Condition::NotEq(value) => {
                query.push(" <> ");
                push_value(query, column, value);
            }
            Condition::In(values) => {
                query.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        query.push(", ");
                    }
                    push_value(query, column, value);
                }
                query.push(")");
            }
        }
    }
    Ok(())
}

fn push_value(query: &mut QueryBuilder<'static, Postgres>, column: &Column, value: &CellValue) {
    match value {
        CellValue::Text(s) => query.push_bind(s.clone()),
        CellValue::Integer(i) => query.push_bind(*i),
        CellValue::Number(n) => query.push_bind(*n),
        CellValue::Null => match column.ty {
            ColumnType::Text => query.push_bind(None::<String>),
            ColumnType::Integer => query.push_bind(None::<i64>),
            ColumnType::Number => query.push_bind(None::<f64>),
        },
    };
}

// ---------------------------------------------------------------------------
// Decoding and errors
// ---------------------------------------------------------------------------

fn declared(table: &'static TableSpec, name: &str) -> Result<&'static Column, StoreError> {
    table
        .column(name)
        .ok_or_else(|| StoreError::Backend(format!("{table} has no column '{name}'")))
}

fn read_count(row: &PgRow) -> Result<u64, StoreError> {
    let count: i64 = row.try_get(0).map_err(store_error)?;
    Ok(count.max(0) as u64)
}

fn read_cell(row: &PgRow, column: &Column) -> Result<CellValue, StoreError> {
    let cell = match column.ty {
        ColumnType::Text => row
            .try_get::<Option<String>, _>(0)
            .map(|v| v.map(CellValue::Text)),
        ColumnType::Integer => row
            .try_get::<Option<i64>, _>(0)
            .map(|v| v.map(CellValue::Integer)),
        ColumnType::Number => row
            .try_get::<Option<f64>, _>(0)
            .map(|v| v.map(CellValue::Number)),
    };
    cell.map(|v| v.unwrap_or(CellValue::Null))
        .map_err(store_error)
}

/// Classify a driver error, preferring the server's `detail` text.
///
/// Integrity violations (SQLSTATE class 23) and data exceptions (class 22,
/// e.g. value too long) become [`StoreError::Constraint`].
fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string());
            let class = db_err.code().map(|code| code.chars().take(2).collect::<String>());
            match class.as_deref() {
                Some("22") | Some("23") => StoreError::Constraint(message),
                _ => {
                    tracing::debug!(error = %db_err, "Database error");
                    StoreError::Backend(message)
                }
            }
        }
        _ => StoreError::Backend(err.to_string()),
    }
}
