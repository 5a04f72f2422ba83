//! Row -> store mutation mapping for every import kind.

use serde_json::Value;

use super::kind::ImportKind;
use super::row::RowRecord;
use crate::error::CoreError;
use crate::schema::{
    CellValue, TableSpec, ACADEMIC, CALCULATION, COURSE_MAPPING, COURSE_MASTER, HOD, MARK_ENTRY,
    MENTOR, REPORT, RS_MATRIX, SCOPE, STAFF_MASTER, STUDENT_MASTER,
};
use crate::store::{Field, Filter, KeyedStore, StoreError};

/// Value written to ESE mark columns whose cell is blank or non-numeric.
pub const ESE_SENTINEL: f64 = -1.0;

/// ESE columns patched by the targeted-update import.
const ESE_COLUMNS: &[&str] = &["ese_lot", "ese_mot", "ese_hot", "ese_total"];

/// Lookup key for the ESE targeted update.
const ESE_LOOKUP: &[&str] = &["reg_no", "course_code"];

// ── Failures ─────────────────────────────────────────────────────────

/// Why a single row was not applied. Never escalates past its row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowFailure {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Constraint(String),

    #[error("{0}")]
    Store(String),
}

impl RowFailure {
    /// Single-line, trimmed failure text for the error list.
    pub fn normalized_message(&self) -> String {
        let text = self.to_string();
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            "Unknown error".to_string()
        } else {
            collapsed
        }
    }
}

impl From<StoreError> for RowFailure {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Constraint(msg) => Self::Constraint(msg),
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

// ── Session context ──────────────────────────────────────────────────

/// Defaults shared by every row of a session, resolved once up front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    /// `academic.academic_sem` of the row flagged `active_sem = 1`.
    pub active_term: Option<CellValue>,
}

impl SessionContext {
    /// Resolve the context `kind` needs, failing before any row is touched
    /// when a precondition is missing.
    pub async fn resolve(kind: ImportKind, store: &dyn KeyedStore) -> Result<Self, CoreError> {
        if !kind.requires_active_term() {
            return Ok(Self::default());
        }

        let filter = Filter::all().eq("active_sem", CellValue::Integer(1));
        let term = store
            .lookup(&ACADEMIC, &filter, "academic_sem")
            .await
            .map_err(|e| CoreError::Internal(format!("failed to read active term: {e}")))?;

        match term {
            Some(term) if !term.is_null() => Ok(Self {
                active_term: Some(term),
            }),
            _ => Err(CoreError::PreconditionFailed(
                "no active academic term is configured".to_string(),
            )),
        }
    }

    fn require_active_term(&self) -> Result<&CellValue, RowFailure> {
        self.active_term.as_ref().ok_or_else(|| {
            RowFailure::Validation("no active academic term is configured".to_string())
        })
    }
}

// ── Mutations ────────────────────────────────────────────────────────

/// A single store write derived from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create-or-merge keyed by the table's natural key.
    Upsert {
        table: &'static TableSpec,
        row: Vec<Field>,
    },
    /// Partial update that must match at least one record.
    Update {
        table: &'static TableSpec,
        filter: Filter,
        patch: Vec<Field>,
        not_found: String,
    },
}

/// Maps rows of one import kind to store mutations.
#[derive(Debug, Clone)]
pub struct RowProcessor {
    kind: ImportKind,
    context: SessionContext,
}

impl RowProcessor {
    pub fn new(kind: ImportKind, context: SessionContext) -> Self {
        Self { kind, context }
    }

    /// Derive the mutations for `row` without touching the store.
    pub fn plan(&self, row: &RowRecord) -> Result<Vec<Mutation>, RowFailure> {
        match self.kind {
            ImportKind::StaffMaster => single_upsert(&STAFF_MASTER, row),
            ImportKind::StudentMaster => single_upsert(&STUDENT_MASTER, row),
            ImportKind::MarkEntry => single_upsert(&MARK_ENTRY, row),
            ImportKind::Hod => single_upsert(&HOD, row),
            ImportKind::Mentor => single_upsert(&MENTOR, row),
            ImportKind::Scope => single_upsert(&SCOPE, row),
            ImportKind::Calculation => single_upsert(&CALCULATION, row),
            ImportKind::Academic => single_upsert(&ACADEMIC, row),
            ImportKind::RsMatrix => single_upsert(&RS_MATRIX, row),
            ImportKind::CourseMaster => single_upsert(&COURSE_MASTER, row),
            ImportKind::CourseMapping => self.plan_course_mapping(row),
            ImportKind::Ese => plan_ese(row),
        }
    }

    /// Plan and apply `row`. Mutations run in order; the first failure
    /// stops the row.
    pub async fn process(&self, store: &dyn KeyedStore, row: &RowRecord) -> Result<(), RowFailure> {
        for mutation in self.plan(row)? {
            apply(store, mutation).await?;
        }
        Ok(())
    }

    fn plan_course_mapping(&self, row: &RowRecord) -> Result<Vec<Mutation>, RowFailure> {
        let term = self.context.require_active_term()?;
        let stamp = [Field::new("academic_sem", term.clone())];
        Ok(vec![
            Mutation::Upsert {
                table: &COURSE_MAPPING,
                row: merge_row(&COURSE_MAPPING, row, &stamp)?,
            },
            Mutation::Upsert {
                table: &REPORT,
                row: merge_row(&REPORT, row, &stamp)?,
            },
        ])
    }
}

async fn apply(store: &dyn KeyedStore, mutation: Mutation) -> Result<(), RowFailure> {
    match mutation {
        Mutation::Upsert { table, row } => {
            store.upsert(table, &row).await?;
        }
        Mutation::Update {
            table,
            filter,
            patch,
            not_found,
        } => {
            let matched = store.update(table, &filter, &patch).await?;
            if matched == 0 {
                return Err(RowFailure::NotFound(not_found));
            }
        }
    }
    Ok(())
}

fn single_upsert(table: &'static TableSpec, row: &RowRecord) -> Result<Vec<Mutation>, RowFailure> {
    Ok(vec![Mutation::Upsert {
        table,
        row: merge_row(table, row, &[])?,
    }])
}

/// Build the upsert record for `table` from the declared columns present in
/// `row`; `overrides` replace row values. Key columns must be populated.
fn merge_row(
    table: &'static TableSpec,
    row: &RowRecord,
    overrides: &[Field],
) -> Result<Vec<Field>, RowFailure> {
    let mut fields = Vec::with_capacity(table.columns.len());

    for column in table.columns {
        let value = match overrides.iter().find(|f| f.column == column.name) {
            Some(field) => field.value.clone(),
            None => match row.get(column.name) {
                Some(raw) => column
                    .coerce(raw)
                    .map_err(|e| RowFailure::Validation(e.to_string()))?,
                None => continue,
            },
        };

        if value.is_null() {
            if table.is_key(column.name) {
                return Err(missing_field(column.name));
            }
            continue;
        }
        fields.push(Field::new(column.name, value));
    }

    if let Some(key) = table
        .key
        .iter()
        .find(|key| !fields.iter().any(|f| f.column == **key))
    {
        return Err(missing_field(key));
    }

    Ok(fields)
}

fn plan_ese(row: &RowRecord) -> Result<Vec<Mutation>, RowFailure> {
    let mut filter = Filter::all();
    let mut lookup = Vec::with_capacity(ESE_LOOKUP.len());

    for name in ESE_LOOKUP {
        let column = MARK_ENTRY
            .column(name)
            .ok_or_else(|| RowFailure::Validation(format!("unknown column '{name}'")))?;
        let value = column
            .coerce(row.get(name).unwrap_or(&Value::Null))
            .map_err(|e| RowFailure::Validation(e.to_string()))?;
        if value.is_null() {
            return Err(missing_field(name));
        }
        lookup.push(format!("{name} '{value}'"));
        filter = filter.eq(column.name, value);
    }

    let patch = ESE_COLUMNS
        .iter()
        .map(|name| Field::new(*name, numeric_or_sentinel(row.get(name))))
        .collect();

    Ok(vec![Mutation::Update {
        table: &MARK_ENTRY,
        filter,
        patch,
        not_found: format!("no mark entry found for {}", lookup.join(" and ")),
    }])
}

/// Numeric cell value, or [`ESE_SENTINEL`] when blank or not a number.
fn numeric_or_sentinel(raw: Option<&Value>) -> CellValue {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    CellValue::Number(parsed.filter(|f| f.is_finite()).unwrap_or(ESE_SENTINEL))
}

fn missing_field(name: &str) -> RowFailure {
    RowFailure::Validation(format!("missing required field '{name}'"))
}
