//! Declarative description of the academic tables the service writes.
//!
//! Column names here are the only identifiers ever interpolated into SQL by
//! the store implementation; every value travels as a bind parameter.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

// ── Cell values ──────────────────────────────────────────────────────

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Number,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Number => "number",
        }
    }
}

/// A single typed value bound for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A raw value could not be converted to its column's type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field '{column}' must be {article} {expected}")]
pub struct CoercionError {
    pub column: &'static str,
    pub expected: &'static str,
    article: &'static str,
}

// ── Columns and tables ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    /// Convert a decoded cell (or request value) into this column's type.
    ///
    /// Blank strings and JSON `null` become [`CellValue::Null`].
    pub fn coerce(&self, raw: &Value) -> Result<CellValue, CoercionError> {
        match (self.ty, raw) {
            (_, Value::Null) => Ok(CellValue::Null),
            (_, Value::String(s)) if s.trim().is_empty() => Ok(CellValue::Null),

            (ColumnType::Text, Value::String(s)) => Ok(CellValue::Text(s.trim().to_string())),
            (ColumnType::Text, Value::Number(n)) => Ok(CellValue::Text(number_text(n))),
            (ColumnType::Text, Value::Bool(b)) => Ok(CellValue::Text(b.to_string())),

            (ColumnType::Integer, Value::Number(n)) => whole_number(n)
                .map(CellValue::Integer)
                .ok_or_else(|| self.mismatch()),
            (ColumnType::Integer, Value::String(s)) => parse_integer(s.trim())
                .map(CellValue::Integer)
                .ok_or_else(|| self.mismatch()),

            (ColumnType::Number, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(CellValue::Number)
                .ok_or_else(|| self.mismatch()),
            (ColumnType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(CellValue::Number)
                .ok_or_else(|| self.mismatch()),

            _ => Err(self.mismatch()),
        }
    }

    fn mismatch(&self) -> CoercionError {
        let article = match self.ty {
            ColumnType::Integer => "an",
            _ => "a",
        };
        CoercionError {
            column: self.name,
            expected: self.ty.as_str(),
            article,
        }
    }
}

/// Render a JSON number as text, dropping a spurious `.0` that spreadsheets
/// attach to whole numbers (`2021.0` -> `"2021"`).
fn number_text(n: &serde_json::Number) -> String {
    match whole_number(n) {
        Some(i) => i.to_string(),
        None => n.to_string(),
    }
}

fn whole_number(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    n.as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
        .map(|f| f as i64)
}

fn parse_integer(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Text,
    }
}

const fn int(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Integer,
    }
}

const fn num(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Number,
    }
}

/// A table, its natural key, and the columns the service may write.
#[derive(Debug, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    /// Natural key columns; the store enforces uniqueness over them.
    pub key: &'static [&'static str],
    pub columns: &'static [Column],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.key.contains(&name)
    }

    /// Columns that an upsert merges on conflict.
    pub fn value_columns(&self) -> impl Iterator<Item = &'static Column> {
        let key = self.key;
        self.columns.iter().filter(move |c| !key.contains(&c.name))
    }
}

impl fmt::Display for TableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ── Tables ───────────────────────────────────────────────────────────

pub static STAFF_MASTER: TableSpec = TableSpec {
    name: "staffmaster",
    key: &["staff_id"],
    columns: &[
        text("staff_id"),
        text("staff_name"),
        text("staff_category"),
        text("staff_pass"),
        text("staff_dept"),
        text("dept_category"),
    ],
};

pub static STUDENT_MASTER: TableSpec = TableSpec {
    name: "studentmaster",
    key: &["reg_no"],
    columns: &[
        text("reg_no"),
        text("stu_name"),
        text("dept_id"),
        text("category"),
        int("semester"),
        text("section"),
        text("batch"),
    ],
};

pub static ACADEMIC: TableSpec = TableSpec {
    name: "academic",
    key: &["academic_sem"],
    columns: &[text("academic_sem"), text("academic_year"), int("active_sem")],
};

pub static COURSE_MASTER: TableSpec = TableSpec {
    name: "coursemaster",
    key: &["course_code"],
    columns: &[
        text("course_code"),
        text("course_title"),
        text("course_category"),
        num("credits"),
    ],
};

pub static COURSE_MAPPING: TableSpec = TableSpec {
    name: "coursemapping",
    key: &[
        "staff_id",
        "course_code",
        "category",
        "section",
        "dept_id",
        "academic_sem",
    ],
    columns: &[
        text("staff_id"),
        text("staff_name"),
        text("course_code"),
        text("course_title"),
        text("category"),
        text("batch"),
        text("degree"),
        text("dept_id"),
        text("dept_name"),
        int("semester"),
        text("section"),
        text("academic_sem"),
    ],
};

pub static REPORT: TableSpec = TableSpec {
    name: "report",
    key: &[
        "staff_id",
        "course_code",
        "category",
        "section",
        "dept_name",
        "academic_sem",
    ],
    columns: &[
        text("staff_id"),
        text("course_code"),
        text("category"),
        text("section"),
        text("dept_name"),
        text("academic_sem"),
    ],
};

pub static MARK_ENTRY: TableSpec = TableSpec {
    name: "markentry",
    key: &["reg_no", "course_code", "academic_sem"],
    columns: &[
        text("reg_no"),
        text("course_code"),
        text("staff_id"),
        text("category"),
        text("dept_id"),
        int("semester"),
        text("academic_year"),
        text("academic_sem"),
        num("lot"),
        num("mot"),
        num("hot"),
        num("total"),
        num("ese_lot"),
        num("ese_mot"),
        num("ese_hot"),
        num("ese_total"),
    ],
};

pub static HOD: TableSpec = TableSpec {
    name: "hod",
    key: &["staff_id", "dept_id"],
    columns: &[
        text("staff_id"),
        text("hod_name"),
        text("graduate"),
        text("category"),
        text("dept_id"),
        text("dept_name"),
        text("academic_sem"),
    ],
};

pub static MENTOR: TableSpec = TableSpec {
    name: "mentor",
    key: &["staff_id", "batch", "section", "dept_id"],
    columns: &[
        text("staff_id"),
        text("staff_name"),
        text("category"),
        text("degree"),
        text("dept_id"),
        text("batch"),
        text("section"),
        text("academic_year"),
        text("academic_sem"),
    ],
};

pub static SCOPE: TableSpec = TableSpec {
    name: "scope",
    key: &["staff_id"],
    columns: &[
        text("staff_id"),
        int("dashboard"),
        int("course_list"),
        int("course_outcome"),
        int("student_outcome"),
        int("program_outcome"),
        int("settings"),
    ],
};

pub static CALCULATION: TableSpec = TableSpec {
    name: "calculation",
    key: &["calc_id"],
    columns: &[
        text("calc_id"),
        num("cia_weightage"),
        num("ese_weightage"),
        num("target_level"),
    ],
};

pub static RS_MATRIX: TableSpec = TableSpec {
    name: "rsmatrix",
    key: &["course_code", "co_no", "po_no"],
    columns: &[
        text("course_code"),
        int("co_no"),
        int("po_no"),
        num("level"),
    ],
};

/// Every table the service knows about.
pub static ALL_TABLES: &[&TableSpec] = &[
    &STAFF_MASTER,
    &STUDENT_MASTER,
    &ACADEMIC,
    &COURSE_MASTER,
    &COURSE_MAPPING,
    &REPORT,
    &MARK_ENTRY,
    &HOD,
    &MENTOR,
    &SCOPE,
    &CALCULATION,
    &RS_MATRIX,
];
