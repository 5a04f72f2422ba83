use serde_json::{Map, Value};

/// Candidate fields for a row's display identifier, in priority order.
pub const IDENTIFIER_FIELDS: &[&str] = &[
    "reg_no",
    "staff_id",
    "course_code",
    "academic_sem",
    "calc_id",
];

/// Identifier reported when none of [`IDENTIFIER_FIELDS`] is populated.
pub const UNKNOWN_IDENTIFIER: &str = "Unknown";

/// One decoded spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    /// 1-indexed source line; the header is row 1, so the first data row is 2.
    pub position: usize,
    /// Header name -> cell value. Empty cells are absent.
    pub fields: Map<String, Value>,
}

impl RowRecord {
    pub fn new(position: usize, fields: Map<String, Value>) -> Self {
        Self { position, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Best-effort natural key for error reports.
    pub fn identifier(&self) -> String {
        IDENTIFIER_FIELDS
            .iter()
            .filter_map(|field| self.fields.get(*field))
            .find_map(display_value)
            .unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string())
    }
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if f.fract() == 0.0 && n.as_i64().is_none() => format!("{f:.0}"),
            _ => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
