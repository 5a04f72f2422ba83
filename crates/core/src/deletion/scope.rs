use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{
    CellValue, CoercionError, TableSpec, HOD, MARK_ENTRY, MENTOR, REPORT, STAFF_MASTER,
    STUDENT_MASTER,
};
use crate::store::Filter;

/// Staff id of the account allowed to confirm deletions. Never deletable.
pub const PRIVILEGED_ACCOUNT: &str = "ADMIN";

/// The slices of the store a deletion request can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionKind {
    Students,
    Mentors,
    MarkEntries,
    Reports,
    Hods,
    Staff,
}

impl DeletionKind {
    /// Transaction order: every scope is applied kind by kind in this order.
    pub const ALL: [DeletionKind; 6] = [
        Self::Students,
        Self::Mentors,
        Self::MarkEntries,
        Self::Reports,
        Self::Hods,
        Self::Staff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Mentors => "mentors",
            Self::MarkEntries => "mark_entries",
            Self::Reports => "reports",
            Self::Hods => "hods",
            Self::Staff => "staff",
        }
    }

    pub fn table(&self) -> &'static TableSpec {
        match self {
            Self::Students => &STUDENT_MASTER,
            Self::Mentors => &MENTOR,
            Self::MarkEntries => &MARK_ENTRY,
            Self::Reports => &REPORT,
            Self::Hods => &HOD,
            Self::Staff => &STAFF_MASTER,
        }
    }

    /// Column whose values a selector matches against.
    pub fn selector_column(&self) -> &'static str {
        match self {
            Self::Students => "batch",
            Self::Mentors | Self::MarkEntries => "academic_year",
            Self::Reports | Self::Hods => "academic_sem",
            Self::Staff => "staff_dept",
        }
    }

    /// Restriction applied to every selection of this kind, "all" included.
    pub fn base_filter(&self) -> Filter {
        match self {
            Self::Staff => Filter::all().not_eq(
                "staff_id",
                CellValue::Text(PRIVILEGED_ACCOUNT.to_string()),
            ),
            _ => Filter::all(),
        }
    }
}

impl fmt::Display for DeletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit selector values and/or the "all" flag for one kind.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Selector {
    pub values: Vec<Value>,
    pub all: bool,
}

impl Selector {
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(|v| Value::String(v.into())).collect(),
            all: false,
        }
    }

    pub fn all() -> Self {
        Self {
            values: Vec::new(),
            all: true,
        }
    }
}

/// A deletion request: one optional selector per kind.
///
/// Missing kinds, empty value lists, and blank values are all no-ops.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeletionScope {
    pub students: Selector,
    pub mentors: Selector,
    pub mark_entries: Selector,
    pub reports: Selector,
    pub hods: Selector,
    pub staff: Selector,
}

impl DeletionScope {
    pub fn selector(&self, kind: DeletionKind) -> &Selector {
        match kind {
            DeletionKind::Students => &self.students,
            DeletionKind::Mentors => &self.mentors,
            DeletionKind::MarkEntries => &self.mark_entries,
            DeletionKind::Reports => &self.reports,
            DeletionKind::Hods => &self.hods,
            DeletionKind::Staff => &self.staff,
        }
    }

    pub fn selector_mut(&mut self, kind: DeletionKind) -> &mut Selector {
        match kind {
            DeletionKind::Students => &mut self.students,
            DeletionKind::Mentors => &mut self.mentors,
            DeletionKind::MarkEntries => &mut self.mark_entries,
            DeletionKind::Reports => &mut self.reports,
            DeletionKind::Hods => &mut self.hods,
            DeletionKind::Staff => &mut self.staff,
        }
    }

    /// Builder-style helper: replace `kind`'s selector.
    pub fn with(mut self, kind: DeletionKind, selector: Selector) -> Self {
        *self.selector_mut(kind) = selector;
        self
    }

    /// Resolve the populated selectors into targets, in [`DeletionKind::ALL`]
    /// order. Values are coerced to the selector column's type, blanks are
    /// dropped, and duplicates collapse onto their first occurrence.
    pub fn targets(&self) -> Result<Vec<DeletionTarget>, CoercionError> {
        let mut targets = Vec::new();

        for kind in DeletionKind::ALL {
            let selector = self.selector(kind);
            if selector.all {
                targets.push(DeletionTarget {
                    kind,
                    selection: Selection::All,
                });
                continue;
            }

            let Some(column) = kind.table().column(kind.selector_column()) else {
                continue;
            };
            let mut values: Vec<CellValue> = Vec::with_capacity(selector.values.len());
            for raw in &selector.values {
                let value = column.coerce(raw)?;
                if !value.is_null() && !values.contains(&value) {
                    values.push(value);
                }
            }

            if !values.is_empty() {
                targets.push(DeletionTarget {
                    kind,
                    selection: Selection::Values(values),
                });
            }
        }

        Ok(targets)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    Values(Vec<CellValue>),
}

/// A resolved, non-empty selection of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionTarget {
    pub kind: DeletionKind,
    pub selection: Selection,
}

impl DeletionTarget {
    /// Filter matching every row the target selects.
    pub fn filter(&self) -> Filter {
        let base = self.kind.base_filter();
        match &self.selection {
            Selection::All => base,
            Selection::Values(values) => base.is_in(self.kind.selector_column(), values.clone()),
        }
    }

    /// Filter matching the rows selected by a single value.
    pub fn value_filter(&self, value: &CellValue) -> Filter {
        self.kind
            .base_filter()
            .eq(self.kind.selector_column(), value.clone())
    }
}
