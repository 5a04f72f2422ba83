use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The upload types accepted by the importer.
///
/// Each kind owns a progress slot in the registry, so two uploads of the
/// same kind share (and race for) a single snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    StaffMaster,
    StudentMaster,
    CourseMapping,
    MarkEntry,
    Ese,
    Hod,
    Mentor,
    Scope,
    Calculation,
    Academic,
    RsMatrix,
    CourseMaster,
}

impl ImportKind {
    pub const ALL: [ImportKind; 12] = [
        Self::StaffMaster,
        Self::StudentMaster,
        Self::CourseMapping,
        Self::MarkEntry,
        Self::Ese,
        Self::Hod,
        Self::Mentor,
        Self::Scope,
        Self::Calculation,
        Self::Academic,
        Self::RsMatrix,
        Self::CourseMaster,
    ];

    /// Path segment used by the upload and progress routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaffMaster => "staffmaster",
            Self::StudentMaster => "studentmaster",
            Self::CourseMapping => "coursemapping",
            Self::MarkEntry => "markentry",
            Self::Ese => "ese",
            Self::Hod => "hod",
            Self::Mentor => "mentor",
            Self::Scope => "scope",
            Self::Calculation => "calculation",
            Self::Academic => "academic",
            Self::RsMatrix => "rsmatrix",
            Self::CourseMaster => "coursemaster",
        }
    }

    /// Whether rows of this kind are stamped with the active academic term.
    pub fn requires_active_term(&self) -> bool {
        matches!(self, Self::CourseMapping)
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown import type '{0}'")]
pub struct UnknownImportKind(pub String);

impl FromStr for ImportKind {
    type Err = UnknownImportKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| UnknownImportKind(s.to_string()))
    }
}
