//! Fixed table of supported spreadsheet functions.

use crate::translator::FormulaCategory;
use std::fmt;

/// Every function a formula may call. Names are resolved once, at
/// translation time; anything outside this table is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    // Aggregate
    Sum,
    Average,
    Count,
    Max,
    Min,
    // Logical
    If,
    And,
    Or,
    Not,
    IfError,
    IsError,
    // Lookup
    VLookup,
    HLookup,
    Index,
    Match,
    // Text
    Concatenate,
    Left,
    Right,
    Mid,
    Len,
    // Date
    Date,
    EDate,
    Today,
    // Math
    Round,
    RoundUp,
    RoundDown,
}

impl Function {
    pub const ALL: [Function; 26] = [
        Self::Sum,
        Self::Average,
        Self::Count,
        Self::Max,
        Self::Min,
        Self::If,
        Self::And,
        Self::Or,
        Self::Not,
        Self::IfError,
        Self::IsError,
        Self::VLookup,
        Self::HLookup,
        Self::Index,
        Self::Match,
        Self::Concatenate,
        Self::Left,
        Self::Right,
        Self::Mid,
        Self::Len,
        Self::Date,
        Self::EDate,
        Self::Today,
        Self::Round,
        Self::RoundUp,
        Self::RoundDown,
    ];

    /// Look up a function by name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|f| f.name() == upper)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Average => "AVERAGE",
            Self::Count => "COUNT",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::If => "IF",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::IfError => "IFERROR",
            Self::IsError => "ISERROR",
            Self::VLookup => "VLOOKUP",
            Self::HLookup => "HLOOKUP",
            Self::Index => "INDEX",
            Self::Match => "MATCH",
            Self::Concatenate => "CONCATENATE",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Mid => "MID",
            Self::Len => "LEN",
            Self::Date => "DATE",
            Self::EDate => "EDATE",
            Self::Today => "TODAY",
            Self::Round => "ROUND",
            Self::RoundUp => "ROUNDUP",
            Self::RoundDown => "ROUNDDOWN",
        }
    }

    pub fn category(&self) -> FormulaCategory {
        match self {
            Self::Sum | Self::Average | Self::Count | Self::Max | Self::Min => {
                FormulaCategory::Aggregate
            }
            Self::If | Self::And | Self::Or | Self::Not | Self::IfError | Self::IsError => {
                FormulaCategory::Logical
            }
            Self::VLookup | Self::HLookup | Self::Index | Self::Match => FormulaCategory::Lookup,
            Self::Concatenate | Self::Left | Self::Right | Self::Mid | Self::Len => {
                FormulaCategory::Text
            }
            Self::Date | Self::EDate | Self::Today => FormulaCategory::Date,
            Self::Round | Self::RoundUp | Self::RoundDown => FormulaCategory::Arithmetic,
        }
    }

    /// Minimum and (optional) maximum argument counts.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Self::Sum | Self::Average | Self::Count | Self::Max | Self::Min => (1, None),
            Self::And | Self::Or | Self::Concatenate => (1, None),
            Self::If => (2, Some(3)),
            Self::Not | Self::IsError | Self::Len => (1, Some(1)),
            Self::IfError | Self::EDate => (2, Some(2)),
            Self::VLookup | Self::HLookup => (3, Some(4)),
            Self::Index | Self::Match => (2, Some(3)),
            Self::Left | Self::Right => (1, Some(2)),
            Self::Mid | Self::Date => (3, Some(3)),
            Self::Today => (0, Some(0)),
            Self::Round | Self::RoundUp | Self::RoundDown => (2, Some(2)),
        }
    }

    /// Check an argument count against [`Function::arity`].
    pub fn accepts(&self, count: usize) -> bool {
        let (min, max) = self.arity();
        count >= min && max.map_or(true, |max| count <= max)
    }

    /// Whether each output row depends only on the same input row.
    pub fn is_row_wise(&self) -> bool {
        !matches!(
            self.category(),
            FormulaCategory::Aggregate | FormulaCategory::Lookup
        )
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
