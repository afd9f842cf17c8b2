use thiserror::Error;

/// Errors raised while resolving or translating formula text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("Malformed formula '{formula}': {reason}")]
    MalformedFormula { formula: String, reason: String },

    #[error("Unknown sheet '{sheet}' in reference '{reference}'")]
    UnknownSheetReference { sheet: String, reference: String },

    #[error("Unknown column '{column}' in sheet '{sheet}'")]
    UnknownColumnReference { sheet: String, column: String },
}

impl FormulaError {
    pub(crate) fn malformed(formula: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedFormula {
            formula: formula.into(),
            reason: reason.into(),
        }
    }

    /// Replace the formula text carried by a `MalformedFormula` error.
    #[must_use]
    pub fn with_formula(self, raw: &str) -> Self {
        match self {
            Self::MalformedFormula { reason, .. } => Self::MalformedFormula {
                formula: raw.to_string(),
                reason,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, FormulaError>;
