//! Error kinds raised while building or validating a capbook.

use std::path::PathBuf;

use rust_xlsxwriter::XlsxError;
use thiserror::Error;

/// Every failure a build or validation can surface.
#[derive(Debug, Error)]
pub enum CapbookError {
    /// Extraction of a table failed; carries the attempted column list.
    #[error("extract failed for `{table}` (columns: {}): {message}", columns.join(", "))]
    Extract {
        table: String,
        columns: Vec<String>,
        message: String,
    },

    /// Extracted columns do not satisfy the declared column order.
    #[error("schema mismatch for `{table}`: {message}")]
    SchemaMismatch { table: String, message: String },

    /// The workbook writer rejected an operation.
    #[error("writer failure ({context}): {message}")]
    WriterFailure { context: String, message: String },

    /// A formula violates the dialect's hygiene rules.
    #[error("formula hygiene violation at {location}: {message}")]
    FormulaHygieneViolation { location: String, message: String },

    /// Defined name declared twice in the same scope.
    #[error("duplicate defined name `{name}` in scope {scope}")]
    DuplicateName { name: String, scope: String },

    /// Defined name or target that cannot resolve.
    #[error("invalid reference for `{name}`: {message}")]
    InvalidReference { name: String, message: String },

    /// Pre-build assertion exceeded its time budget.
    #[error("assertion `{program}` timed out after {timeout_secs:.1}s")]
    AssertionTimeout { program: String, timeout_secs: f64 },

    /// Pre-build assertion exited unsuccessfully.
    #[error("assertion `{program}` failed (exit {code:?}): {stderr_tail}")]
    AssertionFailed {
        program: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    /// Build option out of range.
    #[error("invalid option `{option}`: {message}")]
    InvalidOption { option: String, message: String },

    /// File-system failure.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CapbookError {
    /// Wrap a writer error with the operation that raised it.
    pub fn from_xlsx(context: impl Into<String>, err: XlsxError) -> Self {
        Self::WriterFailure {
            context: context.into(),
            message: derive_xlsx_error_text(&err),
        }
    }

    /// Whether the pipeline must stop on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateName { .. } | Self::InvalidReference { .. } | Self::InvalidOption { .. }
        )
    }

    /// Short kind tag used in META diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extract { .. } => "ExtractError",
            Self::SchemaMismatch { .. } => "SchemaMismatch",
            Self::WriterFailure { .. } => "WriterFailure",
            Self::FormulaHygieneViolation { .. } => "FormulaHygieneViolation",
            Self::DuplicateName { .. } => "DuplicateName",
            Self::InvalidReference { .. } => "InvalidReference",
            Self::AssertionTimeout { .. } => "AssertionTimeout",
            Self::AssertionFailed { .. } => "AssertionFailed",
            Self::InvalidOption { .. } => "InvalidOption",
            Self::Io { .. } => "Io",
        }
    }

    /// `Kind: message` line for the diagnostic buffer.
    pub fn to_diagnostic(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

fn derive_xlsx_error_text(err: &XlsxError) -> String {
    let msg = err.to_string();
    if msg.trim().is_empty() {
        format!("{err:?}")
    } else {
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        let err = CapbookError::DuplicateName {
            name: "SelectedTeam".to_string(),
            scope: "workbook".to_string(),
        };
        assert!(err.is_fatal());

        let err = CapbookError::SchemaMismatch {
            table: "tbl_tax_rates".to_string(),
            message: "missing column `lower_limit`".to_string(),
        };
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_diagnostic(),
            "SchemaMismatch: schema mismatch for `tbl_tax_rates`: missing column `lower_limit`"
        );
    }

    #[test]
    fn test_extract_message_lists_columns() {
        let err = CapbookError::Extract {
            table: "tbl_minimum_scale".to_string(),
            columns: vec!["salary_year".to_string(), "league_lk".to_string()],
            message: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("salary_year, league_lk"));
    }
}
