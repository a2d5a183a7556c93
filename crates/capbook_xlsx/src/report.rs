//! Build report models and the mutable diagnostic buffer.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::error::CapbookError;
use crate::spec::EnumValidationStatus;

/// Aggregate counters and diagnostics for one build.
#[derive(Debug, Default, Clone)]
pub struct ReportBuild {
    /// Tables written with their extracted rows.
    pub cnt_tables_written: u64,
    /// Tables written as empty placeholders after a failure.
    pub cnt_tables_failed: u64,
    /// Defined names published to the workbook.
    pub cnt_names_published: u64,
    /// Rows dropped because their salary year is outside the window.
    pub cnt_rows_dropped: u64,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
    /// Diagnostics that mark validation FAILED.
    pub errors: Vec<String>,
}

impl ReportBuild {
    /// Number of collected errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// PASS when no error was recorded.
    pub fn validation_status(&self) -> EnumValidationStatus {
        if self.errors.is_empty() {
            EnumValidationStatus::Pass
        } else {
            EnumValidationStatus::Failed
        }
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_tables_written".to_string(), self.cnt_tables_written);
        dict_counts.insert("cnt_tables_failed".to_string(), self.cnt_tables_failed);
        dict_counts.insert("cnt_names_published".to_string(), self.cnt_names_published);
        dict_counts.insert("cnt_rows_dropped".to_string(), self.cnt_rows_dropped);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} tables={} failed={} names={} dropped={} errors={} warnings={}",
            dict_counts["cnt_tables_written"],
            dict_counts["cnt_tables_failed"],
            dict_counts["cnt_names_published"],
            dict_counts["cnt_rows_dropped"],
            dict_counts["cnt_errors"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[CAPBOOK]"))
    }
}

/// Append-only accumulator threaded through the build pipeline.
#[derive(Debug, Default, Clone)]
pub struct ReportBuildBuilder {
    /// See [`ReportBuild::cnt_tables_written`].
    pub cnt_tables_written: u64,
    /// See [`ReportBuild::cnt_tables_failed`].
    pub cnt_tables_failed: u64,
    /// See [`ReportBuild::cnt_names_published`].
    pub cnt_names_published: u64,
    /// See [`ReportBuild::cnt_rows_dropped`].
    pub cnt_rows_dropped: u64,
    /// See [`ReportBuild::warnings`].
    pub warnings: Vec<String>,
    /// See [`ReportBuild::errors`].
    pub errors: Vec<String>,
}

impl ReportBuildBuilder {
    /// Increment table-written count by one.
    pub fn add_table_written(&mut self) {
        self.cnt_tables_written += 1;
    }

    /// Increment table-failed count by one.
    pub fn add_table_failed(&mut self) {
        self.cnt_tables_failed += 1;
    }

    /// Add to the dropped-row count.
    pub fn add_rows_dropped(&mut self, n_rows: u64) {
        self.cnt_rows_dropped += n_rows;
    }

    /// Set published name count.
    pub fn set_names_published(&mut self, n_names: u64) {
        self.cnt_names_published = n_names;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        warn!(target: "capbook", "{warning}");
        self.warnings.push(warning);
    }

    /// Add a validation error message.
    pub fn add_error(&mut self, error: String) {
        warn!(target: "capbook", error = %error, "validation error recorded");
        self.errors.push(error);
    }

    /// Record a typed error under its kind tag.
    pub fn add_capbook_error(&mut self, err: &CapbookError) {
        self.add_error(err.to_diagnostic());
    }

    /// Whether any error has been recorded so far.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Snapshot without consuming the buffer.
    pub fn snapshot(&self) -> ReportBuild {
        self.clone().build()
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportBuild {
        ReportBuild {
            cnt_tables_written: self.cnt_tables_written,
            cnt_tables_failed: self.cnt_tables_failed,
            cnt_names_published: self.cnt_names_published,
            cnt_rows_dropped: self.cnt_rows_dropped,
            warnings: self.warnings,
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_build_to_dict_and_format() {
        let report = ReportBuild {
            cnt_tables_written: 10,
            cnt_tables_failed: 1,
            cnt_names_published: 120,
            cnt_rows_dropped: 3,
            warnings: vec!["w".to_string()],
            errors: vec!["e".to_string()],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_tables_written"], 10);
        assert_eq!(dict_counts["cnt_errors"], 1);

        let txt = report.format("[CAPBOOK]");
        assert_eq!(
            txt,
            "[CAPBOOK] tables=10 failed=1 names=120 dropped=3 errors=1 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
        assert_eq!(report.validation_status(), EnumValidationStatus::Failed);
    }

    #[test]
    fn builder_status_follows_errors() {
        let mut builder = ReportBuildBuilder::default();
        builder.add_warning("dropped 2 rows".to_string());
        assert_eq!(
            builder.snapshot().validation_status(),
            EnumValidationStatus::Pass
        );

        builder.add_capbook_error(&CapbookError::SchemaMismatch {
            table: "tbl_x".to_string(),
            message: "m".to_string(),
        });
        assert!(builder.has_errors());
        let report = builder.build();
        assert!(report.errors[0].starts_with("SchemaMismatch: "));
        assert_eq!(report.warnings, vec!["dropped 2 rows".to_string()]);
    }
}
