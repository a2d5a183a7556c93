//! `capbook_xlsx`:
//! salary-cap workbook generator and formula-hygiene validator.
//!
//! Module layout:
//! - `conf`       : constants, reserved block sizes, default style presets
//! - `spec`       : option/record models and tagged enums
//! - `error`      : `CapbookError`
//! - `report`     : build diagnostics buffer
//! - `util`       : A1 addressing, dates, text helpers
//! - `contract`   : embedded table declarations and data invariants
//! - `writer`     : workbook owner; hidden data sheets and tables
//! - `style`      : named cell formats
//! - `names`      : defined-name registry
//! - `formula`    : expression tree and formula builders
//! - `calc`       : hidden scenario grid
//! - `playground` : single-team scenario sheet
//! - `matrix`     : multi-team trade sheet
//! - `meta`       : build metadata sheet
//! - `source`     : extraction inputs (records, polars frames)
//! - `assertion`  : pre-build assertion subprocess
//! - `build`      : the pipeline
//! - `lint`       : read-only validator
pub mod assertion;
pub mod build;
pub mod calc;
pub mod conf;
pub mod contract;
pub mod error;
pub mod formula;
pub mod lint;
pub mod matrix;
pub mod meta;
pub mod names;
pub mod playground;
pub mod report;
pub mod source;
pub mod spec;
pub mod style;
pub mod util;
pub mod writer;

pub use build::{build_capbook, build_capbook_with_report};
pub use conf::{C_DATA_CONTRACT_VERSION, N_YEAR_OFFSETS};
pub use error::CapbookError;
pub use lint::{ReportLint, SpecLintViolation, lint_formula, lint_workbook};
pub use report::ReportBuild;
pub use source::{MemoryTableSource, TableSource};
pub use spec::{
    EnumCellValue, EnumValidationStatus, SpecAssertionCommand, SpecBuildMeta, SpecBuildOptions,
    SpecTableExtract,
};
