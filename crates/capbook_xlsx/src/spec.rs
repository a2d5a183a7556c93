//! Shared capbook specification models.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::conf::{
    C_DATA_CONTRACT_VERSION, C_LEAGUE_DEFAULT, N_ERROR_ENTRY_BUDGET, N_EXCEPTION_ROWS_RESERVED,
    N_ROSTER_ROWS_RESERVED, N_YOS_ROOKIE, N_YOS_VET,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification overlaid onto the workbook base font.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Strikethrough style.
    pub strikethrough: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Top border override.
    pub top: Option<i64>,
    /// Bottom border override.
    pub bottom: Option<i64>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
    /// Editable when the sheet is protected.
    pub unlocked: Option<bool>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            strikethrough: other.strikethrough.or(self.strikethrough),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            top: other.top.or(self.top),
            bottom: other.bottom.or(self.bottom),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
            unlocked: other.unlocked.or(self.unlocked),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Values

/// Normalized cell value during extraction and write.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Calendar date.
    Date(NaiveDate),
}

impl EnumCellValue {
    /// Numeric view, when the value has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Text view used for grain keys and list values.
    pub fn as_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(s) => s.clone(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => format!("{n}"),
            Self::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Whether the value is blank.
    pub fn is_none(&self) -> bool {
        match self {
            Self::None => true,
            Self::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// Declared kind of a contract column; drives cell typing on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumColumnKind {
    Text,
    Integer,
    Number,
    Bool,
    Date,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Tagged Selections

/// Salary layer selected by `SelectedMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumSalaryLayer {
    Cap,
    Tax,
    Apron,
}

impl EnumSalaryLayer {
    pub const ALL: [EnumSalaryLayer; 3] = [Self::Cap, Self::Tax, Self::Apron];

    /// Label shown in the mode selector.
    pub fn label(self) -> &'static str {
        match self {
            Self::Cap => "Cap",
            Self::Tax => "Tax",
            Self::Apron => "Apron",
        }
    }

    /// Parse a selector label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|layer| layer.label() == label)
    }

    /// Base per-year amount column of `tbl_salary_book_yearly`.
    pub fn col_amount(self) -> &'static str {
        match self {
            Self::Cap => "cap_amount",
            Self::Tax => "tax_amount",
            Self::Apron => "apron_amount",
        }
    }

    /// Amount counted when a player arrives by trade.
    pub fn col_incoming(self) -> &'static str {
        match self {
            Self::Cap => "incoming_cap_amount",
            Self::Tax => "incoming_tax_amount",
            Self::Apron => "incoming_apron_amount",
        }
    }

    /// Amount removed when a player leaves by trade.
    pub fn col_outgoing(self) -> &'static str {
        match self {
            Self::Cap => "cap_amount",
            Self::Tax => "tax_amount",
            Self::Apron => "outgoing_apron_amount",
        }
    }

    /// Authoritative total column of `tbl_team_salary_warehouse`.
    pub fn col_warehouse_total(self) -> &'static str {
        match self {
            Self::Cap => "cap_total",
            Self::Tax => "tax_total",
            Self::Apron => "apron_total",
        }
    }

    /// Bucket columns of `tbl_team_salary_warehouse` that sum to the total.
    pub fn col_warehouse_buckets(self) -> [&'static str; 4] {
        match self {
            Self::Cap => ["cap_rost", "cap_fa", "cap_term", "cap_2way"],
            Self::Tax => ["tax_rost", "tax_fa", "tax_term", "tax_2way"],
            Self::Apron => ["apron_rost", "apron_fa", "apron_term", "apron_2way"],
        }
    }

    /// Per-layer column of `tbl_dead_money_warehouse`.
    pub fn col_dead_money(self) -> &'static str {
        match self {
            Self::Cap => "cap_value",
            Self::Tax => "tax_value",
            Self::Apron => "apron_value",
        }
    }

    /// Per-layer column of `tbl_cap_holds_warehouse`.
    pub fn col_cap_hold(self) -> &'static str {
        self.col_amount()
    }
}

/// Minimum-salary pricing used to fill empty roster slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFillBasis {
    Rookie,
    Vet,
}

impl EnumFillBasis {
    pub const ALL: [EnumFillBasis; 2] = [Self::Rookie, Self::Vet];

    pub fn label(self) -> &'static str {
        match self {
            Self::Rookie => "ROOKIE",
            Self::Vet => "VET",
        }
    }

    /// `years_of_service` row of `tbl_minimum_scale` this basis prices at.
    pub fn years_of_service(self) -> i64 {
        match self {
            Self::Rookie => N_YOS_ROOKIE,
            Self::Vet => N_YOS_VET,
        }
    }
}

/// Salary matching mode of a trade lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumTradeMode {
    Standard,
    Expanded,
}

impl EnumTradeMode {
    pub const ALL: [EnumTradeMode; 2] = [Self::Standard, Self::Expanded];

    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Expanded => "Expanded",
        }
    }
}

/// Delay between the trade date and a follow-up signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumSignDelay {
    Immediate,
    OneDay,
    TwoDays,
    SevenDays,
    FourteenDays,
    ThirtyDays,
}

impl EnumSignDelay {
    pub const ALL: [EnumSignDelay; 6] = [
        Self::Immediate,
        Self::OneDay,
        Self::TwoDays,
        Self::SevenDays,
        Self::FourteenDays,
        Self::ThirtyDays,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Immediate => "Immediate",
            Self::OneDay => "1 Day",
            Self::TwoDays => "2 Days",
            Self::SevenDays => "7 Days",
            Self::FourteenDays => "14 Days",
            Self::ThirtyDays => "30 Days",
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Self::Immediate => 0,
            Self::OneDay => 1,
            Self::TwoDays => 2,
            Self::SevenDays => 7,
            Self::FourteenDays => 14,
            Self::ThirtyDays => 30,
        }
    }
}

/// Overall validation banner value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumValidationStatus {
    Pass,
    Failed,
}

impl EnumValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Failed => "FAILED",
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Extraction

/// Raw extraction result: ordered columns and records keyed by column name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTableExtract {
    /// Column names in extraction order.
    pub columns: Vec<String>,
    /// One record per row.
    pub rows: Vec<BTreeMap<String, EnumCellValue>>,
}

impl SpecTableExtract {
    /// Build from column names and positional rows.
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<EnumCellValue>>) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect();
        Self { columns, rows }
    }
}

/// Rows projected onto a contract's declared column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTableData {
    /// Declared column names, in order.
    pub columns: Vec<String>,
    /// Positional rows aligned to `columns`.
    pub rows: Vec<Vec<EnumCellValue>>,
}

impl SpecTableData {
    /// Zero-based index of a declared column.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Iterate one column's values.
    pub fn column_values<'a>(
        &'a self,
        column: &str,
    ) -> impl Iterator<Item = &'a EnumCellValue> + 'a {
        let idx = self.column_index(column);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BuildOptions

/// External pre-build assertion command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAssertionCommand {
    /// Executable to run.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Wall-clock budget before the process is killed.
    pub timeout: Duration,
}

impl Default for SpecAssertionCommand {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Options for one capbook build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBuildOptions {
    /// First of the six salary years.
    pub base_year: i32,
    /// Snapshot date; defaults proration and trade dates.
    pub as_of_date: NaiveDate,
    /// League code filtering league-scoped tables.
    pub league: String,
    /// Version stamped into META.
    pub data_contract_version: String,
    /// Commit of the exporter that produced the build.
    pub exporter_commit_sha: String,
    /// Rows reserved for the roster spill.
    pub roster_rows_reserved: usize,
    /// Rows reserved for the exceptions spill.
    pub exceptions_rows_reserved: usize,
    /// Per-entry character budget of the META error list.
    pub error_entry_budget: usize,
    /// Optional SQL assertion run before extraction.
    pub assertion: Option<SpecAssertionCommand>,
}

impl Default for SpecBuildOptions {
    fn default() -> Self {
        Self {
            base_year: 2025,
            as_of_date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap_or_default(),
            league: C_LEAGUE_DEFAULT.to_string(),
            data_contract_version: C_DATA_CONTRACT_VERSION.to_string(),
            exporter_commit_sha: "unknown".to_string(),
            roster_rows_reserved: N_ROSTER_ROWS_RESERVED,
            exceptions_rows_reserved: N_EXCEPTION_ROWS_RESERVED,
            error_entry_budget: N_ERROR_ENTRY_BUDGET,
            assertion: None,
        }
    }
}

/// Metadata record returned by a build and written to META.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBuildMeta {
    /// UTC ISO-8601 build timestamp.
    pub refreshed_at: String,
    pub base_year: i32,
    pub as_of_date: NaiveDate,
    pub league: String,
    pub data_contract_version: String,
    pub exporter_commit_sha: String,
    pub validation_status: EnumValidationStatus,
    /// Short diagnostics, errors first.
    pub validation_errors: Vec<String>,
    /// Output path.
    pub path_file_out: PathBuf,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
