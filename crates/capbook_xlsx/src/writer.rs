//! Workbook owner: hidden data tables, sheet ordering, finalization.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{
    ConditionalFormatFormula, DataValidation, Format, Formula, Table, TableColumn, Workbook,
    Worksheet,
};
use tracing::{debug, info};

use crate::conf::{
    C_FONT_NAME_DEFAULT, EnumStyleKey, N_FONT_SIZE_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_LEN_LIST_VALIDATION_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
};
use crate::contract::SpecTableContract;
use crate::error::CapbookError;
use crate::formula::Expr;
use crate::formula::status::SpecStatusRule;
use crate::names::NameRegistry;
use crate::spec::{EnumCellValue, EnumColumnKind, SpecTableData};
use crate::style::StyleRegistry;
use crate::util::{
    cast_col_num, cast_row_num, derive_excel_date_serial, derive_sheet_range_ref,
    estimate_unicode_string_width,
};

const N_WIDTH_DATA_MIN: usize = 8;
const N_WIDTH_DATA_MAX: usize = 40;
const N_WIDTH_DATA_PADDING: usize = 2;

/// Position of a sheet kind in the final tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnumSheetRole {
    Playground,
    Matrix,
    Meta,
    Calc,
    Data,
}

/// Where a table landed; used for absolute ranges in rules and validation lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTableLayout {
    pub table_name: String,
    pub sheet_name: String,
    pub columns: Vec<String>,
    /// Extracted rows written.
    pub n_rows_real: usize,
    /// Physical data rows (at least one placeholder row).
    pub n_rows_written: usize,
}

impl SpecTableLayout {
    /// Absolute range over a column's data rows (`DATA_x!$B$2:$B$41`).
    pub fn column_range(&self, column: &str) -> Option<String> {
        let n_col = self.columns.iter().position(|c| c == column)?;
        Some(derive_sheet_range_ref(
            &self.sheet_name,
            1,
            n_col,
            self.n_rows_written,
            n_col,
        ))
    }
}

/// Exclusive owner of the workbook from creation until [`Self::close`].
pub struct CapbookWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    l_sheets: Vec<(EnumSheetRole, Worksheet)>,
    set_sheet_names_existing: BTreeSet<String>,
    dict_layouts: BTreeMap<String, SpecTableLayout>,
    if_sheets_pushed: bool,
    if_closed: bool,
}

impl CapbookWriter {
    /// Create writer bound to output path.
    ///
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(path_file_out: impl AsRef<Path>) -> Self {
        Self {
            path_file_out: path_file_out.as_ref().to_path_buf(),
            workbook: Workbook::new(),
            l_sheets: Vec::new(),
            set_sheet_names_existing: BTreeSet::new(),
            dict_layouts: BTreeMap::new(),
            if_sheets_pushed: false,
            if_closed: false,
        }
    }

    /// Return output file path.
    pub fn file_out(&self) -> &Path {
        &self.path_file_out
    }

    /// Check the registry's base font against the workbook default.
    ///
    /// Nothing is written: the writer's built-in default font is Calibri 11,
    /// and a registry built on another base font would render inconsistently
    /// with unstyled cells.
    pub fn check_default_font(&self, styles: &StyleRegistry) -> Result<(), CapbookError> {
        let (c_font, n_size) = styles.base_font();
        if c_font != Some(C_FONT_NAME_DEFAULT) || n_size != Some(N_FONT_SIZE_DEFAULT) {
            return Err(CapbookError::WriterFailure {
                context: "default font".to_string(),
                message: format!(
                    "base style font {c_font:?} {n_size:?} differs from workbook default \
                     {C_FONT_NAME_DEFAULT} {N_FONT_SIZE_DEFAULT}"
                ),
            });
        }
        if !self.l_sheets.is_empty() {
            return Err(CapbookError::WriterFailure {
                context: "default font".to_string(),
                message: "default font must be checked before any worksheet is added".to_string(),
            });
        }
        Ok(())
    }

    /// Names of every sheet added so far.
    pub fn sheet_names(&self) -> BTreeSet<String> {
        self.set_sheet_names_existing.clone()
    }

    /// Layout of a written table.
    pub fn layout(&self, table_name: &str) -> Option<&SpecTableLayout> {
        self.dict_layouts.get(table_name)
    }

    /// Every written table layout keyed by table name.
    pub fn layouts(&self) -> &BTreeMap<String, SpecTableLayout> {
        &self.dict_layouts
    }

    /// Register a finished sheet under its role.
    pub fn add_worksheet(
        &mut self,
        role: EnumSheetRole,
        mut worksheet: Worksheet,
    ) -> Result<(), CapbookError> {
        if self.if_sheets_pushed {
            return Err(CapbookError::WriterFailure {
                context: "add worksheet".to_string(),
                message: "workbook already finalized".to_string(),
            });
        }
        let c_name = worksheet.name();
        if !self.set_sheet_names_existing.insert(c_name.clone()) {
            return Err(CapbookError::WriterFailure {
                context: format!("add worksheet `{c_name}`"),
                message: "sheet name already exists".to_string(),
            });
        }
        if role >= EnumSheetRole::Calc {
            worksheet.set_hidden(true);
        }
        debug!(sheet = %c_name, ?role, "sheet registered");
        self.l_sheets.push((role, worksheet));
        Ok(())
    }

    /// Write one table onto its own hidden sheet.
    ///
    /// Empty input still produces one blank placeholder row so the table
    /// name resolves.
    pub fn write_table(
        &mut self,
        contract: &SpecTableContract,
        data: &SpecTableData,
        styles: &StyleRegistry,
    ) -> Result<SpecTableLayout, CapbookError> {
        let c_context = format!("table `{}`", contract.table_name);
        if data.columns != contract.column_names() {
            return Err(CapbookError::SchemaMismatch {
                table: contract.table_name.to_string(),
                message: "rows are not projected onto the declared columns".to_string(),
            });
        }
        if data.rows.len() + 1 > N_NROWS_EXCEL_MAX {
            return Err(CapbookError::WriterFailure {
                context: c_context,
                message: format!(
                    "{} rows exceed the sheet limit of {}",
                    data.rows.len(),
                    N_NROWS_EXCEL_MAX - 1
                ),
            });
        }
        if contract.columns.is_empty() || contract.columns.len() > N_NCOLS_EXCEL_MAX {
            return Err(CapbookError::WriterFailure {
                context: c_context,
                message: format!("unsupported column count {}", contract.columns.len()),
            });
        }

        let sheet_name = self.derive_unique_sheet_name(&contract.sheet_name());
        let mut worksheet = Worksheet::new();
        worksheet
            .set_name(&sheet_name)
            .map_err(|err| CapbookError::from_xlsx(c_context.clone(), err))?;

        let l_formats: Vec<Format> = contract
            .columns
            .iter()
            .map(|col| styles.get(derive_style_key_for_kind(col.kind)))
            .collect();

        for (n_idx_row, row) in data.rows.iter().enumerate() {
            for (n_idx_col, value) in row.iter().enumerate() {
                write_cell_with_format(
                    &mut worksheet,
                    n_idx_row + 1,
                    n_idx_col,
                    value,
                    &l_formats[n_idx_col],
                )
                .map_err(|err| derive_context_error(err, &c_context))?;
            }
        }
        let n_rows_written = data.rows.len().max(1);

        let l_table_columns: Vec<TableColumn> = contract
            .columns
            .iter()
            .map(|col| TableColumn::new().set_header(col.name.as_str()))
            .collect();
        let table = Table::new()
            .set_name(contract.table_name)
            .set_columns(&l_table_columns);
        worksheet
            .add_table(
                0,
                0,
                cast_row_num(n_rows_written)?,
                cast_col_num(contract.columns.len() - 1)?,
                &table,
            )
            .map_err(|err| CapbookError::from_xlsx(c_context.clone(), err))?;

        for (n_idx_col, col) in contract.columns.iter().enumerate() {
            let n_width = (estimate_unicode_string_width(&col.name) + N_WIDTH_DATA_PADDING)
                .clamp(N_WIDTH_DATA_MIN, N_WIDTH_DATA_MAX);
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, n_width as f64)
                .map_err(|err| CapbookError::from_xlsx(c_context.clone(), err))?;
        }
        worksheet.set_hidden(true);

        let layout = SpecTableLayout {
            table_name: contract.table_name.to_string(),
            sheet_name: sheet_name.clone(),
            columns: contract.column_names(),
            n_rows_real: data.rows.len(),
            n_rows_written,
        };
        self.l_sheets.push((EnumSheetRole::Data, worksheet));
        self.dict_layouts
            .insert(contract.table_name.to_string(), layout.clone());
        debug!(
            table = contract.table_name,
            sheet = %sheet_name,
            rows = data.rows.len(),
            "table written"
        );
        Ok(layout)
    }

    /// Push every registered sheet in tab order. Idempotent.
    fn push_sheets(&mut self) {
        if self.if_sheets_pushed {
            return;
        }
        self.l_sheets.sort_by_key(|(role, _)| *role);
        let mut if_active_set = false;
        for (role, mut worksheet) in self.l_sheets.drain(..) {
            if !if_active_set && role < EnumSheetRole::Calc {
                worksheet.set_active(true);
                if_active_set = true;
            }
            self.workbook.push_worksheet(worksheet);
        }
        self.if_sheets_pushed = true;
    }

    /// Push every sheet in tab order, then publish the registry's names.
    ///
    /// No sheet can be added afterwards.
    pub fn publish_names(&mut self, names: &NameRegistry) -> Result<usize, CapbookError> {
        let set_sheet_names = self.sheet_names();
        names.validate_targets(&set_sheet_names)?;
        self.push_sheets();
        names.apply(&mut self.workbook, &set_sheet_names)
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), CapbookError> {
        if self.if_closed {
            return Ok(());
        }
        self.push_sheets();
        if self.workbook.worksheets().is_empty() {
            self.workbook.add_worksheet();
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(|err| CapbookError::from_xlsx("save workbook", err))?;
        self.if_closed = true;
        info!(path = %self.path_file_out.display(), "workbook saved");
        Ok(())
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if !self.set_sheet_names_existing.contains(name) {
            self.set_sheet_names_existing.insert(name.to_string());
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if !self.set_sheet_names_existing.contains(&candidate) {
                self.set_sheet_names_existing.insert(candidate.clone());
                return candidate;
            }
            n_idx += 1;
        }
    }
}

fn derive_style_key_for_kind(kind: EnumColumnKind) -> EnumStyleKey {
    match kind {
        EnumColumnKind::Integer => EnumStyleKey::Integer,
        EnumColumnKind::Date => EnumStyleKey::Date,
        EnumColumnKind::Text | EnumColumnKind::Number | EnumColumnKind::Bool => {
            EnumStyleKey::Text
        }
    }
}

fn derive_context_error(err: CapbookError, context: &str) -> CapbookError {
    match err {
        CapbookError::WriterFailure {
            context: c_inner,
            message,
        } => CapbookError::WriterFailure {
            context: format!("{context}: {c_inner}"),
            message,
        },
        other => other,
    }
}

/// Write one typed value.
pub fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), CapbookError> {
    let row = cast_row_num(row_idx)?;
    let col = cast_col_num(col_idx)?;
    let res = match value {
        EnumCellValue::None => worksheet.write_blank(row, col, format),
        EnumCellValue::String(val) => worksheet.write_string_with_format(row, col, val, format),
        EnumCellValue::Number(val) => worksheet.write_number_with_format(row, col, *val, format),
        EnumCellValue::Bool(val) => worksheet.write_boolean_with_format(row, col, *val, format),
        EnumCellValue::Date(val) => {
            worksheet.write_number_with_format(row, col, derive_excel_date_serial(*val), format)
        }
    };
    res.map(|_| ())
        .map_err(|err| CapbookError::from_xlsx(format!("cell ({row_idx}, {col_idx})"), err))
}

/// New named worksheet with future-function prefixing enabled.
pub fn new_formula_worksheet(sheet_name: &str) -> Result<Worksheet, CapbookError> {
    let mut worksheet = Worksheet::new();
    worksheet
        .set_name(sheet_name)
        .map_err(|err| CapbookError::from_xlsx(format!("sheet `{sheet_name}`"), err))?;
    // rust_xlsxwriter >= 0.75 prefixes future functions automatically in `Formula::new`.
    Ok(worksheet)
}

/// Write a formula cell as a single-cell dynamic-array formula.
///
/// Spill anchors and scalar cells share this path so LET/LAMBDA formulas are
/// never subject to implicit intersection.
pub fn write_expr_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    expr: &Expr,
    format: &Format,
) -> Result<(), CapbookError> {
    let row = cast_row_num(row_idx)?;
    let col = cast_col_num(col_idx)?;
    let c_formula = expr.to_formula();
    worksheet
        .write_dynamic_formula_with_format(row, col, c_formula.as_str(), format)
        .map(|_| ())
        .map_err(|err| CapbookError::from_xlsx(format!("formula ({row_idx}, {col_idx})"), err))
}

/// Write a label cell.
pub fn write_label(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    label: &str,
    format: &Format,
) -> Result<(), CapbookError> {
    write_cell_with_format(
        worksheet,
        row_idx,
        col_idx,
        &EnumCellValue::String(label.to_string()),
        format,
    )
}

/// Zero-based inclusive rectangle `(first_row, first_col, last_row, last_col)`.
pub type TupCellRange = (usize, usize, usize, usize);

/// Apply ordered rules as stop-if-true conditional formats.
pub fn apply_status_rules(
    worksheet: &mut Worksheet,
    range: TupCellRange,
    rules: &[SpecStatusRule],
    styles: &StyleRegistry,
) -> Result<(), CapbookError> {
    let (r1, c1, r2, c2) = range;
    for rule in rules {
        let c_rule = rule.formula.to_formula();
        let conditional_format = ConditionalFormatFormula::new()
            .set_rule(c_rule.as_str())
            .set_format(styles.get(rule.style))
            .set_stop_if_true(true);
        worksheet
            .add_conditional_format(
                cast_row_num(r1)?,
                cast_col_num(c1)?,
                cast_row_num(r2)?,
                cast_col_num(c2)?,
                &conditional_format,
            )
            .map_err(|err| CapbookError::from_xlsx(format!("rule `{}`", rule.label), err))?;
    }
    Ok(())
}

/// Dropdown over literal options, falling back to `fallback_range` when the
/// joined list exceeds the inline limit.
pub fn add_list_validation(
    worksheet: &mut Worksheet,
    range: TupCellRange,
    options: &[String],
    fallback_range: Option<&str>,
) -> Result<(), CapbookError> {
    let n_len_joined =
        options.iter().map(|item| item.len()).sum::<usize>() + options.len().saturating_sub(1);
    let validation = if !options.is_empty() && n_len_joined <= N_LEN_LIST_VALIDATION_MAX {
        let l_options: Vec<&str> = options.iter().map(String::as_str).collect();
        DataValidation::new()
            .allow_list_strings(&l_options)
            .map_err(|err| CapbookError::from_xlsx("list validation", err))?
    } else if let Some(c_range) = fallback_range {
        DataValidation::new().allow_list_formula(Formula::new(format!("={c_range}")))
    } else {
        return Ok(());
    };
    add_data_validation(worksheet, range, &validation)
}

/// Dropdown sourced from an absolute range.
pub fn add_range_validation(
    worksheet: &mut Worksheet,
    range: TupCellRange,
    source_range: &str,
) -> Result<(), CapbookError> {
    let validation =
        DataValidation::new().allow_list_formula(Formula::new(format!("={source_range}")));
    add_data_validation(worksheet, range, &validation)
}

fn add_data_validation(
    worksheet: &mut Worksheet,
    range: TupCellRange,
    validation: &DataValidation,
) -> Result<(), CapbookError> {
    let (r1, c1, r2, c2) = range;
    worksheet
        .add_data_validation(
            cast_row_num(r1)?,
            cast_col_num(c1)?,
            cast_row_num(r2)?,
            cast_col_num(c2)?,
            validation,
        )
        .map_err(|err| CapbookError::from_xlsx("data validation", err))?;
    Ok(())
}

/// Pre-format the cells a spill will land in.
pub fn format_blank_range(
    worksheet: &mut Worksheet,
    range: TupCellRange,
    format: &Format,
) -> Result<(), CapbookError> {
    let (r1, c1, r2, c2) = range;
    for n_row in r1..=r2 {
        for n_col in c1..=c2 {
            write_cell_with_format(worksheet, n_row, n_col, &EnumCellValue::None, format)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{TBL_MINIMUM_SCALE, TBL_SALARY_BOOK_YEARLY};
    use crate::contract::find_table_contract;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        fn new() -> Self {
            let n = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos();
            let path = std::env::temp_dir().join(format!("capbook_writer_test_{n}"));
            std::fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn test_empty_table_gets_placeholder_row() {
        let tmp = TestDir::new();
        let styles = StyleRegistry::new();
        let mut writer = CapbookWriter::new(tmp.path().join("out.xlsx"));
        writer.check_default_font(&styles).expect("font");

        let contract = find_table_contract(TBL_MINIMUM_SCALE).expect("contract");
        let data = SpecTableData {
            columns: contract.column_names(),
            rows: vec![],
        };
        let layout = writer.write_table(&contract, &data, &styles).expect("write");
        assert_eq!(layout.sheet_name, "DATA_minimum_scale");
        assert_eq!(layout.n_rows_real, 0);
        assert_eq!(layout.n_rows_written, 1);
        assert_eq!(
            layout.column_range("minimum_salary_amount").as_deref(),
            Some("DATA_minimum_scale!$D$2")
        );

        writer.close().expect("close");
        writer.close().expect("close twice");
        assert!(tmp.path().join("out.xlsx").exists());
    }

    #[test]
    fn test_unprojected_rows_are_rejected() {
        let styles = StyleRegistry::new();
        let mut writer = CapbookWriter::new("unused.xlsx");
        let contract = find_table_contract(TBL_SALARY_BOOK_YEARLY).expect("contract");
        let data = SpecTableData {
            columns: vec!["player_name".to_string()],
            rows: vec![],
        };
        let err = writer
            .write_table(&contract, &data, &styles)
            .expect_err("mismatch");
        assert!(matches!(err, CapbookError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_duplicate_sheet_is_rejected_and_roles_sort() {
        let mut writer = CapbookWriter::new("unused.xlsx");
        let mut ws = Worksheet::new();
        ws.set_name("META").expect("name");
        writer.add_worksheet(EnumSheetRole::Meta, ws).expect("add");

        let mut ws = Worksheet::new();
        ws.set_name("META").expect("name");
        assert!(writer.add_worksheet(EnumSheetRole::Meta, ws).is_err());

        assert!(EnumSheetRole::Playground < EnumSheetRole::Matrix);
        assert!(EnumSheetRole::Meta < EnumSheetRole::Calc);
        assert!(EnumSheetRole::Calc < EnumSheetRole::Data);
    }

    #[test]
    fn test_default_font_check_must_precede_sheets() {
        let styles = StyleRegistry::new();
        let mut writer = CapbookWriter::new("unused.xlsx");
        assert!(writer.check_default_font(&styles).is_ok());

        let mut ws = Worksheet::new();
        ws.set_name("CALC").expect("name");
        writer.add_worksheet(EnumSheetRole::Calc, ws).expect("add");
        let err = writer.check_default_font(&styles).expect_err("late check");
        assert!(err.to_string().contains("before any worksheet"));
    }
}
