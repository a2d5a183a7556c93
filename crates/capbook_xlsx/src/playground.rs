//! PLAYGROUND: the single-team scenario sheet.
//!
//! Layout is computed up front by [`derive_playground_layout`]; the writer
//! then walks it. Scenario math lives on CALC; this sheet only holds inputs,
//! the roster spill family and references to `Scn*` names.

use rust_xlsxwriter::{Format, Worksheet};
use tracing::info;

use crate::conf::{
    C_SHEET_PLAYGROUND, EnumStyleKey, N_SIGN_ROWS, N_STRETCH_ROWS, N_TRADE_IN_ROWS,
    N_TRADE_OUT_ROWS, N_WAIVE_ROWS, N_YEAR_OFFSETS, TBL_SALARY_BOOK_WAREHOUSE,
    TBL_SALARY_BOOK_YEARLY, TBL_TEAM_SALARY_WAREHOUSE,
};
use crate::error::CapbookError;
use crate::formula::builders::{
    ROOM_LINES, exceptions_spill, kpi_filled_total, room, roster_agent_spill, roster_names_spill,
    roster_pct_spill, roster_rank_spill, roster_salary_spill, roster_status_spill,
    roster_total_spill, scn, season_label, trade_in_salary, trade_legality, trade_max_incoming,
    trade_out_salary, trade_pad, trade_post_apron_total, trade_remaining, two_way_count, year_at,
};
use crate::formula::expr::{Expr, name, text};
use crate::formula::func as fx;
use crate::formula::status::{
    SpecStatusSources, derive_name_status_rules, derive_room_rules, derive_salary_status_rules,
    derive_verdict_rules,
};
use crate::names::{
    EnumScnScalar, FILL_DELAY_DAYS, FILL_EVENT_DATE, FILL_TO_12_MIN_TYPE, FILL_TO_14_MIN_TYPE,
    META_VALIDATION_STATUS, NameRegistry, SELECTED_MODE, SELECTED_TEAM, SELECTED_YEAR, SIGN_NAMES,
    SIGN_SALARIES, STRETCH_NAMES, TRADE_IN_NAMES, TRADE_IN_SALARY, TRADE_LEGALITY,
    TRADE_MAX_INCOMING, TRADE_OUT_NAMES, TRADE_OUT_SALARY, TRADE_PAD, TRADE_POST_APRON_TOTAL,
    TRADE_REMAINING, WAIVED_NAMES,
};
use crate::spec::{EnumCellValue, EnumFillBasis, EnumSalaryLayer, EnumValidationStatus};
use crate::style::StyleRegistry;
use crate::util::{cast_col_num, derive_abs_cell_ref, derive_cell_ref};
use crate::writer::{
    CapbookWriter, EnumSheetRole, SpecTableLayout, TupCellRange, add_list_validation,
    add_range_validation, apply_status_rules, format_blank_range, new_formula_worksheet,
    write_cell_with_format, write_expr_with_format, write_label,
};

////////////////////////////////////////////////////////////////////////////////
// #region Layout

pub const N_ROW_KPI: usize = 0;
pub const N_ROW_SELECTORS: usize = 1;
pub const N_ROW_HEADERS: usize = 2;
pub const N_ROW_GRID_FIRST: usize = 3;

pub const N_COL_RAIL_NAME: usize = 0;
pub const N_COL_RAIL_VALUE: usize = 1;
pub const N_COL_RANK: usize = 3;
pub const N_COL_NAME: usize = 4;
pub const N_COL_SALARY_FIRST: usize = 5;
pub const N_COL_PCT_FIRST: usize = N_COL_SALARY_FIRST + N_YEAR_OFFSETS;
pub const N_COL_TOTAL: usize = N_COL_PCT_FIRST + N_YEAR_OFFSETS;
pub const N_COL_AGENT: usize = N_COL_TOTAL + 1;
pub const N_COL_STATUS: usize = N_COL_AGENT + 1;
pub const N_COL_EXCEPTIONS_FIRST: usize = N_COL_STATUS + 2;

const N_WIDTH_RAIL: f64 = 22.0;
const N_WIDTH_NAME: f64 = 24.0;
const N_WIDTH_NARROW: f64 = 6.0;
const N_WIDTH_MONEY: f64 = 11.0;

/// One fixed-size input block of the left rail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRailBlock {
    pub title: &'static str,
    pub range_name: &'static str,
    /// Paired salary range in the value column (SIGN only).
    pub salary_range_name: Option<&'static str>,
    /// Whether names are validated against the salary book.
    pub if_validated: bool,
    pub title_row: usize,
    pub n_rows: usize,
}

impl SpecRailBlock {
    pub fn first_row(&self) -> usize {
        self.title_row + 1
    }

    pub fn last_row(&self) -> usize {
        self.title_row + self.n_rows
    }
}

/// One labelled single-cell row of the rail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRailField {
    pub label: &'static str,
    pub name: &'static str,
    pub row: usize,
}

/// Every position PLAYGROUND writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecPlaygroundLayout {
    pub blocks: Vec<SpecRailBlock>,
    pub trade_math_title_row: usize,
    pub trade_math: Vec<SpecRailField>,
    pub fill_title_row: usize,
    pub fill: Vec<SpecRailField>,
    pub n_roster_rows: usize,
    pub totals_first_row: usize,
    pub n_exception_rows: usize,
}

impl SpecPlaygroundLayout {
    pub fn roster_last_row(&self) -> usize {
        N_ROW_GRID_FIRST + self.n_roster_rows - 1
    }

    /// Rows occupied by the totals block.
    pub fn totals_last_row(&self) -> usize {
        self.totals_first_row + TUP_TOTAL_SCALARS.len() + ROOM_LINES.len() - 1
    }
}

/// Totals block rows backed by CALC scalars.
const TUP_TOTAL_SCALARS: [(&str, EnumScnScalar); 11] = [
    ("Cap Total", EnumScnScalar::CapTotal),
    ("Tax Total", EnumScnScalar::TaxTotal),
    ("Apron Total", EnumScnScalar::ApronTotal),
    ("Dead Money", EnumScnScalar::DeadMoney),
    ("Cap Holds", EnumScnScalar::CapHolds),
    ("Fill to 12", EnumScnScalar::Fill12Amount),
    ("Fill to 14", EnumScnScalar::Fill14Amount),
    ("Cap Total (filled)", EnumScnScalar::CapTotalFilled),
    ("Tax Total (filled)", EnumScnScalar::TaxTotalFilled),
    ("Apron Total (filled)", EnumScnScalar::ApronTotalFilled),
    ("Tax Payment", EnumScnScalar::TaxPayment),
];

/// Compute the sheet layout for the reserved row counts.
pub fn derive_playground_layout(n_roster_rows: usize, n_exception_rows: usize) -> SpecPlaygroundLayout {
    let l_specs: [(&str, &str, Option<&str>, bool, usize); 5] = [
        ("TRADE OUT", TRADE_OUT_NAMES, None, true, N_TRADE_OUT_ROWS),
        ("TRADE IN", TRADE_IN_NAMES, None, true, N_TRADE_IN_ROWS),
        ("WAIVE", WAIVED_NAMES, None, true, N_WAIVE_ROWS),
        ("STRETCH", STRETCH_NAMES, None, true, N_STRETCH_ROWS),
        ("SIGN", SIGN_NAMES, Some(SIGN_SALARIES), false, N_SIGN_ROWS),
    ];
    let mut n_row = N_ROW_GRID_FIRST;
    let mut blocks = Vec::with_capacity(l_specs.len());
    for (title, range_name, salary_range_name, if_validated, n_rows) in l_specs {
        blocks.push(SpecRailBlock {
            title,
            range_name,
            salary_range_name,
            if_validated,
            title_row: n_row,
            n_rows,
        });
        n_row += n_rows + 1;
    }

    let trade_math_title_row = n_row;
    let trade_math: Vec<SpecRailField> = [
        ("Out Salary", TRADE_OUT_SALARY),
        ("In Salary", TRADE_IN_SALARY),
        ("Post-Trade Apron Total", TRADE_POST_APRON_TOTAL),
        ("Pad", TRADE_PAD),
        ("Max Incoming", TRADE_MAX_INCOMING),
        ("Remaining", TRADE_REMAINING),
        ("Legality", TRADE_LEGALITY),
    ]
    .into_iter()
    .enumerate()
    .map(|(n_idx, (label, name))| SpecRailField {
        label,
        name,
        row: trade_math_title_row + 1 + n_idx,
    })
    .collect();

    let fill_title_row = trade_math_title_row + trade_math.len() + 1;
    let fill: Vec<SpecRailField> = [
        ("Fill to 12 basis", FILL_TO_12_MIN_TYPE),
        ("Fill to 14 basis", FILL_TO_14_MIN_TYPE),
        ("Fill event date", FILL_EVENT_DATE),
        ("Fill delay days", FILL_DELAY_DAYS),
    ]
    .into_iter()
    .enumerate()
    .map(|(n_idx, (label, name))| SpecRailField {
        label,
        name,
        row: fill_title_row + 1 + n_idx,
    })
    .collect();

    SpecPlaygroundLayout {
        blocks,
        trade_math_title_row,
        trade_math,
        fill_title_row,
        fill,
        n_roster_rows: n_roster_rows.max(1),
        totals_first_row: N_ROW_GRID_FIRST + n_roster_rows.max(1) + 1,
        n_exception_rows: n_exception_rows.max(1),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Writer

/// Inputs PLAYGROUND needs beyond the registries.
#[derive(Debug, Clone)]
pub struct SpecPlaygroundOptions<'a> {
    pub team_codes: &'a [String],
    pub n_roster_rows: usize,
    pub n_exception_rows: usize,
}

fn find_layout(writer: &CapbookWriter, table_name: &str) -> Result<SpecTableLayout, CapbookError> {
    writer
        .layout(table_name)
        .cloned()
        .ok_or_else(|| CapbookError::InvalidReference {
            name: table_name.to_string(),
            message: "table not written before PLAYGROUND".to_string(),
        })
}

fn column_range(layout: &SpecTableLayout, column: &str) -> Result<String, CapbookError> {
    layout
        .column_range(column)
        .ok_or_else(|| CapbookError::InvalidReference {
            name: format!("{}[{column}]", layout.table_name),
            message: "column missing from written table".to_string(),
        })
}

/// Declare PLAYGROUND names and write the sheet.
pub fn write_playground_sheet(
    writer: &mut CapbookWriter,
    styles: &StyleRegistry,
    names: &mut NameRegistry,
    options: &SpecPlaygroundOptions<'_>,
) -> Result<SpecPlaygroundLayout, CapbookError> {
    let layout = derive_playground_layout(options.n_roster_rows, options.n_exception_rows);
    let layout_yearly = find_layout(writer, TBL_SALARY_BOOK_YEARLY)?;
    let layout_book = find_layout(writer, TBL_SALARY_BOOK_WAREHOUSE)?;
    let layout_team = find_layout(writer, TBL_TEAM_SALARY_WAREHOUSE)?;

    let mut worksheet = new_formula_worksheet(C_SHEET_PLAYGROUND)?;
    write_kpi_bar(&mut worksheet, styles)?;
    write_selectors(&mut worksheet, styles, names, options, &layout_team)?;
    write_headers(&mut worksheet, styles)?;
    write_rail(&mut worksheet, styles, names, &layout, &layout_yearly)?;
    write_roster_grid(&mut worksheet, styles, &layout, &layout_yearly, &layout_book)?;
    write_totals(&mut worksheet, styles, &layout)?;
    write_exceptions(&mut worksheet, styles, &layout)?;

    worksheet
        .set_freeze_panes(3, 3)
        .map_err(|err| CapbookError::from_xlsx("playground freeze panes", err))?;
    for (n_col, n_width) in [
        (N_COL_RAIL_NAME, N_WIDTH_RAIL),
        (N_COL_RAIL_VALUE, N_WIDTH_MONEY + 2.0),
        (N_COL_RANK, N_WIDTH_NARROW),
        (N_COL_NAME, N_WIDTH_NAME),
        (N_COL_AGENT, N_WIDTH_NAME),
        (N_COL_EXCEPTIONS_FIRST, N_WIDTH_NAME),
    ] {
        worksheet
            .set_column_width(cast_col_num(n_col)?, n_width)
            .map_err(|err| CapbookError::from_xlsx("playground column width", err))?;
    }
    for n_col in N_COL_SALARY_FIRST..=N_COL_TOTAL {
        worksheet
            .set_column_width(cast_col_num(n_col)?, N_WIDTH_MONEY)
            .map_err(|err| CapbookError::from_xlsx("playground column width", err))?;
    }

    writer.add_worksheet(EnumSheetRole::Playground, worksheet)?;
    info!(
        roster_rows = layout.n_roster_rows,
        exception_rows = layout.n_exception_rows,
        "playground written"
    );
    Ok(layout)
}

fn write_kpi_bar(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
) -> Result<(), CapbookError> {
    let fmt_title = styles.get(EnumStyleKey::Title);
    let fmt_label = styles.get(EnumStyleKey::KpiLabel);
    let fmt_value = styles.get(EnumStyleKey::KpiValue);
    let fmt_money = styles.get(EnumStyleKey::KpiMoney);
    let fmt_delta = styles.get(EnumStyleKey::KpiDelta);

    write_expr_with_format(
        worksheet,
        N_ROW_KPI,
        N_COL_RAIL_NAME,
        &text("Season ").concat(season_label(0)),
        &fmt_title,
    )?;

    let mut l_kpis: Vec<(&str, Expr, bool)> = vec![
        ("Roster", scn(EnumScnScalar::RosterCount, 0), false),
        ("Two-Way", two_way_count(), false),
        ("Filled Total", kpi_filled_total(), false),
    ];
    for (label, line) in [
        ("vs Cap", &ROOM_LINES[0]),
        ("vs Tax", &ROOM_LINES[1]),
        ("vs Apron1", &ROOM_LINES[2]),
        ("vs Apron2", &ROOM_LINES[3]),
    ] {
        l_kpis.push((label, room(line, 0), true));
    }

    let mut n_col = N_COL_RANK;
    for (n_idx, (label, expr, if_delta)) in l_kpis.iter().enumerate() {
        write_label(worksheet, N_ROW_KPI, n_col, label, &fmt_label)?;
        let fmt = if *if_delta {
            &fmt_delta
        } else if n_idx < 2 {
            &fmt_value
        } else {
            &fmt_money
        };
        write_expr_with_format(worksheet, N_ROW_KPI, n_col + 1, expr, fmt)?;
        if *if_delta {
            let c_cell = derive_cell_ref(N_ROW_KPI, n_col + 1, false, false);
            apply_status_rules(
                worksheet,
                (N_ROW_KPI, n_col + 1, N_ROW_KPI, n_col + 1),
                &derive_room_rules(&c_cell),
                styles,
            )?;
        }
        n_col += 2;
    }

    let banner = fx::iff(
        name(META_VALIDATION_STATUS).equals(text(EnumValidationStatus::Pass.as_str())),
        text(""),
        text("VALIDATION FAILED: see META"),
    );
    write_expr_with_format(
        worksheet,
        N_ROW_KPI,
        n_col + 1,
        &banner,
        &styles.get(EnumStyleKey::Banner),
    )?;
    Ok(())
}

fn write_selectors(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
    names: &mut NameRegistry,
    options: &SpecPlaygroundOptions<'_>,
    layout_team: &SpecTableLayout,
) -> Result<(), CapbookError> {
    let fmt_label = styles.get(EnumStyleKey::SectionLabel);
    let fmt_input = styles.get(EnumStyleKey::Input);
    let fmt_integer = styles.get(EnumStyleKey::Integer);

    write_label(worksheet, N_ROW_SELECTORS, N_COL_RAIL_NAME, "Team", &fmt_label)?;
    let c_team_default = options.team_codes.first().cloned().unwrap_or_default();
    write_cell_with_format(
        worksheet,
        N_ROW_SELECTORS,
        N_COL_RAIL_VALUE,
        &EnumCellValue::String(c_team_default),
        &fmt_input,
    )?;
    let c_team_range = column_range(layout_team, "team_code")?;
    add_list_validation(
        worksheet,
        (N_ROW_SELECTORS, N_COL_RAIL_VALUE, N_ROW_SELECTORS, N_COL_RAIL_VALUE),
        options.team_codes,
        Some(&c_team_range),
    )?;
    names.declare_cell(SELECTED_TEAM, C_SHEET_PLAYGROUND, N_ROW_SELECTORS, N_COL_RAIL_VALUE)?;

    write_label(worksheet, N_ROW_SELECTORS, N_COL_RANK, "Mode", &fmt_label)?;
    write_cell_with_format(
        worksheet,
        N_ROW_SELECTORS,
        N_COL_NAME,
        &EnumCellValue::String(EnumSalaryLayer::Cap.label().to_string()),
        &fmt_input,
    )?;
    let l_modes: Vec<String> = EnumSalaryLayer::ALL
        .iter()
        .map(|layer| layer.label().to_string())
        .collect();
    add_list_validation(
        worksheet,
        (N_ROW_SELECTORS, N_COL_NAME, N_ROW_SELECTORS, N_COL_NAME),
        &l_modes,
        None,
    )?;
    names.declare_cell(SELECTED_MODE, C_SHEET_PLAYGROUND, N_ROW_SELECTORS, N_COL_NAME)?;

    write_label(worksheet, N_ROW_SELECTORS, N_COL_SALARY_FIRST, "Year", &fmt_label)?;
    write_expr_with_format(
        worksheet,
        N_ROW_SELECTORS,
        N_COL_SALARY_FIRST + 1,
        &year_at(0),
        &fmt_integer,
    )?;
    names.declare_cell(
        SELECTED_YEAR,
        C_SHEET_PLAYGROUND,
        N_ROW_SELECTORS,
        N_COL_SALARY_FIRST + 1,
    )?;
    Ok(())
}

fn write_headers(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
) -> Result<(), CapbookError> {
    let fmt_left = styles.get(EnumStyleKey::HeaderLeft);
    let fmt_right = styles.get(EnumStyleKey::HeaderRight);
    let fmt_center = styles.get(EnumStyleKey::HeaderCenter);

    write_label(worksheet, N_ROW_HEADERS, N_COL_RAIL_NAME, "Inputs", &fmt_left)?;
    write_cell_with_format(
        worksheet,
        N_ROW_HEADERS,
        N_COL_RAIL_VALUE,
        &EnumCellValue::None,
        &fmt_left,
    )?;
    write_label(worksheet, N_ROW_HEADERS, N_COL_RANK, "#", &fmt_center)?;
    write_label(worksheet, N_ROW_HEADERS, N_COL_NAME, "Player", &fmt_left)?;
    for off in 0..N_YEAR_OFFSETS {
        write_expr_with_format(
            worksheet,
            N_ROW_HEADERS,
            N_COL_SALARY_FIRST + off,
            &season_label(off),
            &fmt_right,
        )?;
        write_expr_with_format(
            worksheet,
            N_ROW_HEADERS,
            N_COL_PCT_FIRST + off,
            &text("% ").concat(season_label(off)),
            &fmt_right,
        )?;
    }
    write_label(worksheet, N_ROW_HEADERS, N_COL_TOTAL, "Total", &fmt_right)?;
    write_label(worksheet, N_ROW_HEADERS, N_COL_AGENT, "Agent", &fmt_left)?;
    write_label(worksheet, N_ROW_HEADERS, N_COL_STATUS, "Status", &fmt_center)?;
    for (n_idx, label) in ["Exception", "Remaining", "Expires"].iter().enumerate() {
        write_label(
            worksheet,
            N_ROW_HEADERS,
            N_COL_EXCEPTIONS_FIRST + n_idx,
            label,
            &fmt_left,
        )?;
    }
    Ok(())
}

fn write_rail(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
    names: &mut NameRegistry,
    layout: &SpecPlaygroundLayout,
    layout_yearly: &SpecTableLayout,
) -> Result<(), CapbookError> {
    let fmt_section = styles.get(EnumStyleKey::SectionLabel);
    let fmt_input = styles.get(EnumStyleKey::Input);
    let fmt_input_money = styles.get(EnumStyleKey::InputMoney);
    let fmt_label = styles.get(EnumStyleKey::Muted);
    let fmt_money = styles.get(EnumStyleKey::Money);
    let c_player_range = column_range(layout_yearly, "player_name")?;

    for block in &layout.blocks {
        write_label(worksheet, block.title_row, N_COL_RAIL_NAME, block.title, &fmt_section)?;
        format_blank_range(
            worksheet,
            (block.first_row(), N_COL_RAIL_NAME, block.last_row(), N_COL_RAIL_NAME),
            &fmt_input,
        )?;
        names.declare_range(
            block.range_name,
            C_SHEET_PLAYGROUND,
            (block.first_row(), N_COL_RAIL_NAME),
            (block.last_row(), N_COL_RAIL_NAME),
        )?;
        if block.if_validated {
            add_range_validation(
                worksheet,
                (block.first_row(), N_COL_RAIL_NAME, block.last_row(), N_COL_RAIL_NAME),
                &c_player_range,
            )?;
        }
        if let Some(salary_range_name) = block.salary_range_name {
            write_label(worksheet, block.title_row, N_COL_RAIL_VALUE, "Salary", &fmt_section)?;
            format_blank_range(
                worksheet,
                (block.first_row(), N_COL_RAIL_VALUE, block.last_row(), N_COL_RAIL_VALUE),
                &fmt_input_money,
            )?;
            names.declare_range(
                salary_range_name,
                C_SHEET_PLAYGROUND,
                (block.first_row(), N_COL_RAIL_VALUE),
                (block.last_row(), N_COL_RAIL_VALUE),
            )?;
        }
    }

    write_label(
        worksheet,
        layout.trade_math_title_row,
        N_COL_RAIL_NAME,
        "TRADE MATH",
        &fmt_section,
    )?;
    for field in &layout.trade_math {
        let expr = match field.name {
            TRADE_OUT_SALARY => trade_out_salary(),
            TRADE_IN_SALARY => trade_in_salary(),
            TRADE_POST_APRON_TOTAL => trade_post_apron_total(),
            TRADE_PAD => trade_pad(),
            TRADE_MAX_INCOMING => trade_max_incoming(),
            TRADE_REMAINING => trade_remaining(),
            _ => trade_legality(),
        };
        write_label(worksheet, field.row, N_COL_RAIL_NAME, field.label, &fmt_label)?;
        write_expr_with_format(worksheet, field.row, N_COL_RAIL_VALUE, &expr, &fmt_money)?;
        names.declare_cell(field.name, C_SHEET_PLAYGROUND, field.row, N_COL_RAIL_VALUE)?;
        if field.name == TRADE_LEGALITY {
            let c_cell = derive_cell_ref(field.row, N_COL_RAIL_VALUE, false, false);
            apply_status_rules(
                worksheet,
                (field.row, N_COL_RAIL_VALUE, field.row, N_COL_RAIL_VALUE),
                &derive_verdict_rules(&c_cell, "PASS", "FAIL"),
                styles,
            )?;
        }
    }

    write_label(worksheet, layout.fill_title_row, N_COL_RAIL_NAME, "FILL", &fmt_section)?;
    let l_bases: Vec<String> = EnumFillBasis::ALL
        .iter()
        .map(|basis| basis.label().to_string())
        .collect();
    for field in &layout.fill {
        write_label(worksheet, field.row, N_COL_RAIL_NAME, field.label, &fmt_label)?;
        let range: TupCellRange = (field.row, N_COL_RAIL_VALUE, field.row, N_COL_RAIL_VALUE);
        match field.name {
            FILL_TO_12_MIN_TYPE | FILL_TO_14_MIN_TYPE => {
                let basis = if field.name == FILL_TO_12_MIN_TYPE {
                    EnumFillBasis::Rookie
                } else {
                    EnumFillBasis::Vet
                };
                write_cell_with_format(
                    worksheet,
                    field.row,
                    N_COL_RAIL_VALUE,
                    &EnumCellValue::String(basis.label().to_string()),
                    &fmt_input,
                )?;
                add_list_validation(worksheet, range, &l_bases, None)?;
            }
            FILL_EVENT_DATE => {
                write_cell_with_format(
                    worksheet,
                    field.row,
                    N_COL_RAIL_VALUE,
                    &EnumCellValue::None,
                    &styles.get(EnumStyleKey::InputDate),
                )?;
            }
            _ => {
                write_cell_with_format(
                    worksheet,
                    field.row,
                    N_COL_RAIL_VALUE,
                    &EnumCellValue::Number(0.0),
                    &styles.get(EnumStyleKey::InputInteger),
                )?;
            }
        }
        names.declare_cell(field.name, C_SHEET_PLAYGROUND, field.row, N_COL_RAIL_VALUE)?;
    }
    Ok(())
}

fn write_roster_grid(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
    layout: &SpecPlaygroundLayout,
    layout_yearly: &SpecTableLayout,
    layout_book: &SpecTableLayout,
) -> Result<(), CapbookError> {
    let n_first = N_ROW_GRID_FIRST;
    let n_last = layout.roster_last_row();
    let c_name_anchor = derive_abs_cell_ref(n_first, N_COL_NAME);
    let c_status_anchor = derive_abs_cell_ref(n_first, N_COL_STATUS);
    let l_salary_anchors: Vec<String> = (0..N_YEAR_OFFSETS)
        .map(|off| derive_abs_cell_ref(n_first, N_COL_SALARY_FIRST + off))
        .collect();

    let fmt_text = styles.get(EnumStyleKey::Text);
    let fmt_millions = styles.get(EnumStyleKey::MoneyMillions);
    let fmt_pct = styles.get(EnumStyleKey::Percent);
    let fmt_rank = styles.get(EnumStyleKey::Integer);
    let fmt_muted = styles.get(EnumStyleKey::Muted);

    let mut l_columns: Vec<(usize, Expr, &Format)> = vec![
        (N_COL_NAME, roster_names_spill(layout.n_roster_rows), &fmt_text),
        (
            N_COL_RANK,
            roster_rank_spill(&c_name_anchor, &c_status_anchor),
            &fmt_rank,
        ),
        (
            N_COL_TOTAL,
            roster_total_spill(&c_name_anchor, &l_salary_anchors),
            &fmt_millions,
        ),
        (N_COL_AGENT, roster_agent_spill(&c_name_anchor), &fmt_muted),
        (N_COL_STATUS, roster_status_spill(&c_name_anchor), &fmt_text),
    ];
    for off in 0..N_YEAR_OFFSETS {
        l_columns.push((
            N_COL_SALARY_FIRST + off,
            roster_salary_spill(&c_name_anchor, off),
            &fmt_millions,
        ));
        l_columns.push((
            N_COL_PCT_FIRST + off,
            roster_pct_spill(&c_name_anchor, &l_salary_anchors[off], off),
            &fmt_pct,
        ));
    }
    for (n_col, expr, fmt) in &l_columns {
        if n_last > n_first {
            format_blank_range(worksheet, (n_first + 1, *n_col, n_last, *n_col), fmt)?;
        }
        write_expr_with_format(worksheet, n_first, *n_col, expr, fmt)?;
    }

    let c_name_cell = derive_cell_ref(n_first, N_COL_NAME, false, true);
    let c_status_cell = derive_cell_ref(n_first, N_COL_STATUS, false, true);
    apply_status_rules(
        worksheet,
        (n_first, N_COL_NAME, n_last, N_COL_NAME),
        &derive_name_status_rules(&c_status_cell),
        styles,
    )?;
    let sources = SpecStatusSources {
        yearly: layout_yearly,
        book: layout_book,
    };
    for off in 0..N_YEAR_OFFSETS {
        let n_col = N_COL_SALARY_FIRST + off;
        let c_salary_cell = derive_cell_ref(n_first, n_col, false, false);
        let l_rules = derive_salary_status_rules(sources, &c_name_cell, &c_salary_cell, off)?;
        apply_status_rules(worksheet, (n_first, n_col, n_last, n_col), &l_rules, styles)?;
    }
    Ok(())
}

fn write_totals(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
    layout: &SpecPlaygroundLayout,
) -> Result<(), CapbookError> {
    let fmt_label = styles.get(EnumStyleKey::SectionLabel);
    let fmt_money = styles.get(EnumStyleKey::MoneyMillions);
    let fmt_delta = styles.get(EnumStyleKey::KpiDelta);

    let mut n_row = layout.totals_first_row;
    for (label, scalar) in TUP_TOTAL_SCALARS {
        write_label(worksheet, n_row, N_COL_NAME, label, &fmt_label)?;
        for off in 0..N_YEAR_OFFSETS {
            write_expr_with_format(
                worksheet,
                n_row,
                N_COL_SALARY_FIRST + off,
                &scn(scalar, off),
                &fmt_money,
            )?;
        }
        n_row += 1;
    }
    for line in &ROOM_LINES {
        write_label(worksheet, n_row, N_COL_NAME, line.label, &fmt_label)?;
        for off in 0..N_YEAR_OFFSETS {
            write_expr_with_format(
                worksheet,
                n_row,
                N_COL_SALARY_FIRST + off,
                &room(line, off),
                &fmt_delta,
            )?;
        }
        let c_first = derive_cell_ref(n_row, N_COL_SALARY_FIRST, false, false);
        apply_status_rules(
            worksheet,
            (
                n_row,
                N_COL_SALARY_FIRST,
                n_row,
                N_COL_SALARY_FIRST + N_YEAR_OFFSETS - 1,
            ),
            &derive_room_rules(&c_first),
            styles,
        )?;
        n_row += 1;
    }
    Ok(())
}

fn write_exceptions(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
    layout: &SpecPlaygroundLayout,
) -> Result<(), CapbookError> {
    let n_first = N_ROW_GRID_FIRST;
    let n_last = N_ROW_GRID_FIRST + layout.n_exception_rows - 1;
    let l_formats = [
        styles.get(EnumStyleKey::Text),
        styles.get(EnumStyleKey::Money),
        styles.get(EnumStyleKey::Date),
    ];
    for (n_idx, fmt) in l_formats.iter().enumerate() {
        if n_last > n_first {
            format_blank_range(
                worksheet,
                (n_first + 1, N_COL_EXCEPTIONS_FIRST + n_idx, n_last, N_COL_EXCEPTIONS_FIRST + n_idx),
                fmt,
            )?;
        }
    }
    write_expr_with_format(
        worksheet,
        n_first,
        N_COL_EXCEPTIONS_FIRST,
        &exceptions_spill(layout.n_exception_rows),
        &l_formats[0],
    )?;
    for (n_idx, fmt) in l_formats.iter().enumerate().skip(1) {
        write_cell_with_format(
            worksheet,
            n_first,
            N_COL_EXCEPTIONS_FIRST + n_idx,
            &EnumCellValue::None,
            fmt,
        )?;
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rail_blocks_are_contiguous_and_disjoint() {
        let layout = derive_playground_layout(40, 10);
        assert_eq!(layout.blocks[0].title_row, N_ROW_GRID_FIRST);
        assert_eq!(layout.blocks[0].first_row(), 4);
        assert_eq!(layout.blocks[0].last_row(), 4 + N_TRADE_OUT_ROWS - 1);
        for pair in layout.blocks.windows(2) {
            assert_eq!(pair[1].title_row, pair[0].last_row() + 1);
        }
        let sign = layout.blocks.last().expect("sign block");
        assert_eq!(sign.range_name, SIGN_NAMES);
        assert_eq!(sign.salary_range_name, Some(SIGN_SALARIES));
        assert!(!sign.if_validated);
        assert_eq!(layout.trade_math_title_row, sign.last_row() + 1);
        assert_eq!(layout.fill_title_row, layout.trade_math.last().expect("math").row + 1);
    }

    #[test]
    fn test_totals_sit_below_the_reserved_roster() {
        let layout = derive_playground_layout(40, 10);
        assert_eq!(layout.roster_last_row(), N_ROW_GRID_FIRST + 39);
        assert!(layout.totals_first_row > layout.roster_last_row());
        assert_eq!(
            layout.totals_last_row() - layout.totals_first_row + 1,
            TUP_TOTAL_SCALARS.len() + ROOM_LINES.len()
        );
    }

    #[test]
    fn test_totals_show_dead_money_and_cap_holds_before_fills() {
        let l_scalars: Vec<EnumScnScalar> = TUP_TOTAL_SCALARS.iter().map(|(_, s)| *s).collect();
        let n_dead = l_scalars.iter().position(|s| *s == EnumScnScalar::DeadMoney);
        let n_holds = l_scalars.iter().position(|s| *s == EnumScnScalar::CapHolds);
        let n_fill = l_scalars.iter().position(|s| *s == EnumScnScalar::Fill12Amount);
        assert_eq!(n_dead, Some(3));
        assert_eq!(n_holds, Some(4));
        assert!(n_holds < n_fill);
    }

    #[test]
    fn test_grid_columns_do_not_overlap_rail() {
        assert!(N_COL_RANK > N_COL_RAIL_VALUE);
        assert_eq!(N_COL_NAME, 4);
        assert_eq!(N_COL_STATUS, 19);
        assert!(N_COL_EXCEPTIONS_FIRST > N_COL_STATUS);
    }

    #[test]
    fn test_zero_reserved_rows_still_leave_an_anchor() {
        let layout = derive_playground_layout(0, 0);
        assert_eq!(layout.n_roster_rows, 1);
        assert_eq!(layout.n_exception_rows, 1);
        assert_eq!(layout.roster_last_row(), N_ROW_GRID_FIRST);
    }
}
