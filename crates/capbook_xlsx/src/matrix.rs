//! MATRIX: four stacked trade lanes and a shared Trade Details block.
//!
//! Every name declared here is local to the sheet, so a copied MATRIX tab
//! carries an independent scenario.

use rust_xlsxwriter::{Format, Worksheet};
use tracing::info;

use crate::conf::{
    C_SHEET_MATRIX, EnumStyleKey, N_FILL_TARGET_HIGH, N_FILL_TARGET_LOW, N_MATRIX_NAME_ROWS,
    N_MATRIX_TEAMS, TBL_SALARY_BOOK_YEARLY, TBL_TEAM_SALARY_WAREHOUSE,
};
use crate::error::CapbookError;
use crate::formula::builders::{
    mx_allowed_in_cap, mx_days_in_season, mx_fill_amount, mx_in_amount, mx_in_cap_total,
    mx_in_days, mx_out_amount, mx_out_cap_total, mx_out_days, mx_playing_start, mx_roster_count,
    mx_sign_date, mx_sign_delay_days, mx_tpe_allowance, mx_verdict, mx_works,
};
use crate::formula::expr::{Expr, cell, name};
use crate::formula::func as fx;
use crate::formula::status::derive_verdict_rules;
use crate::names::{
    META_AS_OF_DATE, META_BASE_YEAR, MX_DAYS_IN_SEASON, MX_FILL12_BASIS, MX_FILL14_BASIS,
    MX_IN_DAYS, MX_OUT_DAYS, MX_PLAYING_START, MX_SIGN_DATE, MX_SIGN_DELAY_DAYS,
    MX_SIGN_DELAY_LABEL, MX_TPE_ALLOWANCE, MX_TRADE_DATE, MX_VERDICT, MX_YEAR, NameRegistry,
    mx_team_name,
};
use crate::spec::{EnumCellValue, EnumFillBasis, EnumSalaryLayer, EnumSignDelay, EnumTradeMode};
use crate::style::StyleRegistry;
use crate::util::{cast_col_num, derive_cell_ref};
use crate::writer::{
    CapbookWriter, EnumSheetRole, SpecTableLayout, add_list_validation, add_range_validation,
    apply_status_rules, format_blank_range, new_formula_worksheet, write_cell_with_format,
    write_expr_with_format, write_label,
};

////////////////////////////////////////////////////////////////////////////////
// #region Layout

const N_ROW_TITLE: usize = 0;
const N_ROW_BLOCKS_FIRST: usize = 2;

const N_COL_DETAIL_LABEL: usize = 0;
const N_COL_DETAIL_VALUE: usize = 1;
/// First column of a lane; outgoing name, then one amount per layer.
const N_COL_OUT_NAME: usize = 3;
const N_COL_IN_NAME: usize = N_COL_OUT_NAME + 1 + EnumSalaryLayer::ALL.len() + 1;
const N_COL_LANE_LAST: usize = N_COL_IN_NAME + EnumSalaryLayer::ALL.len();
/// Hidden calc strip to the right of the lanes.
const N_COL_STRIP_FIRST: usize = N_COL_LANE_LAST + 2;

/// Title, selectors, headers, names, totals, legality, fill, spacer.
const N_LANE_HEIGHT: usize = 3 + N_MATRIX_NAME_ROWS + 4;

const N_WIDTH_LABEL: f64 = 18.0;
const N_WIDTH_NAME: f64 = 22.0;
const N_WIDTH_MONEY: f64 = 12.0;

/// Per-lane values computed on the hidden strip, in column order.
const TUP_STRIP_STEMS: [&str; 5] = [
    "OutCapTotal",
    "InCapTotal",
    "AllowedInCap",
    "Works",
    "RosterCount",
];

/// First row of lane `n_team` (1-based).
pub fn derive_lane_first_row(n_team: usize) -> usize {
    N_ROW_BLOCKS_FIRST + (n_team - 1) * N_LANE_HEIGHT
}

/// First and last row of a lane's name inputs.
pub fn derive_lane_name_rows(n_team: usize) -> (usize, usize) {
    let n_first = derive_lane_first_row(n_team) + 2;
    (n_first, n_first + N_MATRIX_NAME_ROWS - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumDetailKind {
    Year,
    Date,
    InputDate,
    DelaySelector,
    Integer,
    Money,
    FillBasis(EnumFillBasis),
}

/// Trade Details rows below the section title.
const TUP_DETAILS: [(&str, &str, EnumDetailKind); 12] = [
    ("Year", MX_YEAR, EnumDetailKind::Year),
    ("Playing Start", MX_PLAYING_START, EnumDetailKind::Date),
    ("Trade Date", MX_TRADE_DATE, EnumDetailKind::InputDate),
    ("Sign Delay", MX_SIGN_DELAY_LABEL, EnumDetailKind::DelaySelector),
    ("Sign Delay Days", MX_SIGN_DELAY_DAYS, EnumDetailKind::Integer),
    ("Sign Date", MX_SIGN_DATE, EnumDetailKind::Date),
    ("Days in Season", MX_DAYS_IN_SEASON, EnumDetailKind::Integer),
    ("Out Days", MX_OUT_DAYS, EnumDetailKind::Integer),
    ("In Days", MX_IN_DAYS, EnumDetailKind::Integer),
    ("TPE Allowance", MX_TPE_ALLOWANCE, EnumDetailKind::Money),
    (
        "Fill to 12 basis",
        MX_FILL12_BASIS,
        EnumDetailKind::FillBasis(EnumFillBasis::Rookie),
    ),
    (
        "Fill to 14 basis",
        MX_FILL14_BASIS,
        EnumDetailKind::FillBasis(EnumFillBasis::Vet),
    ),
];

fn derive_detail_formula(detail_name: &str) -> Option<Expr> {
    match detail_name {
        MX_YEAR => Some(name(META_BASE_YEAR)),
        MX_PLAYING_START => Some(mx_playing_start()),
        MX_TRADE_DATE => Some(name(META_AS_OF_DATE)),
        MX_SIGN_DELAY_DAYS => Some(mx_sign_delay_days()),
        MX_SIGN_DATE => Some(mx_sign_date()),
        MX_DAYS_IN_SEASON => Some(mx_days_in_season()),
        MX_OUT_DAYS => Some(mx_out_days()),
        MX_IN_DAYS => Some(mx_in_days()),
        MX_TPE_ALLOWANCE => Some(mx_tpe_allowance()),
        _ => None,
    }
}

fn derive_strip_formula(n_team: usize, stem: &str) -> Expr {
    match stem {
        "OutCapTotal" => mx_out_cap_total(n_team),
        "InCapTotal" => mx_in_cap_total(n_team),
        "AllowedInCap" => mx_allowed_in_cap(n_team),
        "Works" => mx_works(n_team),
        _ => mx_roster_count(n_team),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Writer

/// Declare the MATRIX names and write the sheet.
pub fn write_matrix_sheet(
    writer: &mut CapbookWriter,
    styles: &StyleRegistry,
    names: &mut NameRegistry,
    team_codes: &[String],
) -> Result<(), CapbookError> {
    let layout_yearly = writer
        .layout(TBL_SALARY_BOOK_YEARLY)
        .cloned()
        .ok_or_else(|| missing_table(TBL_SALARY_BOOK_YEARLY))?;
    let layout_team = writer
        .layout(TBL_TEAM_SALARY_WAREHOUSE)
        .cloned()
        .ok_or_else(|| missing_table(TBL_TEAM_SALARY_WAREHOUSE))?;
    let c_player_range = column_range(&layout_yearly, "player_name")?;
    let c_team_range = column_range(&layout_team, "team_code")?;

    let mut worksheet = new_formula_worksheet(C_SHEET_MATRIX)?;
    write_details(&mut worksheet, styles, names)?;
    for n_team in 1..=N_MATRIX_TEAMS {
        write_lane(
            &mut worksheet,
            styles,
            names,
            n_team,
            team_codes,
            &c_team_range,
            &c_player_range,
        )?;
    }
    write_verdict(&mut worksheet, styles, names)?;

    for (n_col, n_width) in [
        (N_COL_DETAIL_LABEL, N_WIDTH_LABEL),
        (N_COL_DETAIL_VALUE, N_WIDTH_MONEY),
        (N_COL_OUT_NAME, N_WIDTH_NAME),
        (N_COL_IN_NAME, N_WIDTH_NAME),
    ] {
        set_width(&mut worksheet, n_col, n_width)?;
    }
    for n_idx in 0..EnumSalaryLayer::ALL.len() {
        set_width(&mut worksheet, N_COL_OUT_NAME + 1 + n_idx, N_WIDTH_MONEY)?;
        set_width(&mut worksheet, N_COL_IN_NAME + 1 + n_idx, N_WIDTH_MONEY)?;
    }
    for n_col in N_COL_STRIP_FIRST..N_COL_STRIP_FIRST + TUP_STRIP_STEMS.len() + 1 {
        worksheet
            .set_column_hidden(cast_col_num(n_col)?)
            .map_err(|err| CapbookError::from_xlsx("matrix calc strip", err))?;
    }

    writer.add_worksheet(EnumSheetRole::Matrix, worksheet)?;
    info!(teams = N_MATRIX_TEAMS, "matrix written");
    Ok(())
}

fn missing_table(table_name: &str) -> CapbookError {
    CapbookError::InvalidReference {
        name: table_name.to_string(),
        message: "table not written before MATRIX".to_string(),
    }
}

fn column_range(layout: &SpecTableLayout, column: &str) -> Result<String, CapbookError> {
    layout
        .column_range(column)
        .ok_or_else(|| CapbookError::InvalidReference {
            name: format!("{}[{column}]", layout.table_name),
            message: "column missing from written table".to_string(),
        })
}

fn set_width(worksheet: &mut Worksheet, n_col: usize, n_width: f64) -> Result<(), CapbookError> {
    worksheet
        .set_column_width(cast_col_num(n_col)?, n_width)
        .map_err(|err| CapbookError::from_xlsx("matrix column width", err))?;
    Ok(())
}

fn declare_cell_local(
    names: &mut NameRegistry,
    name_local: &str,
    row: usize,
    col: usize,
) -> Result<(), CapbookError> {
    names.declare_local(name_local, C_SHEET_MATRIX, (row, col), (row, col))
}

fn write_details(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
    names: &mut NameRegistry,
) -> Result<(), CapbookError> {
    write_label(
        worksheet,
        N_ROW_BLOCKS_FIRST,
        N_COL_DETAIL_LABEL,
        "TRADE DETAILS",
        &styles.get(EnumStyleKey::SectionLabel),
    )?;
    let fmt_label = styles.get(EnumStyleKey::Muted);
    let l_delays: Vec<String> = EnumSignDelay::ALL
        .iter()
        .map(|delay| delay.label().to_string())
        .collect();
    let l_bases: Vec<String> = EnumFillBasis::ALL
        .iter()
        .map(|basis| basis.label().to_string())
        .collect();

    for (n_idx, (label, detail_name, kind)) in TUP_DETAILS.iter().enumerate() {
        let n_row = N_ROW_BLOCKS_FIRST + 1 + n_idx;
        let n_col = N_COL_DETAIL_VALUE;
        let range = (n_row, n_col, n_row, n_col);
        write_label(worksheet, n_row, N_COL_DETAIL_LABEL, label, &fmt_label)?;

        let fmt = match kind {
            EnumDetailKind::Year => styles.get(EnumStyleKey::InputInteger),
            EnumDetailKind::Date => styles.get(EnumStyleKey::Date),
            EnumDetailKind::InputDate => styles.get(EnumStyleKey::InputDate),
            EnumDetailKind::Integer => styles.get(EnumStyleKey::Integer),
            EnumDetailKind::Money => styles.get(EnumStyleKey::Money),
            EnumDetailKind::DelaySelector | EnumDetailKind::FillBasis(_) => {
                styles.get(EnumStyleKey::Input)
            }
        };
        match (kind, derive_detail_formula(detail_name)) {
            (EnumDetailKind::DelaySelector, _) => {
                write_cell_with_format(
                    worksheet,
                    n_row,
                    n_col,
                    &EnumCellValue::String(EnumSignDelay::Immediate.label().to_string()),
                    &fmt,
                )?;
                add_list_validation(worksheet, range, &l_delays, None)?;
            }
            (EnumDetailKind::FillBasis(basis), _) => {
                write_cell_with_format(
                    worksheet,
                    n_row,
                    n_col,
                    &EnumCellValue::String(basis.label().to_string()),
                    &fmt,
                )?;
                add_list_validation(worksheet, range, &l_bases, None)?;
            }
            (_, Some(expr)) => write_expr_with_format(worksheet, n_row, n_col, &expr, &fmt)?,
            (_, None) => {
                return Err(CapbookError::InvalidReference {
                    name: detail_name.to_string(),
                    message: "trade detail has no formula".to_string(),
                });
            }
        }
        declare_cell_local(names, detail_name, n_row, n_col)?;
    }
    Ok(())
}

fn write_lane(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
    names: &mut NameRegistry,
    n_team: usize,
    team_codes: &[String],
    c_team_range: &str,
    c_player_range: &str,
) -> Result<(), CapbookError> {
    let n_first = derive_lane_first_row(n_team);
    let (n_name_first, n_name_last) = derive_lane_name_rows(n_team);
    let n_row_totals = n_name_last + 1;
    let n_row_legality = n_row_totals + 1;
    let n_row_fill = n_row_legality + 1;

    let fmt_section = styles.get(EnumStyleKey::SectionLabel);
    let fmt_input = styles.get(EnumStyleKey::Input);
    let fmt_header_left = styles.get(EnumStyleKey::HeaderLeft);
    let fmt_header_right = styles.get(EnumStyleKey::HeaderRight);
    let fmt_money = styles.get(EnumStyleKey::Money);
    let fmt_integer = styles.get(EnumStyleKey::Integer);
    let fmt_label = styles.get(EnumStyleKey::Muted);
    let fmt_text = styles.get(EnumStyleKey::Text);

    // Title row: code and mode selectors.
    write_label(worksheet, n_first, N_COL_OUT_NAME, &format!("TEAM {n_team}"), &fmt_section)?;
    let n_col_code = N_COL_OUT_NAME + 1;
    let n_col_mode = N_COL_OUT_NAME + 3;
    write_cell_with_format(worksheet, n_first, n_col_code, &EnumCellValue::None, &fmt_input)?;
    add_list_validation(
        worksheet,
        (n_first, n_col_code, n_first, n_col_code),
        team_codes,
        Some(c_team_range),
    )?;
    declare_cell_local(names, &mx_team_name(n_team, "Code"), n_first, n_col_code)?;

    write_label(worksheet, n_first, n_col_mode - 1, "Mode", &fmt_label)?;
    write_cell_with_format(
        worksheet,
        n_first,
        n_col_mode,
        &EnumCellValue::String(EnumTradeMode::Standard.label().to_string()),
        &fmt_input,
    )?;
    let l_modes: Vec<String> = EnumTradeMode::ALL
        .iter()
        .map(|mode| mode.label().to_string())
        .collect();
    add_list_validation(
        worksheet,
        (n_first, n_col_mode, n_first, n_col_mode),
        &l_modes,
        None,
    )?;
    declare_cell_local(names, &mx_team_name(n_team, "Mode"), n_first, n_col_mode)?;

    // Column headers.
    for (n_col_name, c_title) in [(N_COL_OUT_NAME, "Outgoing"), (N_COL_IN_NAME, "Incoming")] {
        write_label(worksheet, n_first + 1, n_col_name, c_title, &fmt_header_left)?;
        for (n_idx, layer) in EnumSalaryLayer::ALL.iter().enumerate() {
            write_label(
                worksheet,
                n_first + 1,
                n_col_name + 1 + n_idx,
                layer.label(),
                &fmt_header_right,
            )?;
        }
    }

    // Name inputs with per-layer amounts.
    for (n_col_name, stem) in [(N_COL_OUT_NAME, "OutNames"), (N_COL_IN_NAME, "InNames")] {
        format_blank_range(
            worksheet,
            (n_name_first, n_col_name, n_name_last, n_col_name),
            &fmt_input,
        )?;
        add_range_validation(
            worksheet,
            (n_name_first, n_col_name, n_name_last, n_col_name),
            c_player_range,
        )?;
        names.declare_local(
            &mx_team_name(n_team, stem),
            C_SHEET_MATRIX,
            (n_name_first, n_col_name),
            (n_name_last, n_col_name),
        )?;
        for n_row in n_name_first..=n_name_last {
            let c_name_cell = derive_cell_ref(n_row, n_col_name, false, true);
            for (n_idx, layer) in EnumSalaryLayer::ALL.iter().enumerate() {
                let expr = if n_col_name == N_COL_OUT_NAME {
                    mx_out_amount(n_team, &c_name_cell, *layer)
                } else {
                    mx_in_amount(&c_name_cell, *layer)
                };
                write_expr_with_format(worksheet, n_row, n_col_name + 1 + n_idx, &expr, &fmt_money)?;
            }
        }

        // Totals: cap from the strip, tax and apron summed in place.
        write_label(worksheet, n_row_totals, n_col_name, "Total", &fmt_section)?;
        for n_idx in 0..EnumSalaryLayer::ALL.len() {
            let n_col = n_col_name + 1 + n_idx;
            let expr = if n_idx == 0 {
                let stem = if n_col_name == N_COL_OUT_NAME {
                    "OutCapTotal"
                } else {
                    "InCapTotal"
                };
                name(mx_team_name(n_team, stem))
            } else {
                fx::sum(cell(format!(
                    "{}:{}",
                    derive_cell_ref(n_name_first, n_col, false, false),
                    derive_cell_ref(n_name_last, n_col, false, false)
                )))
            };
            write_expr_with_format(worksheet, n_row_totals, n_col, &expr, &fmt_money)?;
        }
    }

    // Legality.
    write_label(worksheet, n_row_legality, N_COL_OUT_NAME, "Allowed In", &fmt_label)?;
    write_expr_with_format(
        worksheet,
        n_row_legality,
        N_COL_OUT_NAME + 1,
        &name(mx_team_name(n_team, "AllowedInCap")),
        &fmt_money,
    )?;
    write_label(worksheet, n_row_legality, N_COL_IN_NAME, "Works?", &fmt_label)?;
    write_expr_with_format(
        worksheet,
        n_row_legality,
        N_COL_IN_NAME + 1,
        &name(mx_team_name(n_team, "Works")),
        &fmt_text,
    )?;
    let c_works_cell = derive_cell_ref(n_row_legality, N_COL_IN_NAME + 1, false, false);
    apply_status_rules(
        worksheet,
        (n_row_legality, N_COL_IN_NAME + 1, n_row_legality, N_COL_IN_NAME + 1),
        &derive_verdict_rules(&c_works_cell, "Yes", "No"),
        styles,
    )?;

    // Roster and fill.
    write_label(worksheet, n_row_fill, N_COL_OUT_NAME, "Roster", &fmt_label)?;
    write_expr_with_format(
        worksheet,
        n_row_fill,
        N_COL_OUT_NAME + 1,
        &name(mx_team_name(n_team, "RosterCount")),
        &fmt_integer,
    )?;
    for (n_col, c_label, stem, n_target, basis_name) in [
        (N_COL_IN_NAME, "Fill to 12", "Fill12Amount", N_FILL_TARGET_LOW, MX_FILL12_BASIS),
        (N_COL_IN_NAME + 2, "Fill to 14", "Fill14Amount", N_FILL_TARGET_HIGH, MX_FILL14_BASIS),
    ] {
        write_label(worksheet, n_row_fill, n_col, c_label, &fmt_label)?;
        write_expr_with_format(
            worksheet,
            n_row_fill,
            n_col + 1,
            &mx_fill_amount(n_team, n_target, basis_name),
            &fmt_money,
        )?;
        declare_cell_local(names, &mx_team_name(n_team, stem), n_row_fill, n_col + 1)?;
    }

    // Hidden strip.
    for (n_idx, stem) in TUP_STRIP_STEMS.iter().enumerate() {
        let n_col = N_COL_STRIP_FIRST + n_idx;
        let fmt = match *stem {
            "Works" => &fmt_text,
            "RosterCount" => &fmt_integer,
            _ => &fmt_money,
        };
        write_expr_with_format(worksheet, n_first, n_col, &derive_strip_formula(n_team, stem), fmt)?;
        declare_cell_local(names, &mx_team_name(n_team, stem), n_first, n_col)?;
    }
    Ok(())
}

fn write_verdict(
    worksheet: &mut Worksheet,
    styles: &StyleRegistry,
    names: &mut NameRegistry,
) -> Result<(), CapbookError> {
    let fmt_title = styles.get(EnumStyleKey::Title);
    write_label(worksheet, N_ROW_TITLE, N_COL_DETAIL_LABEL, "Trade Matrix", &fmt_title)?;

    let n_col_strip = N_COL_STRIP_FIRST + TUP_STRIP_STEMS.len();
    write_expr_with_format(
        worksheet,
        N_ROW_TITLE,
        n_col_strip,
        &mx_verdict(N_MATRIX_TEAMS),
        &styles.get(EnumStyleKey::Text),
    )?;
    declare_cell_local(names, MX_VERDICT, N_ROW_TITLE, n_col_strip)?;

    write_label(
        worksheet,
        N_ROW_TITLE,
        N_COL_OUT_NAME,
        "Verdict",
        &styles.get(EnumStyleKey::KpiLabel),
    )?;
    let n_col_verdict = N_COL_OUT_NAME + 1;
    let fmt_verdict: Format = styles.get(EnumStyleKey::KpiValue);
    write_expr_with_format(
        worksheet,
        N_ROW_TITLE,
        n_col_verdict,
        &name(MX_VERDICT),
        &fmt_verdict,
    )?;
    let c_cell = derive_cell_ref(N_ROW_TITLE, n_col_verdict, false, false);
    apply_status_rules(
        worksheet,
        (N_ROW_TITLE, n_col_verdict, N_ROW_TITLE, n_col_verdict),
        &derive_verdict_rules(&c_cell, "Trade Works", "Trade Does Not Work"),
        styles,
    )?;
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
