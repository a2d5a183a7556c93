//! Hidden CALC grid.
//!
//! One row per year offset, one column per scenario scalar. Each cell holds a
//! single formula and backs exactly one `Scn*` defined name, so downstream
//! sheets always reference a single cell instead of a spilled array.

use tracing::info;

use crate::conf::{C_SHEET_CALC, EnumStyleKey, N_YEAR_OFFSETS};
use crate::error::CapbookError;
use crate::formula::builders::{derive_scenario_scalar, year_at};
use crate::formula::expr::int;
use crate::names::{EnumScnScalar, NameRegistry};
use crate::style::StyleRegistry;
use crate::util::cast_col_num;
use crate::writer::{
    CapbookWriter, EnumSheetRole, new_formula_worksheet, write_expr_with_format, write_label,
};

pub const N_CALC_COL_OFFSET: usize = 0;
pub const N_CALC_COL_YEAR: usize = 1;
pub const N_CALC_COL_FIRST_SCALAR: usize = 2;
const N_WIDTH_CALC: f64 = 16.0;

/// Zero-based `(row, col)` of a scalar on CALC.
pub fn derive_scalar_cell(scalar: EnumScnScalar, off: usize) -> (usize, usize) {
    let n_idx = EnumScnScalar::ALL
        .iter()
        .position(|item| *item == scalar)
        .unwrap_or_default();
    (off + 1, N_CALC_COL_FIRST_SCALAR + n_idx)
}

/// Declare every `Scn*` name and write the CALC sheet. Returns the number of
/// scalar cells written.
pub fn write_calc_sheet(
    writer: &mut CapbookWriter,
    styles: &StyleRegistry,
    names: &mut NameRegistry,
) -> Result<usize, CapbookError> {
    let mut worksheet = new_formula_worksheet(C_SHEET_CALC)?;
    let fmt_header = styles.get(EnumStyleKey::HeaderCenter);
    let fmt_integer = styles.get(EnumStyleKey::Integer);
    let fmt_money = styles.get(EnumStyleKey::Money);

    write_label(&mut worksheet, 0, N_CALC_COL_OFFSET, "off", &fmt_header)?;
    write_label(&mut worksheet, 0, N_CALC_COL_YEAR, "year", &fmt_header)?;
    for (n_idx, scalar) in EnumScnScalar::ALL.iter().enumerate() {
        write_label(
            &mut worksheet,
            0,
            N_CALC_COL_FIRST_SCALAR + n_idx,
            scalar.stem(),
            &fmt_header,
        )?;
    }

    let mut n_cells = 0usize;
    for off in 0..N_YEAR_OFFSETS {
        let n_row = off + 1;
        write_expr_with_format(
            &mut worksheet,
            n_row,
            N_CALC_COL_OFFSET,
            &int(off as i64),
            &fmt_integer,
        )?;
        write_expr_with_format(&mut worksheet, n_row, N_CALC_COL_YEAR, &year_at(off), &fmt_integer)?;

        for scalar in EnumScnScalar::ALL {
            let (n_row, n_col) = derive_scalar_cell(scalar, off);
            let fmt = if scalar.is_count() {
                &fmt_integer
            } else {
                &fmt_money
            };
            write_expr_with_format(
                &mut worksheet,
                n_row,
                n_col,
                &derive_scenario_scalar(scalar, off),
                fmt,
            )?;
            names.declare_cell(&scalar.name(off), C_SHEET_CALC, n_row, n_col)?;
            n_cells += 1;
        }
    }

    for n_col in 0..N_CALC_COL_FIRST_SCALAR + EnumScnScalar::ALL.len() {
        worksheet
            .set_column_width(cast_col_num(n_col)?, N_WIDTH_CALC)
            .map_err(|err| CapbookError::from_xlsx("calc column width", err))?;
    }

    writer.add_worksheet(EnumSheetRole::Calc, worksheet)?;
    info!(cells = n_cells, "calc grid written");
    Ok(n_cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_cells_follow_column_order() {
        assert_eq!(derive_scalar_cell(EnumScnScalar::RosterCount, 0), (1, 2));
        assert_eq!(derive_scalar_cell(EnumScnScalar::CapTotal, 3), (4, 3));
        assert_eq!(derive_scalar_cell(EnumScnScalar::TaxPayment, 5), (6, 17));
    }

    #[test]
    fn test_calc_declares_one_name_per_cell() {
        let styles = StyleRegistry::new();
        let mut names = NameRegistry::new();
        let mut writer = CapbookWriter::new(std::env::temp_dir().join("capbook_calc_unsaved.xlsx"));

        let n_cells = write_calc_sheet(&mut writer, &styles, &mut names).expect("calc");
        assert_eq!(n_cells, N_YEAR_OFFSETS * EnumScnScalar::ALL.len());
        assert_eq!(names.len(), n_cells);
        assert_eq!(
            names.get("ScnCapTotal3").expect("name").refers_to(),
            "=CALC!$D$5"
        );
        assert!(writer.sheet_names().contains(C_SHEET_CALC));

        let err = write_calc_sheet(&mut writer, &styles, &mut names).expect_err("twice");
        assert!(matches!(err, CapbookError::DuplicateName { .. }));
    }
}
