//! Data contract: the fixed set of embedded tables and their invariants.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{
    C_PREFIX_DATA_SHEET, C_PREFIX_TABLE, N_BUCKET_SUM_TOLERANCE, N_YEAR_OFFSETS,
    TBL_CAP_HOLDS_WAREHOUSE, TBL_DEAD_MONEY_WAREHOUSE, TBL_DRAFT_PICKS_WAREHOUSE,
    TBL_EXCEPTIONS_WAREHOUSE, TBL_MINIMUM_SCALE, TBL_ROOKIE_SCALE, TBL_SALARY_BOOK_WAREHOUSE,
    TBL_SALARY_BOOK_YEARLY, TBL_SYSTEM_VALUES, TBL_TAX_RATES, TBL_TEAM_SALARY_WAREHOUSE,
};
use crate::error::CapbookError;
use crate::spec::{
    EnumCellValue, EnumColumnKind, EnumSalaryLayer, SpecTableData, SpecTableExtract,
};
use crate::util::{derive_excel_date_serial, parse_iso_date, sanitize_sheet_name};

/// Column holding the salary year in year-windowed tables.
pub const C_COL_SALARY_YEAR: &str = "salary_year";
/// Column holding the league code in league-scoped tables.
pub const C_COL_LEAGUE: &str = "league_lk";

////////////////////////////////////////////////////////////////////////////////
// #region Declarations

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnContract {
    pub name: String,
    pub kind: EnumColumnKind,
}

/// One declared table: name, frozen column order, grain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTableContract {
    /// Table name used by every formula.
    pub table_name: &'static str,
    /// Columns in frozen order.
    pub columns: Vec<SpecColumnContract>,
    /// Columns that must be unique together; empty disables the check.
    pub grain: Vec<&'static str>,
}

impl SpecTableContract {
    /// Hidden sheet owning the table (`tbl_x` -> `DATA_x`).
    pub fn sheet_name(&self) -> String {
        let c_suffix = self
            .table_name
            .strip_prefix(C_PREFIX_TABLE)
            .unwrap_or(self.table_name);
        sanitize_sheet_name(&format!("{C_PREFIX_DATA_SHEET}{c_suffix}"), "_")
    }

    /// Declared column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Whether a column is declared.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    /// Kind of a declared column.
    pub fn column_kind(&self, column: &str) -> Option<EnumColumnKind> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.kind)
    }
}

fn derive_columns(l_spec: &[(&str, EnumColumnKind)]) -> Vec<SpecColumnContract> {
    l_spec
        .iter()
        .map(|(name, kind)| SpecColumnContract {
            name: name.to_string(),
            kind: *kind,
        })
        .collect()
}

fn derive_salary_book_warehouse_columns() -> Vec<SpecColumnContract> {
    use EnumColumnKind::{Bool, Integer, Number, Text};

    let mut l_columns = derive_columns(&[
        ("player_id", Integer),
        ("player_name", Text),
        ("team_code", Text),
        ("agent_name", Text),
        ("is_no_trade", Bool),
        ("is_trade_bonus", Bool),
        ("trade_bonus_percent", Number),
        ("is_trade_consent_required_now", Bool),
        ("is_trade_restricted_now", Bool),
        ("is_min_contract", Bool),
        ("is_two_way", Bool),
    ]);
    let l_groups: [(&str, EnumColumnKind); 5] = [
        ("option", Text),
        ("is_fully_guaranteed", Bool),
        ("is_partially_guaranteed", Bool),
        ("guaranteed_amount", Number),
        ("cap", Number),
    ];
    for (c_prefix, kind) in l_groups {
        for off in 0..N_YEAR_OFFSETS {
            l_columns.push(SpecColumnContract {
                name: format!("{c_prefix}_y{off}"),
                kind,
            });
        }
    }
    l_columns.push(SpecColumnContract {
        name: "total_salary_six_year".to_string(),
        kind: Number,
    });
    l_columns
}

/// Every embedded table, in write order.
pub fn derive_table_contracts() -> Vec<SpecTableContract> {
    use EnumColumnKind::{Bool, Date, Integer, Number, Text};

    let mut l_team_salary = derive_columns(&[("team_code", Text), ("salary_year", Integer)]);
    for layer in EnumSalaryLayer::ALL {
        for c_bucket in layer.col_warehouse_buckets() {
            l_team_salary.push(SpecColumnContract {
                name: c_bucket.to_string(),
                kind: Number,
            });
        }
        l_team_salary.push(SpecColumnContract {
            name: layer.col_warehouse_total().to_string(),
            kind: Number,
        });
    }
    l_team_salary.extend(derive_columns(&[
        ("roster_row_count", Integer),
        ("fa_row_count", Integer),
        ("two_way_row_count", Integer),
        ("salary_cap_amount", Number),
        ("tax_level_amount", Number),
        ("tax_apron_amount", Number),
        ("tax_apron2_amount", Number),
        ("minimum_team_salary_amount", Number),
        ("apron_level_lk", Text),
        ("is_taxpayer", Bool),
        ("is_repeater_taxpayer", Bool),
    ]));

    vec![
        SpecTableContract {
            table_name: TBL_SYSTEM_VALUES,
            columns: derive_columns(&[
                ("league_lk", Text),
                ("salary_year", Integer),
                ("salary_cap_amount", Number),
                ("tax_level_amount", Number),
                ("tax_apron_amount", Number),
                ("tax_apron2_amount", Number),
                ("minimum_team_salary_amount", Number),
                ("days_in_season", Integer),
                ("season_start_at", Date),
                ("season_end_at", Date),
                ("playing_start_at", Date),
                ("playing_end_at", Date),
                ("tpe_dollar_allowance", Number),
            ]),
            grain: vec!["league_lk", "salary_year"],
        },
        SpecTableContract {
            table_name: TBL_TAX_RATES,
            columns: derive_columns(&[
                ("league_lk", Text),
                ("salary_year", Integer),
                ("bracket_number", Integer),
                ("lower_limit", Number),
                ("upper_limit", Number),
                ("tax_rate_non_repeater", Number),
                ("tax_rate_repeater", Number),
                ("base_charge_non_repeater", Number),
                ("base_charge_repeater", Number),
            ]),
            grain: vec!["league_lk", "salary_year", "bracket_number"],
        },
        SpecTableContract {
            table_name: TBL_ROOKIE_SCALE,
            columns: derive_columns(&[
                ("salary_year", Integer),
                ("pick_number", Integer),
                ("league_lk", Text),
                ("salary_year_1", Number),
                ("salary_year_2", Number),
                ("salary_year_3", Number),
                ("salary_year_4", Number),
                ("option_amount_year_3", Number),
                ("option_amount_year_4", Number),
                ("option_pct_year_3", Number),
                ("option_pct_year_4", Number),
            ]),
            grain: vec![],
        },
        SpecTableContract {
            table_name: TBL_MINIMUM_SCALE,
            columns: derive_columns(&[
                ("salary_year", Integer),
                ("league_lk", Text),
                ("years_of_service", Integer),
                ("minimum_salary_amount", Number),
            ]),
            grain: vec!["salary_year", "league_lk", "years_of_service"],
        },
        SpecTableContract {
            table_name: TBL_TEAM_SALARY_WAREHOUSE,
            columns: l_team_salary,
            grain: vec!["team_code", "salary_year"],
        },
        SpecTableContract {
            table_name: TBL_SALARY_BOOK_WAREHOUSE,
            columns: derive_salary_book_warehouse_columns(),
            grain: vec![],
        },
        SpecTableContract {
            table_name: TBL_SALARY_BOOK_YEARLY,
            columns: derive_columns(&[
                ("player_id", Integer),
                ("player_name", Text),
                ("team_code", Text),
                ("salary_year", Integer),
                ("cap_amount", Number),
                ("tax_amount", Number),
                ("apron_amount", Number),
                ("incoming_cap_amount", Number),
                ("incoming_tax_amount", Number),
                ("incoming_apron_amount", Number),
                ("outgoing_apron_amount", Number),
                ("is_two_way", Bool),
            ]),
            grain: vec!["player_id", "team_code", "salary_year"],
        },
        SpecTableContract {
            table_name: TBL_CAP_HOLDS_WAREHOUSE,
            columns: derive_columns(&[
                ("team_code", Text),
                ("salary_year", Integer),
                ("non_contract_amount_id", Integer),
                ("player_name", Text),
                ("amount_type_lk", Text),
                ("cap_amount", Number),
                ("tax_amount", Number),
                ("apron_amount", Number),
            ]),
            grain: vec![],
        },
        SpecTableContract {
            table_name: TBL_DEAD_MONEY_WAREHOUSE,
            columns: derive_columns(&[
                ("team_code", Text),
                ("salary_year", Integer),
                ("transaction_waiver_amount_id", Integer),
                ("player_name", Text),
                ("cap_value", Number),
                ("tax_value", Number),
                ("apron_value", Number),
                ("waive_date", Date),
            ]),
            grain: vec![],
        },
        SpecTableContract {
            table_name: TBL_EXCEPTIONS_WAREHOUSE,
            columns: derive_columns(&[
                ("team_code", Text),
                ("salary_year", Integer),
                ("team_exception_id", Integer),
                ("exception_type_lk", Text),
                ("exception_type_name", Text),
                ("remaining_amount", Number),
                ("expiration_date", Date),
                ("record_status_lk", Text),
                ("is_expired", Bool),
            ]),
            grain: vec![],
        },
        SpecTableContract {
            table_name: TBL_DRAFT_PICKS_WAREHOUSE,
            columns: derive_columns(&[
                ("team_code", Text),
                ("draft_year", Integer),
                ("draft_round", Integer),
                ("pick_id", Integer),
                ("original_team_code", Text),
                ("ownership_status", Text),
                ("encumbrance_text", Text),
            ]),
            grain: vec![],
        },
    ]
}

/// Look up one declared table by name.
pub fn find_table_contract(table_name: &str) -> Option<SpecTableContract> {
    derive_table_contracts()
        .into_iter()
        .find(|contract| contract.table_name == table_name)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Projection

/// Project an extraction onto the declared column order.
///
/// Declared columns must appear in `extract.columns` as an ordered
/// subsequence; extra columns are dropped.
pub fn project_extract(
    contract: &SpecTableContract,
    extract: &SpecTableExtract,
) -> Result<SpecTableData, CapbookError> {
    let dict_pos: BTreeMap<&str, usize> = extract
        .columns
        .iter()
        .enumerate()
        .map(|(n_idx, c_name)| (c_name.as_str(), n_idx))
        .collect();

    let mut n_pos_prev: Option<usize> = None;
    let mut c_name_prev = "";
    for col in &contract.columns {
        let Some(&n_pos) = dict_pos.get(col.name.as_str()) else {
            return Err(CapbookError::SchemaMismatch {
                table: contract.table_name.to_string(),
                message: format!("missing column `{}`", col.name),
            });
        };
        if n_pos_prev.is_some_and(|prev| n_pos < prev) {
            return Err(CapbookError::SchemaMismatch {
                table: contract.table_name.to_string(),
                message: format!(
                    "column `{}` appears before `{c_name_prev}`; declared order not preserved",
                    col.name
                ),
            });
        }
        n_pos_prev = Some(n_pos);
        c_name_prev = col.name.as_str();
    }

    let rows = extract
        .rows
        .iter()
        .map(|record| {
            contract
                .columns
                .iter()
                .map(|col| {
                    let value = record.get(&col.name).unwrap_or(&EnumCellValue::None);
                    coerce_cell_value(col.kind, value)
                })
                .collect()
        })
        .collect();

    Ok(SpecTableData {
        columns: contract.column_names(),
        rows,
    })
}

/// Normalize a value to the declared column kind; unconvertible values are kept.
pub fn coerce_cell_value(kind: EnumColumnKind, value: &EnumCellValue) -> EnumCellValue {
    if value.is_none() {
        return EnumCellValue::None;
    }
    match kind {
        EnumColumnKind::Text => match value {
            EnumCellValue::String(s) => EnumCellValue::String(s.clone()),
            other => EnumCellValue::String(other.as_text()),
        },
        EnumColumnKind::Integer | EnumColumnKind::Number => match value {
            EnumCellValue::Number(n) if n.is_finite() => EnumCellValue::Number(*n),
            EnumCellValue::Number(_) => EnumCellValue::None,
            EnumCellValue::Date(d) => EnumCellValue::Number(derive_excel_date_serial(*d)),
            other => other
                .as_f64()
                .map(EnumCellValue::Number)
                .unwrap_or_else(|| other.clone()),
        },
        EnumColumnKind::Bool => match value {
            EnumCellValue::Bool(b) => EnumCellValue::Bool(*b),
            EnumCellValue::Number(n) if *n == 0.0 || *n == 1.0 => EnumCellValue::Bool(*n == 1.0),
            EnumCellValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" => EnumCellValue::Bool(true),
                "false" | "f" | "0" | "no" | "n" => EnumCellValue::Bool(false),
                _ => value.clone(),
            },
            other => other.clone(),
        },
        EnumColumnKind::Date => match value {
            EnumCellValue::String(s) => parse_iso_date(s)
                .map(EnumCellValue::Date)
                .unwrap_or_else(|| value.clone()),
            other => other.clone(),
        },
    }
}

/// Drop rows whose `salary_year` lies outside `[base_year, base_year+5]`.
///
/// Returns the number of dropped rows.
pub fn retain_year_window(data: &mut SpecTableData, base_year: i32) -> usize {
    let Some(n_idx) = data.column_index(C_COL_SALARY_YEAR) else {
        return 0;
    };
    let n_lo = base_year as f64;
    let n_hi = (base_year + N_YEAR_OFFSETS as i32 - 1) as f64;
    let n_before = data.rows.len();
    data.rows.retain(|row| {
        row.get(n_idx)
            .and_then(EnumCellValue::as_f64)
            .is_some_and(|year| year >= n_lo && year <= n_hi)
    });
    n_before - data.rows.len()
}

/// Drop rows of other leagues. Returns the number of dropped rows.
pub fn retain_league(data: &mut SpecTableData, league: &str) -> usize {
    let Some(n_idx) = data.column_index(C_COL_LEAGUE) else {
        return 0;
    };
    let n_before = data.rows.len();
    data.rows.retain(|row| {
        row.get(n_idx)
            .is_some_and(|value| value.as_text().eq_ignore_ascii_case(league))
    });
    n_before - data.rows.len()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Invariants

/// `*_total = *_rost + *_fa + *_term + *_2way` per layer and row.
pub fn check_bucket_sums(data: &SpecTableData) -> Vec<String> {
    let mut l_errors = Vec::new();
    let n_team = data.column_index("team_code");
    let n_year = data.column_index(C_COL_SALARY_YEAR);
    for row in &data.rows {
        let derive_num = |column: &str| {
            data.column_index(column)
                .and_then(|n_idx| row.get(n_idx))
                .and_then(EnumCellValue::as_f64)
                .unwrap_or(0.0)
        };
        for layer in EnumSalaryLayer::ALL {
            let n_total = derive_num(layer.col_warehouse_total());
            let n_sum: f64 = layer
                .col_warehouse_buckets()
                .iter()
                .map(|c| derive_num(*c))
                .sum();
            if (n_total - n_sum).abs() > N_BUCKET_SUM_TOLERANCE {
                let c_team = n_team
                    .and_then(|n| row.get(n))
                    .map(EnumCellValue::as_text)
                    .unwrap_or_default();
                let c_year = n_year
                    .and_then(|n| row.get(n))
                    .map(EnumCellValue::as_text)
                    .unwrap_or_default();
                l_errors.push(format!(
                    "{TBL_TEAM_SALARY_WAREHOUSE} ({c_team}, {c_year}): {} {n_total} != bucket sum {n_sum}",
                    layer.col_warehouse_total()
                ));
            }
        }
    }
    l_errors
}

/// `tbl_system_values` must cover exactly `[base_year, base_year+5]`.
pub fn check_system_values_coverage(data: &SpecTableData, base_year: i32) -> Vec<String> {
    let set_years: BTreeSet<i64> = data
        .column_values(C_COL_SALARY_YEAR)
        .filter_map(EnumCellValue::as_f64)
        .map(|year| year as i64)
        .collect();
    let set_expected: BTreeSet<i64> = (0..N_YEAR_OFFSETS as i64)
        .map(|off| base_year as i64 + off)
        .collect();
    let l_missing: Vec<String> = set_expected
        .difference(&set_years)
        .map(|year| year.to_string())
        .collect();
    if l_missing.is_empty() {
        Vec::new()
    } else {
        vec![format!(
            "{TBL_SYSTEM_VALUES} is missing salary years: {}",
            l_missing.join(", ")
        )]
    }
}

/// Rows must be unique on the declared grain.
pub fn check_unique_grain(contract: &SpecTableContract, data: &SpecTableData) -> Vec<String> {
    if contract.grain.is_empty() {
        return Vec::new();
    }
    let l_idx: Vec<usize> = contract
        .grain
        .iter()
        .filter_map(|c| data.column_index(c))
        .collect();
    let mut dict_count: BTreeMap<Vec<String>, usize> = BTreeMap::new();
    for row in &data.rows {
        let key: Vec<String> = l_idx
            .iter()
            .map(|n_idx| row.get(*n_idx).map(EnumCellValue::as_text).unwrap_or_default())
            .collect();
        *dict_count.entry(key).or_default() += 1;
    }
    dict_count
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(key, n)| {
            format!(
                "{} has {n} rows for ({}) = ({})",
                contract.table_name,
                contract.grain.join(", "),
                key.join(", ")
            )
        })
        .collect()
}

/// Run the table-specific invariant checks.
pub fn check_data_invariants(
    contract: &SpecTableContract,
    data: &SpecTableData,
    base_year: i32,
) -> Vec<String> {
    let mut l_errors = check_unique_grain(contract, data);
    match contract.table_name {
        TBL_TEAM_SALARY_WAREHOUSE => l_errors.extend(check_bucket_sums(data)),
        TBL_SYSTEM_VALUES => l_errors.extend(check_system_values_coverage(data, base_year)),
        _ => {}
    }
    l_errors
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::validate_unique_columns;

    fn derive_text(s: &str) -> EnumCellValue {
        EnumCellValue::String(s.to_string())
    }

    fn derive_num(n: f64) -> EnumCellValue {
        EnumCellValue::Number(n)
    }

    #[test]
    fn test_contracts_have_unique_names_and_columns() {
        let l_contracts = derive_table_contracts();
        assert_eq!(l_contracts.len(), 11);
        let set_names: BTreeSet<&str> = l_contracts.iter().map(|c| c.table_name).collect();
        assert_eq!(set_names.len(), l_contracts.len());
        for contract in &l_contracts {
            assert!(validate_unique_columns(&contract.column_names()).is_ok());
            for c_grain in &contract.grain {
                assert!(contract.has_column(c_grain), "{c_grain}");
            }
        }
    }

    #[test]
    fn test_sheet_name_derivation() {
        let contract = find_table_contract(TBL_SALARY_BOOK_YEARLY).expect("contract");
        assert_eq!(contract.sheet_name(), "DATA_salary_book_yearly");
        let contract = find_table_contract(TBL_TEAM_SALARY_WAREHOUSE).expect("contract");
        assert!(contract.sheet_name().len() <= 31);
    }

    #[test]
    fn test_project_extract_ignores_extras_and_keeps_order() {
        let contract = find_table_contract(TBL_MINIMUM_SCALE).expect("contract");
        let extract = SpecTableExtract::from_rows(
            &[
                "salary_year",
                "extra",
                "league_lk",
                "years_of_service",
                "minimum_salary_amount",
            ],
            vec![vec![
                derive_text("2025"),
                derive_text("x"),
                derive_text("NBA"),
                derive_num(0.0),
                derive_num(1_272_870.0),
            ]],
        );
        let data = project_extract(&contract, &extract).expect("project");
        assert_eq!(data.columns, contract.column_names());
        assert_eq!(data.rows[0][0], derive_num(2025.0));
        assert_eq!(data.rows[0][3], derive_num(1_272_870.0));
    }

    #[test]
    fn test_project_extract_rejects_missing_and_reordered() {
        let contract = find_table_contract(TBL_MINIMUM_SCALE).expect("contract");
        let extract = SpecTableExtract::from_rows(
            &["salary_year", "league_lk", "years_of_service"],
            vec![],
        );
        let err = project_extract(&contract, &extract).expect_err("missing");
        assert!(err.to_string().contains("minimum_salary_amount"));

        let extract = SpecTableExtract::from_rows(
            &[
                "league_lk",
                "salary_year",
                "years_of_service",
                "minimum_salary_amount",
            ],
            vec![],
        );
        let err = project_extract(&contract, &extract).expect_err("reordered");
        assert!(matches!(err, CapbookError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_coerce_cell_value_by_kind() {
        assert_eq!(
            coerce_cell_value(EnumColumnKind::Bool, &derive_text("False")),
            EnumCellValue::Bool(false)
        );
        assert_eq!(
            coerce_cell_value(EnumColumnKind::Bool, &derive_num(1.0)),
            EnumCellValue::Bool(true)
        );
        assert_eq!(
            coerce_cell_value(EnumColumnKind::Date, &derive_text("2026-04-12")),
            EnumCellValue::Date(chrono::NaiveDate::from_ymd_opt(2026, 4, 12).expect("date"))
        );
        assert_eq!(
            coerce_cell_value(EnumColumnKind::Number, &derive_num(f64::NAN)),
            EnumCellValue::None
        );
        assert_eq!(
            coerce_cell_value(EnumColumnKind::Text, &derive_num(2025.0)),
            derive_text("2025")
        );
        assert_eq!(
            coerce_cell_value(EnumColumnKind::Integer, &derive_text("")),
            EnumCellValue::None
        );
    }

    #[test]
    fn test_retain_year_window_and_league() {
        let mut data = SpecTableData {
            columns: vec!["league_lk".to_string(), "salary_year".to_string()],
            rows: vec![
                vec![derive_text("NBA"), derive_num(2024.0)],
                vec![derive_text("NBA"), derive_num(2025.0)],
                vec![derive_text("NBA"), derive_num(2030.0)],
                vec![derive_text("NBA"), derive_num(2031.0)],
                vec![derive_text("WNBA"), derive_num(2026.0)],
            ],
        };
        assert_eq!(retain_year_window(&mut data, 2025), 2);
        assert_eq!(retain_league(&mut data, "NBA"), 1);
        assert_eq!(data.rows.len(), 2);
    }

    #[test]
    fn test_bucket_sum_violation_is_reported() {
        let contract = find_table_contract(TBL_TEAM_SALARY_WAREHOUSE).expect("contract");
        let mut row: Vec<EnumCellValue> = contract
            .columns
            .iter()
            .map(|_| EnumCellValue::None)
            .collect();
        let mut data = SpecTableData {
            columns: contract.column_names(),
            rows: vec![],
        };
        let set = |row: &mut Vec<EnumCellValue>, column: &str, value: EnumCellValue| {
            let n_idx = contract
                .columns
                .iter()
                .position(|c| c.name == column)
                .expect("column");
            row[n_idx] = value;
        };
        set(&mut row, "team_code", derive_text("POR"));
        set(&mut row, "salary_year", derive_num(2025.0));
        set(&mut row, "cap_rost", derive_num(100.0));
        set(&mut row, "cap_fa", derive_num(20.0));
        set(&mut row, "cap_total", derive_num(120.0));
        set(&mut row, "tax_rost", derive_num(100.0));
        set(&mut row, "tax_total", derive_num(150.0));
        data.rows.push(row);

        let l_errors = check_bucket_sums(&data);
        assert_eq!(l_errors.len(), 1);
        assert!(l_errors[0].contains("(POR, 2025): tax_total 150 != bucket sum 100"));
    }

    #[test]
    fn test_system_values_coverage_and_grain() {
        let contract = find_table_contract(TBL_SYSTEM_VALUES).expect("contract");
        let data = SpecTableData {
            columns: vec!["league_lk".to_string(), "salary_year".to_string()],
            rows: (2025..2030)
                .map(|year| vec![derive_text("NBA"), derive_num(year as f64)])
                .chain(std::iter::once(vec![derive_text("NBA"), derive_num(2025.0)]))
                .collect(),
        };
        let l_errors = check_data_invariants(&contract, &data, 2025);
        assert_eq!(l_errors.len(), 2);
        assert!(l_errors.iter().any(|e| e.contains("missing salary years: 2030")));
        assert!(l_errors.iter().any(|e| e.contains("has 2 rows")));
    }
}
