//! Stateless helper utilities: A1 addressing, names, dates, and text.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_xlsxwriter::{ColNum, RowNum};

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::error::CapbookError;

////////////////////////////////////////////////////////////////////////////////
// #region Addressing

/// Zero-based column index to letters (`0 -> A`, `27 -> AB`).
pub fn derive_col_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut l_chars = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        l_chars.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// Letters to zero-based column index.
pub fn parse_col_letters(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut n = 0usize;
    for chr in letters.chars() {
        if !chr.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (chr.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
    }
    Some(n - 1)
}

/// A1 reference of a zero-based cell with per-axis anchoring.
pub fn derive_cell_ref(row: usize, col: usize, if_abs_row: bool, if_abs_col: bool) -> String {
    format!(
        "{}{}{}{}",
        if if_abs_col { "$" } else { "" },
        derive_col_letters(col),
        if if_abs_row { "$" } else { "" },
        row + 1
    )
}

/// Fully anchored A1 reference (`$B$3`).
pub fn derive_abs_cell_ref(row: usize, col: usize) -> String {
    derive_cell_ref(row, col, true, true)
}

/// Fully anchored A1 range (`$B$3:$B$9`).
pub fn derive_abs_range_ref(r1: usize, c1: usize, r2: usize, c2: usize) -> String {
    format!(
        "{}:{}",
        derive_abs_cell_ref(r1, c1),
        derive_abs_cell_ref(r2, c2)
    )
}

/// Quote a sheet name for use in a reference when needed.
pub fn quote_sheet_name(sheet_name: &str) -> String {
    let if_plain = sheet_name
        .chars()
        .all(|chr| chr.is_ascii_alphanumeric() || chr == '_')
        && sheet_name
            .chars()
            .next()
            .is_some_and(|chr| chr.is_ascii_alphabetic() || chr == '_');
    if if_plain {
        sheet_name.to_string()
    } else {
        format!("'{}'", sheet_name.replace('\'', "''"))
    }
}

/// Sheet-qualified fully anchored range; a single cell when both corners match.
pub fn derive_sheet_range_ref(
    sheet_name: &str,
    r1: usize,
    c1: usize,
    r2: usize,
    c2: usize,
) -> String {
    let c_range = if r1 == r2 && c1 == c2 {
        derive_abs_cell_ref(r1, c1)
    } else {
        derive_abs_range_ref(r1, c1, r2, c2)
    };
    format!("{}!{}", quote_sheet_name(sheet_name), c_range)
}

/// Parse an A1 cell reference (anchors optional) into zero-based `(row, col)`.
pub fn parse_cell_ref(text: &str) -> Option<(usize, usize)> {
    let c_body = text.replace('$', "");
    let n_split = c_body.find(|chr: char| chr.is_ascii_digit())?;
    let (c_letters, c_digits) = c_body.split_at(n_split);
    let col = parse_col_letters(c_letters)?;
    let row: usize = c_digits.parse().ok()?;
    if row == 0 || row > N_NROWS_EXCEL_MAX || col >= N_NCOLS_EXCEL_MAX {
        return None;
    }
    Some((row - 1, col))
}

/// Split `Sheet!$A$1:$B$2` into sheet name and the two corners.
pub fn parse_sheet_range_ref(text: &str) -> Option<(String, (usize, usize), (usize, usize))> {
    let c_text = text.strip_prefix('=').unwrap_or(text);
    let (c_sheet, c_range) = c_text.rsplit_once('!')?;
    let c_sheet = c_sheet
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .unwrap_or_else(|| c_sheet.to_string());
    let (c_first, c_last) = c_range.split_once(':').unwrap_or((c_range, c_range));
    Some((c_sheet, parse_cell_ref(c_first)?, parse_cell_ref(c_last)?))
}

/// Convert usize row index to rust_xlsxwriter row type.
pub fn cast_row_num(row: usize) -> Result<RowNum, CapbookError> {
    if row >= N_NROWS_EXCEL_MAX {
        return Err(CapbookError::WriterFailure {
            context: "row index".to_string(),
            message: format!("row {row} exceeds Excel limit {N_NROWS_EXCEL_MAX}"),
        });
    }
    RowNum::try_from(row).map_err(|_| CapbookError::WriterFailure {
        context: "row index".to_string(),
        message: format!("row {row} does not fit RowNum"),
    })
}

/// Convert usize column index to rust_xlsxwriter column type.
pub fn cast_col_num(col: usize) -> Result<ColNum, CapbookError> {
    if col >= N_NCOLS_EXCEL_MAX {
        return Err(CapbookError::WriterFailure {
            context: "column index".to_string(),
            message: format!("column {col} exceeds Excel limit {N_NCOLS_EXCEL_MAX}"),
        });
    }
    ColNum::try_from(col).map_err(|_| CapbookError::WriterFailure {
        context: "column index".to_string(),
        message: format!("column {col} does not fit ColNum"),
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Columns

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), String> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate column names detected: {c_msg}"))
}

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Estimate displayed width units; non-ASCII characters count wider.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DatesAndText

/// Excel 1900-system serial of a date.
pub fn derive_excel_date_serial(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    (date - epoch).num_days() as f64
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time part.
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let c_text = text.trim();
    let c_date = c_text.get(..10).unwrap_or(c_text);
    NaiveDate::parse_from_str(c_date, "%Y-%m-%d").ok()
}

/// Season label of a salary year (`2025 -> 2025-26`).
pub fn derive_season_label(year: i32) -> String {
    format!("{year}-{:02}", (year + 1).rem_euclid(100))
}

/// Truncate to `budget` characters with a trailing ellipsis.
pub fn truncate_text(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    if budget == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(budget - 1).collect();
    out.push('…');
    out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_letters_round_trip_edges() {
        assert_eq!(derive_col_letters(0), "A");
        assert_eq!(derive_col_letters(25), "Z");
        assert_eq!(derive_col_letters(26), "AA");
        assert_eq!(derive_col_letters(701), "ZZ");
        assert_eq!(derive_col_letters(702), "AAA");
        assert_eq!(parse_col_letters("XFD"), Some(16_383));
        assert_eq!(parse_col_letters("ab"), Some(27));
        assert_eq!(parse_col_letters("A1"), None);
    }

    #[test]
    fn test_cell_and_range_refs() {
        assert_eq!(derive_abs_cell_ref(2, 1), "$B$3");
        assert_eq!(derive_cell_ref(3, 4, false, true), "$E4");
        assert_eq!(derive_abs_range_ref(1, 2, 9, 2), "$C$2:$C$10");
        assert_eq!(
            derive_sheet_range_ref("PLAYGROUND", 1, 1, 1, 1),
            "PLAYGROUND!$B$2"
        );
        assert_eq!(
            derive_sheet_range_ref("My Sheet", 0, 0, 1, 0),
            "'My Sheet'!$A$1:$A$2"
        );
    }

    #[test]
    fn test_parse_refs() {
        assert_eq!(parse_cell_ref("$E$4"), Some((3, 4)));
        assert_eq!(parse_cell_ref("E4"), Some((3, 4)));
        assert_eq!(parse_cell_ref("E0"), None);
        assert_eq!(parse_cell_ref("4"), None);

        let (c_sheet, first, last) =
            parse_sheet_range_ref("='My Sheet'!$B$2:$C$5").expect("parse");
        assert_eq!(c_sheet, "My Sheet");
        assert_eq!(first, (1, 1));
        assert_eq!(last, (4, 2));

        let (c_sheet, first, last) = parse_sheet_range_ref("META!$B$4").expect("parse");
        assert_eq!(c_sheet, "META");
        assert_eq!(first, last);
    }

    #[test]
    fn test_date_serial_and_parse() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).expect("date");
        assert_eq!(derive_excel_date_serial(date), 45_931.0);
        assert_eq!(parse_iso_date("2025-10-01T00:00:00"), Some(date));
        assert_eq!(parse_iso_date("10/01/2025"), None);
    }

    #[test]
    fn test_season_label_and_truncate() {
        assert_eq!(derive_season_label(2025), "2025-26");
        assert_eq!(derive_season_label(2099), "2099-00");
        assert_eq!(truncate_text("abcdef", 10), "abcdef");
        assert_eq!(truncate_text("abcdef", 4), "abc…");
        assert_eq!(truncate_text("abcdef", 0), "");
    }

    #[test]
    fn test_validate_unique_columns_reports_positions() {
        let cols = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let err = validate_unique_columns(&cols).expect_err("duplicate");
        assert!(err.contains("\"a\" x2 at indices [0, 2]"));
        assert!(validate_unique_columns(&cols[..2]).is_ok());
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }
}
