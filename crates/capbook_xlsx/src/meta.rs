//! META sheet: build provenance, validation banner and the diagnostic list.

use tracing::info;

use crate::conf::{C_SHEET_META, EnumStyleKey};
use crate::error::CapbookError;
use crate::names::{
    META_AS_OF_DATE, META_BASE_YEAR, META_DATA_CONTRACT_VERSION, META_REFRESHED_AT,
    META_VALIDATION_STATUS, NameRegistry,
};
use crate::spec::{EnumCellValue, EnumValidationStatus, SpecBuildMeta};
use crate::style::StyleRegistry;
use crate::util::truncate_text;
use crate::writer::{
    CapbookWriter, EnumSheetRole, new_formula_worksheet, write_cell_with_format, write_label,
};

const N_META_COL_LABEL: usize = 0;
const N_META_COL_VALUE: usize = 1;
const N_META_ROW_FIRST_FIELD: usize = 1;
const N_META_ROW_DIAGNOSTICS: usize = 10;
const N_WIDTH_LABEL: f64 = 24.0;
const N_WIDTH_VALUE: f64 = 80.0;

/// Field rows of META, in order; the first five back the `Meta*` names.
const TUP_META_FIELDS: [(&str, Option<&str>); 7] = [
    ("validation_status", Some(META_VALIDATION_STATUS)),
    ("refreshed_at", Some(META_REFRESHED_AT)),
    ("base_year", Some(META_BASE_YEAR)),
    ("as_of_date", Some(META_AS_OF_DATE)),
    ("league", None),
    ("data_contract_version", Some(META_DATA_CONTRACT_VERSION)),
    ("exporter_commit_sha", None),
];

fn derive_field_row(field: &str) -> usize {
    TUP_META_FIELDS
        .iter()
        .position(|(label, _)| *label == field)
        .map(|n_idx| N_META_ROW_FIRST_FIELD + n_idx)
        .unwrap_or(N_META_ROW_FIRST_FIELD)
}

/// Declare the META names. Runs before any UI sheet so their formulas
/// resolve against a complete registry.
pub fn declare_meta_names(names: &mut NameRegistry) -> Result<(), CapbookError> {
    for (field, name) in TUP_META_FIELDS {
        if let Some(name) = name {
            names.declare_cell(name, C_SHEET_META, derive_field_row(field), N_META_COL_VALUE)?;
        }
    }
    Ok(())
}

/// Write META. Called last so it captures every diagnostic.
pub fn write_meta_sheet(
    writer: &mut CapbookWriter,
    styles: &StyleRegistry,
    meta: &SpecBuildMeta,
    warnings: &[String],
    n_entry_budget: usize,
) -> Result<(), CapbookError> {
    let mut worksheet = new_formula_worksheet(C_SHEET_META)?;
    let fmt_title = styles.get(EnumStyleKey::Title);
    let fmt_label = styles.get(EnumStyleKey::KpiLabel);
    let fmt_text = styles.get(EnumStyleKey::Text);
    let fmt_integer = styles.get(EnumStyleKey::Integer);
    let fmt_date = styles.get(EnumStyleKey::Date);
    let fmt_section = styles.get(EnumStyleKey::SectionLabel);
    let fmt_status = match meta.validation_status {
        EnumValidationStatus::Pass => styles.get(EnumStyleKey::VerdictYes),
        EnumValidationStatus::Failed => styles.get(EnumStyleKey::Banner),
    };

    write_label(&mut worksheet, 0, N_META_COL_LABEL, "Capbook Metadata", &fmt_title)?;

    let l_values = [
        (
            EnumCellValue::String(meta.validation_status.as_str().to_string()),
            &fmt_status,
        ),
        (EnumCellValue::String(meta.refreshed_at.clone()), &fmt_text),
        (EnumCellValue::Number(meta.base_year as f64), &fmt_integer),
        (EnumCellValue::Date(meta.as_of_date), &fmt_date),
        (EnumCellValue::String(meta.league.clone()), &fmt_text),
        (
            EnumCellValue::String(meta.data_contract_version.clone()),
            &fmt_text,
        ),
        (
            EnumCellValue::String(meta.exporter_commit_sha.clone()),
            &fmt_text,
        ),
    ];
    for ((field, _), (value, fmt)) in TUP_META_FIELDS.iter().zip(l_values.iter()) {
        let n_row = derive_field_row(field);
        write_label(&mut worksheet, n_row, N_META_COL_LABEL, field, &fmt_label)?;
        write_cell_with_format(&mut worksheet, n_row, N_META_COL_VALUE, value, fmt)?;
    }

    let mut n_row = N_META_ROW_DIAGNOSTICS;
    for (c_title, l_entries) in [
        ("Errors", meta.validation_errors.as_slice()),
        ("Warnings", warnings),
    ] {
        if l_entries.is_empty() {
            continue;
        }
        write_label(&mut worksheet, n_row, N_META_COL_LABEL, c_title, &fmt_section)?;
        n_row += 1;
        for (n_idx, entry) in l_entries.iter().enumerate() {
            write_label(
                &mut worksheet,
                n_row,
                N_META_COL_LABEL,
                &format!("{}", n_idx + 1),
                &fmt_text,
            )?;
            write_label(
                &mut worksheet,
                n_row,
                N_META_COL_VALUE,
                &truncate_text(entry, n_entry_budget),
                &fmt_text,
            )?;
            n_row += 1;
        }
        n_row += 1;
    }

    worksheet
        .set_column_width(0, N_WIDTH_LABEL)
        .map_err(|err| CapbookError::from_xlsx("meta column width", err))?;
    worksheet
        .set_column_width(1, N_WIDTH_VALUE)
        .map_err(|err| CapbookError::from_xlsx("meta column width", err))?;

    writer.add_worksheet(EnumSheetRole::Meta, worksheet)?;
    info!(
        status = meta.validation_status.as_str(),
        errors = meta.validation_errors.len(),
        warnings = warnings.len(),
        "meta written"
    );
    Ok(())
}
