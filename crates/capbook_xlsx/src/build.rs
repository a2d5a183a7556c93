//! The linear build pipeline.
//!
//! assertions -> writer + default font check -> styles -> data tables -> META names
//! -> CALC -> PLAYGROUND -> MATRIX -> META sheet -> name publication -> save.
//! Data and writer failures are recorded and the pipeline continues; registry
//! failures abort it. The workbook is saved on every exit path.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, warn};

use crate::assertion::run_assertion;
use crate::calc::write_calc_sheet;
use crate::conf::{N_NROWS_EXCEL_MAX, N_YEAR_OFFSETS, TBL_TEAM_SALARY_WAREHOUSE};
use crate::contract::{
    SpecTableContract, check_data_invariants, derive_table_contracts, project_extract,
    retain_league, retain_year_window,
};
use crate::error::CapbookError;
use crate::matrix::write_matrix_sheet;
use crate::meta::{declare_meta_names, write_meta_sheet};
use crate::names::NameRegistry;
use crate::playground::{SpecPlaygroundOptions, write_playground_sheet};
use crate::report::{ReportBuild, ReportBuildBuilder};
use crate::source::TableSource;
use crate::spec::{SpecBuildMeta, SpecBuildOptions, SpecTableData};
use crate::style::StyleRegistry;
use crate::writer::CapbookWriter;

/// Build a capbook at `path_file_out` and return its metadata record.
pub fn build_capbook(
    path_file_out: impl AsRef<Path>,
    source: &mut dyn TableSource,
    options: &SpecBuildOptions,
) -> Result<SpecBuildMeta, CapbookError> {
    build_capbook_with_report(path_file_out, source, options).map(|(meta, _)| meta)
}

/// Like [`build_capbook`], also returning the build counters.
pub fn build_capbook_with_report(
    path_file_out: impl AsRef<Path>,
    source: &mut dyn TableSource,
    options: &SpecBuildOptions,
) -> Result<(SpecBuildMeta, ReportBuild), CapbookError> {
    validate_build_options(options)?;
    let path_file_out = path_file_out.as_ref();
    info!(
        path = %path_file_out.display(),
        base_year = options.base_year,
        league = %options.league,
        "capbook build started"
    );

    let mut report = ReportBuildBuilder::default();
    if let Some(command) = &options.assertion {
        if let Err(err) = run_assertion(command) {
            report.add_capbook_error(&err);
        }
    }

    let mut writer = CapbookWriter::new(path_file_out);
    let res_stages = run_stages(&mut writer, source, options, &mut report);
    let res_close = writer.close();

    match (res_stages, res_close) {
        (Ok(meta), Ok(())) => {
            let report = report.build();
            info!("{}", report.format("[CAPBOOK]"));
            Ok((meta, report))
        }
        (Ok(_), Err(err)) => Err(err),
        (Err(err), res_close) => {
            if let Err(err_close) = res_close {
                error!(error = %err_close, "workbook could not be saved after a fatal error");
            }
            Err(err)
        }
    }
}

fn validate_build_options(options: &SpecBuildOptions) -> Result<(), CapbookError> {
    let derive_err = |option: &str, message: &str| CapbookError::InvalidOption {
        option: option.to_string(),
        message: message.to_string(),
    };
    if !(1900..=9999 - N_YEAR_OFFSETS as i32).contains(&options.base_year) {
        return Err(derive_err("base_year", "must be a four-digit year"));
    }
    if options.league.trim().is_empty() {
        return Err(derive_err("league", "must not be empty"));
    }
    if options.roster_rows_reserved == 0 || options.roster_rows_reserved > N_NROWS_EXCEL_MAX / 2 {
        return Err(derive_err("roster_rows_reserved", "out of range"));
    }
    if options.exceptions_rows_reserved == 0 {
        return Err(derive_err("exceptions_rows_reserved", "must be at least 1"));
    }
    if options.error_entry_budget < 4 {
        return Err(derive_err("error_entry_budget", "must be at least 4"));
    }
    Ok(())
}

fn run_stages(
    writer: &mut CapbookWriter,
    source: &mut dyn TableSource,
    options: &SpecBuildOptions,
    report: &mut ReportBuildBuilder,
) -> Result<SpecBuildMeta, CapbookError> {
    let styles = StyleRegistry::new();
    if let Err(err) = writer.check_default_font(&styles) {
        record_or_abort(report, err)?;
    }

    let mut l_team_codes: Vec<String> = Vec::new();
    for contract in derive_table_contracts() {
        let data = write_one_table(writer, source, &contract, &styles, options, report)?;
        if contract.table_name == TBL_TEAM_SALARY_WAREHOUSE {
            l_team_codes = derive_team_codes(&data);
        }
    }
    info!(
        tables = report.cnt_tables_written,
        failed = report.cnt_tables_failed,
        "data tables written"
    );

    let mut names = NameRegistry::new();
    declare_meta_names(&mut names)?;
    write_calc_sheet(writer, &styles, &mut names)?;
    write_playground_sheet(
        writer,
        &styles,
        &mut names,
        &SpecPlaygroundOptions {
            team_codes: &l_team_codes,
            n_roster_rows: options.roster_rows_reserved,
            n_exception_rows: options.exceptions_rows_reserved,
        },
    )?;
    write_matrix_sheet(writer, &styles, &mut names, &l_team_codes)?;

    let snapshot = report.snapshot();
    let meta = SpecBuildMeta {
        refreshed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        base_year: options.base_year,
        as_of_date: options.as_of_date,
        league: options.league.clone(),
        data_contract_version: options.data_contract_version.clone(),
        exporter_commit_sha: options.exporter_commit_sha.clone(),
        validation_status: snapshot.validation_status(),
        validation_errors: snapshot.errors.clone(),
        path_file_out: writer.file_out().to_path_buf(),
    };
    write_meta_sheet(
        writer,
        &styles,
        &meta,
        &snapshot.warnings,
        options.error_entry_budget,
    )?;

    let n_names = writer.publish_names(&names)?;
    report.set_names_published(n_names as u64);
    info!(
        names = n_names,
        status = meta.validation_status.as_str(),
        "capbook sheets written"
    );
    Ok(meta)
}

/// Extract, project, filter, check and write one table.
///
/// Any data or writer failure is recorded and the table is written empty so
/// its name still resolves. Returns the rows actually written.
/// Record a recoverable stage error; fatal kinds abort the build.
fn record_or_abort(report: &mut ReportBuildBuilder, err: CapbookError) -> Result<(), CapbookError> {
    if err.is_fatal() {
        return Err(err);
    }
    report.add_capbook_error(&err);
    Ok(())
}

fn write_one_table(
    writer: &mut CapbookWriter,
    source: &mut dyn TableSource,
    contract: &SpecTableContract,
    styles: &StyleRegistry,
    options: &SpecBuildOptions,
    report: &mut ReportBuildBuilder,
) -> Result<SpecTableData, CapbookError> {
    let res_data = source
        .extract(contract)
        .and_then(|extract| project_extract(contract, &extract));

    let data = match res_data {
        Ok(mut data) => {
            let n_other_league = retain_league(&mut data, &options.league);
            let n_dropped = retain_year_window(&mut data, options.base_year);
            if n_dropped > 0 {
                report.add_rows_dropped(n_dropped as u64);
                report.add_warning(format!(
                    "{}: dropped {n_dropped} rows outside salary years {}-{}",
                    contract.table_name,
                    options.base_year,
                    options.base_year + N_YEAR_OFFSETS as i32 - 1
                ));
            }
            if n_other_league > 0 {
                warn!(
                    table = contract.table_name,
                    rows = n_other_league,
                    "rows of other leagues filtered"
                );
            }
            for c_error in check_data_invariants(contract, &data, options.base_year) {
                report.add_error(c_error);
            }
            Some(data)
        }
        Err(err) => {
            record_or_abort(report, err)?;
            None
        }
    };

    if let Some(data) = data {
        match writer.write_table(contract, &data, styles) {
            Ok(_) => {
                report.add_table_written();
                return Ok(data);
            }
            Err(err) => record_or_abort(report, err)?,
        }
    }

    report.add_table_failed();
    let data_empty = SpecTableData {
        columns: contract.column_names(),
        rows: Vec::new(),
    };
    writer.write_table(contract, &data_empty, styles)?;
    Ok(data_empty)
}

/// Distinct team codes, sorted.
fn derive_team_codes(data: &SpecTableData) -> Vec<String> {
    data.column_values("team_code")
        .map(|value| value.as_text())
        .filter(|c_code| !c_code.is_empty())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}
