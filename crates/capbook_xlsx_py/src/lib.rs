use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{StructArray, TryExtend};
use arrow::datatypes::{ArrowDataType, ArrowSchema, Field as ArrowField};
use arrow::record_batch::RecordBatchT;
use capbook_xlsx::util::parse_iso_date;
use capbook_xlsx::{
    C_DATA_CONTRACT_VERSION, CapbookError, MemoryTableSource, SpecAssertionCommand,
    SpecBuildOptions, build_capbook_with_report, lint_workbook,
};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::ffi as pyffi;
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyDict, PyList};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "capbook.xlsx.v1";
const C_BRIDGE_TRANSPORT: &str = "arrow_c_data";
const C_ARROW_ARRAY_STREAM_CAPSULE_NAME: &[u8] = b"arrow_array_stream\0";

fn convert_capbook_error(err: CapbookError) -> PyErr {
    match err {
        CapbookError::InvalidOption { .. } => PyValueError::new_err(err.to_string()),
        CapbookError::Io { .. } => PyIOError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Build a capbook from a mapping of table name to DataFrame.
///
/// Returns the metadata record plus the build counters as a dict.
#[pyfunction]
#[pyo3(signature = (
    file_out,
    tables,
    base_year,
    as_of_date,
    league,
    exporter_commit_sha,
    data_contract_version = None,
    extract_errors = None,
    assertion_cmd = None,
    assertion_timeout_secs = 120.0
))]
#[allow(clippy::too_many_arguments)]
fn build_capbook<'py>(
    py: Python<'py>,
    file_out: String,
    tables: &Bound<'py, PyDict>,
    base_year: i32,
    as_of_date: &Bound<'py, PyAny>,
    league: String,
    exporter_commit_sha: String,
    data_contract_version: Option<String>,
    extract_errors: Option<&Bound<'py, PyDict>>,
    assertion_cmd: Option<Vec<String>>,
    assertion_timeout_secs: f64,
) -> PyResult<Bound<'py, PyDict>> {
    let mut source = MemoryTableSource::new();
    for (key, value) in tables.iter() {
        let c_table: String = key.extract()?;
        let df = derive_dataframe_from_any_dataframe(py, &value)?;
        source
            .insert_dataframe(c_table, &df)
            .map_err(convert_capbook_error)?;
    }
    if let Some(extract_errors) = extract_errors {
        for (key, value) in extract_errors.iter() {
            source.insert_error(key.extract::<String>()?, value.str()?.to_string());
        }
    }

    let assertion = match assertion_cmd {
        Some(l_cmd) if !l_cmd.is_empty() => {
            if !assertion_timeout_secs.is_finite() || assertion_timeout_secs <= 0.0 {
                return Err(PyValueError::new_err(
                    "assertion_timeout_secs must be a positive number.",
                ));
            }
            Some(SpecAssertionCommand {
                program: l_cmd[0].clone(),
                args: l_cmd[1..].to_vec(),
                timeout: Duration::from_secs_f64(assertion_timeout_secs),
            })
        }
        _ => None,
    };

    let options = SpecBuildOptions {
        base_year,
        as_of_date: parse_any_date(as_of_date)?,
        league,
        data_contract_version: data_contract_version
            .unwrap_or_else(|| C_DATA_CONTRACT_VERSION.to_string()),
        exporter_commit_sha,
        assertion,
        ..Default::default()
    };

    let path_file_out = PathBuf::from(&file_out);
    let (meta, report) = py
        .allow_threads(|| build_capbook_with_report(&path_file_out, &mut source, &options))
        .map_err(convert_capbook_error)?;

    let dict_out = PyDict::new(py);
    dict_out.set_item("refreshed_at", meta.refreshed_at)?;
    dict_out.set_item("base_year", meta.base_year)?;
    dict_out.set_item("as_of_date", meta.as_of_date.to_string())?;
    dict_out.set_item("league", meta.league)?;
    dict_out.set_item("data_contract_version", meta.data_contract_version)?;
    dict_out.set_item("exporter_commit_sha", meta.exporter_commit_sha)?;
    dict_out.set_item("validation_status", meta.validation_status.as_str())?;
    dict_out.set_item("validation_errors", PyList::new(py, meta.validation_errors)?)?;
    dict_out.set_item("warnings", PyList::new(py, report.warnings.clone())?)?;
    dict_out.set_item("file_out", meta.path_file_out.to_string_lossy().to_string())?;
    for (c_key, n_count) in report.to_dict() {
        dict_out.set_item(c_key, n_count)?;
    }
    Ok(dict_out)
}

/// Lint a generated capbook; returns one line per violation.
#[pyfunction]
fn validate_capbook(py: Python<'_>, file_in: String) -> PyResult<Vec<String>> {
    let report = py
        .allow_threads(|| lint_workbook(&file_in))
        .map_err(convert_capbook_error)?;
    Ok(report
        .violations
        .iter()
        .map(|violation| violation.to_string())
        .collect())
}

/// Accept `datetime.date`, `datetime.datetime`, or an ISO `YYYY-MM-DD` string.
fn parse_any_date(obj: &Bound<'_, PyAny>) -> PyResult<NaiveDate> {
    let c_text: String = if let Ok(c_text) = obj.extract::<String>() {
        c_text
    } else if obj.hasattr("isoformat")? {
        obj.call_method0("isoformat")?.extract()?
    } else {
        return Err(PyValueError::new_err(
            "as_of_date must be a date or an ISO `YYYY-MM-DD` string.",
        ));
    };
    let c_day = c_text.get(..10).unwrap_or(&c_text);
    parse_iso_date(c_day)
        .ok_or_else(|| PyValueError::new_err(format!("Invalid as_of_date: {c_text:?}")))
}

fn derive_dataframe_from_any_dataframe(
    py: Python<'_>,
    df: &Bound<'_, PyAny>,
) -> PyResult<DataFrame> {
    let df_polars = convert_to_polars_dataframe(py, df)?;
    let obj_capsule = df_polars.call_method0("__arrow_c_stream__")?;
    derive_dataframe_from_arrow_c_stream_capsule(&obj_capsule)
}

fn derive_dataframe_from_arrow_c_stream_capsule(
    obj_capsule: &Bound<'_, PyAny>,
) -> PyResult<DataFrame> {
    let ptr_capsule = obj_capsule.as_ptr();
    let ptr_stream_name = C_ARROW_ARRAY_STREAM_CAPSULE_NAME
        .as_ptr()
        .cast::<std::os::raw::c_char>();

    // Safety: We only pass pointers owned by the Python object for validation.
    let if_valid_capsule = unsafe { pyffi::PyCapsule_IsValid(ptr_capsule, ptr_stream_name) };
    if if_valid_capsule == 0 {
        return Err(PyValueError::new_err(
            "Expected a valid `arrow_array_stream` PyCapsule.",
        ));
    }

    // Safety: Capsule name was validated as `arrow_array_stream` above.
    let ptr_stream = unsafe { pyffi::PyCapsule_GetPointer(ptr_capsule, ptr_stream_name) };
    if ptr_stream.is_null() {
        return Err(PyValueError::new_err(
            "Arrow C stream capsule pointer is null.",
        ));
    }

    let stream = ptr_stream.cast::<arrow::ffi::ArrowArrayStream>();
    // Safety: `stream` points to a live ArrowArrayStream owned by the capsule.
    let mut reader = unsafe { arrow::ffi::ArrowArrayStreamReader::try_new(&mut *stream) }
        .map_err(|err| PyValueError::new_err(format!("Failed to open Arrow C stream: {err}")))?;

    let schema_arrow = derive_arrow_schema_from_stream_field(reader.field())?;
    let schema_ref = Arc::new(schema_arrow.clone());
    let mut df = DataFrame::empty_with_arrow_schema(&schema_arrow);

    while let Some(res_array) = unsafe { reader.next() } {
        let array_row_batch = res_array.map_err(|err| {
            PyValueError::new_err(format!("Failed to read Arrow stream batch: {err}"))
        })?;

        let array_struct = array_row_batch
            .as_any()
            .downcast_ref::<StructArray>()
            .ok_or_else(|| {
                PyValueError::new_err(
                    "Arrow C stream must yield StructArray batches for DataFrame import.",
                )
            })?;

        let l_arrays = array_struct.values().to_vec();
        let record_batch = RecordBatchT::try_new(array_struct.len(), schema_ref.clone(), l_arrays)
            .map_err(|err| {
                PyValueError::new_err(format!(
                    "Failed to construct Arrow record batch from stream: {err}"
                ))
            })?;

        df.try_extend(std::iter::once(record_batch))
            .map_err(|err| {
                PyValueError::new_err(format!(
                    "Failed to append Arrow record batch to DataFrame: {err}"
                ))
            })?;
    }

    Ok(df)
}

fn derive_arrow_schema_from_stream_field(field: &ArrowField) -> PyResult<ArrowSchema> {
    match field.dtype() {
        ArrowDataType::Struct(fields) => Ok(fields
            .iter()
            .cloned()
            .map(|field_inner| (field_inner.name.clone(), field_inner))
            .collect::<ArrowSchema>()),
        dtype => Err(PyValueError::new_err(format!(
            "Arrow stream schema must be Struct, got: {dtype:?}"
        ))),
    }
}

fn convert_to_polars_dataframe<'py>(
    py: Python<'py>,
    df: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let module_polars = py.import("polars")?;
    let cls_dataframe = module_polars.getattr("DataFrame")?;

    if df.is_instance(&cls_dataframe)? {
        return Ok(df.clone());
    }

    cls_dataframe.call1((df,))
}

#[pymodule]
fn _capbook_xlsx_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(build_capbook, module)?)?;
    module.add_function(wrap_pyfunction!(validate_capbook, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    module.add("__data_contract__", C_DATA_CONTRACT_VERSION)?;
    Ok(())
}
