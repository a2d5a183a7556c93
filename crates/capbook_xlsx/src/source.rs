//! Extraction sources feeding the build.
//!
//! The warehouse itself lives outside this crate; callers hand over each
//! table either as keyed records or as a polars `DataFrame`.

use std::collections::BTreeMap;
use std::io::Cursor;

use chrono::{Days, NaiveDate};
use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};
use tracing::debug;

use crate::contract::SpecTableContract;
use crate::error::CapbookError;
use crate::spec::{EnumCellValue, SpecTableExtract};

/// Supplies one extraction per declared table.
pub trait TableSource {
    /// Extract the rows of `contract`'s table.
    ///
    /// Failures carry the attempted column list so the build can still emit
    /// an empty table with the declared schema.
    fn extract(&mut self, contract: &SpecTableContract) -> Result<SpecTableExtract, CapbookError>;
}

/// In-memory source keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct MemoryTableSource {
    dict_tables: BTreeMap<String, SpecTableExtract>,
    dict_errors: BTreeMap<String, String>,
}

impl MemoryTableSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a table's extraction.
    pub fn insert(&mut self, table_name: impl Into<String>, extract: SpecTableExtract) {
        let c_table = table_name.into();
        self.dict_errors.remove(&c_table);
        self.dict_tables.insert(c_table, extract);
    }

    /// Register a table from a polars frame.
    pub fn insert_dataframe(
        &mut self,
        table_name: impl Into<String>,
        df: &DataFrame,
    ) -> Result<(), CapbookError> {
        let c_table = table_name.into();
        let extract = derive_extract_from_dataframe(&c_table, df)?;
        self.insert(c_table, extract);
        Ok(())
    }

    /// Register a table from Polars IPC bytes.
    pub fn insert_ipc_bytes(
        &mut self,
        table_name: impl Into<String>,
        v_ipc_df: &[u8],
    ) -> Result<(), CapbookError> {
        let c_table = table_name.into();
        let df = derive_dataframe_from_ipc_bytes(&c_table, v_ipc_df)?;
        self.insert_dataframe(c_table, &df)
    }

    /// Record an upstream failure for a table.
    pub fn insert_error(&mut self, table_name: impl Into<String>, message: impl Into<String>) {
        let c_table = table_name.into();
        self.dict_tables.remove(&c_table);
        self.dict_errors.insert(c_table, message.into());
    }
}

impl TableSource for MemoryTableSource {
    fn extract(&mut self, contract: &SpecTableContract) -> Result<SpecTableExtract, CapbookError> {
        let derive_err = |message: String| CapbookError::Extract {
            table: contract.table_name.to_string(),
            columns: contract.column_names(),
            message,
        };
        if let Some(message) = self.dict_errors.get(contract.table_name) {
            return Err(derive_err(message.clone()));
        }
        self.dict_tables
            .get(contract.table_name)
            .cloned()
            .ok_or_else(|| derive_err("no extraction registered".to_string()))
    }
}

/// Decode Polars IPC bytes.
pub fn derive_dataframe_from_ipc_bytes(
    table_name: &str,
    v_ipc_df: &[u8],
) -> Result<DataFrame, CapbookError> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| CapbookError::Extract {
            table: table_name.to_string(),
            columns: Vec::new(),
            message: format!("failed to read IPC DataFrame bytes: {err}"),
        })
}

/// Convert a polars frame into keyed records.
pub fn derive_extract_from_dataframe(
    table_name: &str,
    df: &DataFrame,
) -> Result<SpecTableExtract, CapbookError> {
    let l_columns: Vec<String> = df
        .get_columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let mut l_rows = Vec::with_capacity(df.height());
    for n_row in 0..df.height() {
        let mut record = BTreeMap::new();
        for (c_name, col) in l_columns.iter().zip(df.get_columns()) {
            let value = col.get(n_row).map_err(|err| CapbookError::Extract {
                table: table_name.to_string(),
                columns: l_columns.clone(),
                message: format!("failed to access cell ({n_row}, {c_name}): {err}"),
            })?;
            record.insert(c_name.clone(), derive_cell_value_from_any_value(value));
        }
        l_rows.push(record);
    }
    debug!(table = table_name, rows = l_rows.len(), "dataframe converted");
    Ok(SpecTableExtract {
        columns: l_columns,
        rows: l_rows,
    })
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Bool(val),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        AnyValue::Date(n_days) => derive_date_from_epoch_days(n_days)
            .map(EnumCellValue::Date)
            .unwrap_or(EnumCellValue::None),
        _ => EnumCellValue::String(value.to_string()),
    }
}

fn derive_date_from_epoch_days(n_days: i32) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    if n_days >= 0 {
        epoch.checked_add_days(Days::new(n_days as u64))
    } else {
        epoch.checked_sub_days(Days::new(n_days.unsigned_abs() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{TBL_MINIMUM_SCALE, TBL_TAX_RATES};
    use crate::contract::find_table_contract;
    use polars::prelude::{IpcWriter, SerWriter, df};

    #[test]
    fn test_dataframe_values_are_typed() {
        let df = df!(
            "team_code" => ["POR", "MIL"],
            "salary_year" => [2025i64, 2026],
            "is_two_way" => [true, false],
            "cap_amount" => [Some(1.5f64), None],
        )
        .expect("df");
        let extract = derive_extract_from_dataframe("tbl_x", &df).expect("extract");
        assert_eq!(
            extract.columns,
            vec!["team_code", "salary_year", "is_two_way", "cap_amount"]
        );
        assert_eq!(extract.rows.len(), 2);
        assert_eq!(extract.rows[0]["team_code"], EnumCellValue::String("POR".to_string()));
        assert_eq!(extract.rows[1]["salary_year"], EnumCellValue::Number(2026.0));
        assert_eq!(extract.rows[0]["is_two_way"], EnumCellValue::Bool(true));
        assert_eq!(extract.rows[1]["cap_amount"], EnumCellValue::None);
    }

    #[test]
    fn test_epoch_days_map_to_calendar_dates() {
        assert_eq!(
            derive_date_from_epoch_days(0),
            NaiveDate::from_ymd_opt(1970, 1, 1)
        );
        assert_eq!(
            derive_date_from_epoch_days(20_362),
            NaiveDate::from_ymd_opt(2025, 10, 1)
        );
        assert_eq!(
            derive_date_from_epoch_days(-1),
            NaiveDate::from_ymd_opt(1969, 12, 31)
        );
    }

    #[test]
    fn test_ipc_bytes_are_accepted() {
        let mut df = df!(
            "salary_year" => [2025i64],
            "minimum_salary_amount" => [1_272_870.0f64],
        )
        .expect("df");
        let mut v_buf: Vec<u8> = Vec::new();
        IpcWriter::new(&mut v_buf).finish(&mut df).expect("ipc");

        let mut source = MemoryTableSource::new();
        source
            .insert_ipc_bytes(TBL_MINIMUM_SCALE, &v_buf)
            .expect("insert");
        let contract = find_table_contract(TBL_MINIMUM_SCALE).expect("contract");
        let extract = source.extract(&contract).expect("extract");
        assert_eq!(extract.rows[0]["salary_year"], EnumCellValue::Number(2025.0));
    }

    #[test]
    fn test_missing_and_failed_tables_carry_columns() {
        let mut source = MemoryTableSource::new();
        let contract = find_table_contract(TBL_TAX_RATES).expect("contract");

        let err = source.extract(&contract).expect_err("missing");
        match err {
            CapbookError::Extract { columns, .. } => {
                assert_eq!(columns, contract.column_names())
            }
            other => panic!("unexpected {other:?}"),
        }

        source.insert_error(TBL_TAX_RATES, "connection reset");
        let err = source.extract(&contract).expect_err("failed");
        assert!(err.to_string().contains("connection reset"));
    }
}
