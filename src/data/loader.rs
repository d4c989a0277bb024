//! Upload Data Loader Module
//! Decodes browser upload payloads and parses CSV, Excel and JSON files using Polars.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use polars::prelude::*;
use serde_json::{Map, Value};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Upload payload has no ',' separating header and data")]
    MalformedPayload,
    #[error("Failed to decode base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to load data: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to read spreadsheet: {0}")]
    Excel(#[from] calamine::XlsxError),
    #[error("Workbook has no worksheets")]
    NoWorksheet,
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON must be an array of records or an object of columns")]
    JsonShape,
}

/// Supported upload formats, matched on the exact (case-sensitive) file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Json,
}

impl FileFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.ends_with(".csv") {
            Some(FileFormat::Csv)
        } else if filename.ends_with(".xlsx") {
            Some(FileFormat::Xlsx)
        } else if filename.ends_with(".json") {
            Some(FileFormat::Json)
        } else {
            None
        }
    }
}

/// Row/column overview of a loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DatasetSummary {
    pub columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub rows: usize,
}

impl DatasetSummary {
    pub fn of(df: &DataFrame) -> Self {
        Self {
            columns: DataLoader::get_columns(df),
            numeric_columns: DataLoader::get_numeric_columns(df),
            rows: df.height(),
        }
    }

    pub fn status_line(&self) -> String {
        format!("Loaded {} rows, {} columns", self.rows, self.columns.len())
    }
}

/// Turns upload payloads into DataFrames.
pub struct DataLoader;

impl DataLoader {
    /// Resolve an upload to a DataFrame, or `None` for unsupported or unreadable files.
    pub fn resolve(contents: &str, filename: &str) -> Option<DataFrame> {
        match Self::try_resolve(contents, filename) {
            Ok(df) => Some(df),
            Err(e) => {
                warn!(filename, error = %e, "upload could not be resolved");
                None
            }
        }
    }

    pub fn try_resolve(contents: &str, filename: &str) -> Result<DataFrame, LoaderError> {
        let bytes = Self::decode_payload(contents)?;
        Self::parse_bytes(bytes, filename)
    }

    /// Strip the `<mime-marker>,` header and base64-decode the rest.
    pub fn decode_payload(contents: &str) -> Result<Vec<u8>, LoaderError> {
        let (_header, data) = contents
            .split_once(',')
            .ok_or(LoaderError::MalformedPayload)?;
        let bytes = STANDARD.decode(data.trim())?;
        debug!(bytes = bytes.len(), "decoded upload payload");
        Ok(bytes)
    }

    pub fn parse_bytes(bytes: Vec<u8>, filename: &str) -> Result<DataFrame, LoaderError> {
        let format = FileFormat::from_filename(filename)
            .ok_or_else(|| LoaderError::UnsupportedFormat(filename.to_string()))?;
        debug!(filename, ?format, "parsing upload");

        match format {
            FileFormat::Csv => Self::load_csv(bytes),
            FileFormat::Xlsx => Self::load_xlsx(bytes),
            FileFormat::Json => Self::load_json(&bytes),
        }
    }

    pub fn load_csv(bytes: Vec<u8>) -> Result<DataFrame, LoaderError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Ok(df)
    }

    /// Read the first worksheet; the first row holds the column names.
    pub fn load_xlsx(bytes: Vec<u8>) -> Result<DataFrame, LoaderError> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(LoaderError::NoWorksheet)??;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(DataFrame::empty());
        };
        let names: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Data::Empty => format!("column_{}", i),
                other => other.to_string(),
            })
            .collect();

        let body: Vec<&[Data]> = rows.collect();
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let cells: Vec<&Data> = body
                    .iter()
                    .map(|row| row.get(i).unwrap_or(&Data::Empty))
                    .collect();
                Self::spreadsheet_column(name, &cells)
            })
            .collect();

        Ok(DataFrame::new(columns)?)
    }

    fn spreadsheet_column(name: &str, cells: &[&Data]) -> Column {
        let filled = || cells.iter().filter(|c| !matches!(c, Data::Empty));

        // calamine reports most numeric cells as Float, whole numbers included
        if filled().all(|c| match c {
            Data::Int(_) => true,
            Data::Float(v) => v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64,
            _ => false,
        }) {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Data::Int(v) => Some(*v),
                    Data::Float(v) => Some(*v as i64),
                    _ => None,
                })
                .collect();
            return Column::new(name.into(), values);
        }

        if filled().all(|c| matches!(c, Data::Int(_) | Data::Float(_) | Data::DateTime(_))) {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    Data::Int(v) => Some(*v as f64),
                    Data::Float(v) => Some(*v),
                    Data::DateTime(dt) => Some(dt.as_f64()),
                    _ => None,
                })
                .collect();
            return Column::new(name.into(), values);
        }

        let values: Vec<Option<String>> = cells
            .iter()
            .map(|c| match c {
                Data::Empty => None,
                other => Some(other.to_string()),
            })
            .collect();
        Column::new(name.into(), values)
    }

    /// Accepts an array of records or a column object (arrays or index maps).
    pub fn load_json(bytes: &[u8]) -> Result<DataFrame, LoaderError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let mut order: Vec<String> = Vec::new();
        let mut cells: Map<String, Value> = Map::new();

        match value {
            Value::Array(records) => {
                for record in &records {
                    let Value::Object(fields) = record else {
                        return Err(LoaderError::JsonShape);
                    };
                    for key in fields.keys() {
                        if !cells.contains_key(key) {
                            order.push(key.clone());
                            cells.insert(key.clone(), Value::Array(Vec::new()));
                        }
                    }
                }
                for record in &records {
                    for key in &order {
                        let cell = record.get(key).cloned().unwrap_or(Value::Null);
                        if let Some(Value::Array(col)) = cells.get_mut(key) {
                            col.push(cell);
                        }
                    }
                }
            }
            Value::Object(columns) => {
                for (key, column) in columns {
                    let values = match column {
                        Value::Array(values) => values,
                        Value::Object(indexed) => indexed.into_iter().map(|(_, v)| v).collect(),
                        _ => return Err(LoaderError::JsonShape),
                    };
                    order.push(key.clone());
                    cells.insert(key, Value::Array(values));
                }
            }
            _ => return Err(LoaderError::JsonShape),
        }

        let columns = order
            .iter()
            .map(|name| match cells.get(name) {
                Some(Value::Array(values)) => Self::json_column(name, values),
                _ => Column::new(name.as_str().into(), Vec::<Option<String>>::new()),
            })
            .collect();

        Ok(DataFrame::new(columns)?)
    }

    fn json_column(name: &str, values: &[Value]) -> Column {
        let filled = || values.iter().filter(|v| !v.is_null());

        if filled().all(|v| v.is_i64()) {
            let ints: Vec<Option<i64>> = values.iter().map(Value::as_i64).collect();
            return Column::new(name.into(), ints);
        }
        if filled().all(Value::is_number) {
            let floats: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
            return Column::new(name.into(), floats);
        }

        let text: Vec<Option<String>> = values
            .iter()
            .map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect();
        Column::new(name.into(), text)
    }

    /// Get list of column names from a DataFrame.
    pub fn get_columns(df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Get list of numeric column names.
    pub fn get_numeric_columns(df: &DataFrame) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|col| is_numeric(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }
}

pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(mime: &str, body: &[u8]) -> String {
        format!("data:{};base64,{}", mime, STANDARD.encode(body))
    }

    #[test]
    fn suffix_match_is_exact_and_case_sensitive() {
        assert_eq!(FileFormat::from_filename("a.csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_filename("a.xlsx"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_filename("a.json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_filename("a.CSV"), None);
        assert_eq!(FileFormat::from_filename("a.xls"), None);
        assert_eq!(FileFormat::from_filename("a.csv.txt"), None);
    }

    #[test]
    fn decode_splits_on_first_comma_only() {
        let encoded = payload("text/csv", b"a,b\n1,2\n");
        let bytes = DataLoader::decode_payload(&encoded).unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[test]
    fn payload_without_comma_is_rejected() {
        assert!(matches!(
            DataLoader::decode_payload("garbage"),
            Err(LoaderError::MalformedPayload)
        ));
    }

    #[test]
    fn csv_keeps_column_order() {
        let contents = payload("text/csv", b"Zeta,Alpha,Mid\nx,1,2.5\ny,3,4.5\n");
        let df = DataLoader::resolve(&contents, "data.csv").unwrap();
        assert_eq!(DataLoader::get_columns(&df), vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(DataLoader::get_numeric_columns(&df), vec!["Alpha", "Mid"]);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn json_records_keep_first_seen_key_order() {
        let body = br#"[{"Category":"A","Values":10},{"Category":"B","Values":20,"Extra":1.5}]"#;
        let df = DataLoader::resolve(&payload("application/json", body), "d.json").unwrap();
        assert_eq!(
            DataLoader::get_columns(&df),
            vec!["Category", "Values", "Extra"]
        );
        assert_eq!(df.column("Values").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("Extra").unwrap().null_count(), 1);
    }

    #[test]
    fn json_column_object_accepts_index_maps() {
        let body = br#"{"Category":{"0":"A","1":"B"},"Values":{"0":1.5,"1":2}}"#;
        let df = DataLoader::load_json(body).unwrap();
        assert_eq!(DataLoader::get_columns(&df), vec!["Category", "Values"]);
        assert_eq!(df.column("Values").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn json_scalar_is_a_shape_error() {
        assert!(matches!(
            DataLoader::load_json(b"42"),
            Err(LoaderError::JsonShape)
        ));
    }

    #[test]
    fn unsupported_and_broken_uploads_are_none() {
        let contents = payload("text/plain", b"a,b\n1,2\n");
        assert!(DataLoader::resolve(&contents, "notes.txt").is_none());
        assert!(DataLoader::resolve("data:text/csv;base64,@@@", "x.csv").is_none());
        assert!(DataLoader::resolve(&payload("x", b"not a workbook"), "x.xlsx").is_none());
        assert!(DataLoader::resolve(&payload("x", b"{oops"), "x.json").is_none());
    }

    fn workbook(sheet_rows: &str) -> Vec<u8> {
        use std::io::Write;
        use ::zip::write::FileOptions;

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
                    sheet_rows
                ),
            ),
        ];

        let mut zip = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
        for (name, body) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn text(cell: &str, value: &str) -> String {
        format!(r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#, cell, value)
    }

    fn number(cell: &str, value: &str) -> String {
        format!(r#"<c r="{}"><v>{}</v></c>"#, cell, value)
    }

    #[test]
    fn xlsx_keeps_header_order_and_infers_types() {
        let rows = format!(
            r#"<row r="1">{}{}{}</row><row r="2">{}{}{}</row><row r="3">{}{}{}</row>"#,
            text("A1", "Zeta"),
            text("B1", "Alpha"),
            text("C1", "Mid"),
            text("A2", "x"),
            number("B2", "1"),
            number("C2", "1.5"),
            text("A3", "y"),
            number("B3", "2"),
            number("C3", "2.5"),
        );
        let bytes = workbook(&rows);
        let contents = payload(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            &bytes,
        );
        let df = DataLoader::try_resolve(&contents, "book.xlsx").unwrap();

        assert_eq!(DataLoader::get_columns(&df), vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("Zeta").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("Alpha").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("Mid").unwrap().dtype(), &DataType::Float64);
        assert_eq!(DataLoader::get_numeric_columns(&df), vec!["Alpha", "Mid"]);
    }

    #[test]
    fn xlsx_gap_in_integer_column_stays_integer() {
        let rows = format!(
            r#"<row r="1">{}{}</row><row r="2">{}{}</row><row r="3">{}</row>"#,
            text("A1", "Label"),
            text("B1", "Count"),
            text("A2", "a"),
            number("B2", "7"),
            text("A3", "b"),
        );
        let df = DataLoader::parse_bytes(workbook(&rows), "gaps.xlsx").unwrap();
        let count = df.column("Count").unwrap();
        assert_eq!(count.dtype(), &DataType::Int64);
        assert_eq!(count.null_count(), 1);
    }

    #[test]
    fn summary_reports_rows_and_columns() {
        let contents = payload("text/csv", b"Category,Values\nA,10\nB,20\n");
        let df = DataLoader::resolve(&contents, "data.csv").unwrap();
        let summary = DatasetSummary::of(&df);
        assert_eq!(summary.status_line(), "Loaded 2 rows, 2 columns");
    }
}
