// Loader - CSV → polars DataFrame
// Column types are inferred once at load time; lookups go through normalized headers

use anyhow::{Context, Result};
use polars::prelude::{
    Column as FrameColumn, CsvParseOptions, CsvReadOptions, DataFrame, DataType, NullValues, PlSmallStr,
    PolarsResult, SerReader, Series,
};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;

/// Cells read as missing values, in numeric and text columns alike.
/// Same spellings a pandas `read_csv` treats as NaN by default.
pub const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA",
    "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum TableError {
    #[error("CSV input is empty: no header row")]
    Empty,

    #[error("CSV header has no columns")]
    NoColumns,
}

// ============================================================================
// COLUMN TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Text,
}

/// Outcome of a column existence check.
///
/// Callers match on this instead of probing the table and recovering from errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStatus {
    Numeric,
    Text,
    Absent,
}

impl ColumnStatus {
    pub fn is_present(&self) -> bool {
        !matches!(self, ColumnStatus::Absent)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnStatus::Numeric)
    }
}

/// A single non-missing cell, used as a grouping key.
///
/// Numbers order before text; numbers compare with `total_cmp` so the
/// ordering is total and keys can live in a `BTreeMap`.
#[derive(Debug, Clone)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(_) => None,
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Number(_), CellValue::Text(_)) => Ordering::Less,
            (CellValue::Text(_), CellValue::Number(_)) => Ordering::Greater,
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // 2020.0 reads as a year, not a float
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{:.0}", n),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

// ============================================================================
// COLUMN
// ============================================================================

/// One column of a loaded table. Numeric columns hold `Float64`, everything
/// else holds `String`; nulls are missing cells.
#[derive(Debug, Clone)]
pub struct Column {
    series: Series,
}

impl Column {
    pub(crate) fn new(series: Series) -> Self {
        Column { series }
    }

    /// Header exactly as it appeared in the file
    pub fn name(&self) -> &str {
        self.series.name().as_str()
    }

    pub fn column_type(&self) -> ColumnType {
        match self.series.dtype() {
            DataType::Float64 => ColumnType::Numeric,
            _ => ColumnType::Text,
        }
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Row-aligned numeric cells; all `None` for text columns.
    pub fn numbers(&self) -> Vec<Option<f64>> {
        match self.series.f64() {
            Ok(ca) => ca.into_iter().map(|v| v.filter(|n| !n.is_nan())).collect(),
            Err(_) => vec![None; self.series.len()],
        }
    }

    /// Row-aligned cells as grouping keys.
    pub fn values(&self) -> Vec<Option<CellValue>> {
        if let Ok(ca) = self.series.f64() {
            return ca
                .into_iter()
                .map(|v| v.filter(|n| !n.is_nan()).map(CellValue::Number))
                .collect();
        }
        match self.series.str() {
            Ok(ca) => ca
                .into_iter()
                .map(|v| v.map(|s| CellValue::Text(s.to_string())))
                .collect(),
            Err(_) => vec![None; self.series.len()],
        }
    }

    /// All non-missing numeric values in row order. Empty for text columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.numbers().into_iter().flatten().collect()
    }
}

/// Canonical header spelling: trimmed, lowercase, snake_case.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int32 | DataType::Int64 | DataType::UInt32 | DataType::UInt64 | DataType::Float32 | DataType::Float64
    )
}

/// Settle every column on `Float64` or `String`.
///
/// A column with no values at all counts as numeric, the way an all-NaN
/// column does in a dataframe.
fn settle_dtypes(frame: &DataFrame) -> PolarsResult<DataFrame> {
    let columns = frame
        .get_columns()
        .iter()
        .map(|column| {
            let series = column.as_materialized_series();
            let all_missing = series.null_count() == series.len();
            let dtype = if is_numeric_dtype(series.dtype()) || all_missing {
                DataType::Float64
            } else {
                DataType::String
            };
            series.cast(&dtype).map(FrameColumn::from)
        })
        .collect::<PolarsResult<Vec<FrameColumn>>>()?;

    DataFrame::new(columns)
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct DataTable {
    frame: DataFrame,
    /// Normalized header → header as written (first occurrence wins)
    index: HashMap<String, String>,
}

impl DataTable {
    /// Parse comma-separated text with a header row.
    ///
    /// The whole input is scanned for type inference; a column is numeric
    /// when every non-missing cell parses as a number.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).context("Failed to read CSV input")?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(TableError::Empty.into());
        }

        let null_values = NA_VALUES.iter().map(|&v| PlSmallStr::from(v)).collect();
        let options = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_parse_options(
                CsvParseOptions::default().with_null_values(Some(NullValues::AllColumns(null_values))),
            );

        let frame = options
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .context("Failed to parse CSV")?;

        if frame.get_column_names().iter().all(|name| name.trim().is_empty()) {
            return Err(TableError::NoColumns.into());
        }

        let frame = settle_dtypes(&frame).context("Failed to settle column types")?;
        Ok(Self::from_frame(frame))
    }

    fn from_frame(frame: DataFrame) -> Self {
        let mut index = HashMap::new();
        for name in frame.get_column_names() {
            index
                .entry(normalize_header(name.as_str()))
                .or_insert_with(|| name.to_string());
        }
        DataTable { frame, index }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    /// Header as written in the file for a (possibly differently spelled) name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.index.get(&normalize_header(name)).map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<Column> {
        let header = self.resolve(name)?;
        let column = self.frame.column(header).ok()?;
        Some(Column::new(column.as_materialized_series().clone()))
    }

    /// Existence and type check used before every column access.
    pub fn has_column(&self, name: &str) -> ColumnStatus {
        match self.column(name).map(|c| c.column_type()) {
            Some(ColumnType::Numeric) => ColumnStatus::Numeric,
            Some(ColumnType::Text) => ColumnStatus::Text,
            None => ColumnStatus::Absent,
        }
    }
}

/// Read a CSV file into a table. Any I/O or parse failure is fatal.
pub fn load_csv(csv_path: &Path) -> Result<DataTable> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    let table = DataTable::from_reader(file)
        .with_context(|| format!("Failed to load CSV file {}", csv_path.display()))?;

    tracing::info!(
        path = %csv_path.display(),
        rows = table.row_count(),
        columns = table.frame.width(),
        "loaded dataset"
    );

    Ok(table)
}

// ============================================================================
// DATASET
// ============================================================================

/// A table plus the short label used in headings.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub table: DataTable,
}

impl Dataset {
    pub fn new(name: impl Into<String>, table: DataTable) -> Self {
        Dataset {
            name: name.into(),
            table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> DataTable {
        DataTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_infers_column_types() {
        let t = table("price,rooms,instance_year\n100.5,1 B/R,2020\n200,Studio,2021\n");

        assert_eq!(t.row_count(), 2);
        assert_eq!(t.has_column("price"), ColumnStatus::Numeric);
        assert_eq!(t.has_column("rooms"), ColumnStatus::Text);
        assert_eq!(t.has_column("instance_year"), ColumnStatus::Numeric);
        assert_eq!(t.has_column("missing"), ColumnStatus::Absent);
    }

    #[test]
    fn test_missing_cells_do_not_break_numeric_inference() {
        let t = table("price\n1\nNA\nNaN\n4\n");

        assert_eq!(t.has_column("price"), ColumnStatus::Numeric);
        assert_eq!(t.column("price").unwrap().numeric_values(), vec![1.0, 4.0]);
        assert_eq!(t.column("price").unwrap().numbers()[1], None);
    }

    #[test]
    fn test_null_cell_keeps_target_numeric() {
        let t = table("rooms_en,meter_sale_price\nStudio,100\nStudio,NULL\n1 B/R,300\n");

        assert_eq!(t.has_column("meter_sale_price"), ColumnStatus::Numeric);
        assert_eq!(
            t.column("meter_sale_price").unwrap().numbers(),
            vec![Some(100.0), None, Some(300.0)]
        );
    }

    #[test]
    fn test_all_default_na_spellings_are_missing() {
        for marker in NA_VALUES.iter().filter(|m| !m.is_empty()) {
            let t = table(&format!("v,label\n1,a\n{},b\n3,c\n", marker));

            assert_eq!(t.has_column("v"), ColumnStatus::Numeric, "marker {:?}", marker);
            assert_eq!(t.column("v").unwrap().numeric_values(), vec![1.0, 3.0]);
            assert_eq!(t.column("label").unwrap().values()[1], Some(CellValue::Text("b".into())));
        }
    }

    #[test]
    fn test_missing_markers_in_text_columns() {
        let t = table("rooms_en\nStudio\nNone\n<NA>\n");

        assert_eq!(t.has_column("rooms_en"), ColumnStatus::Text);
        assert_eq!(
            t.column("rooms_en").unwrap().values(),
            vec![Some(CellValue::Text("Studio".into())), None, None]
        );
    }

    #[test]
    fn test_all_missing_column_counts_as_numeric() {
        let t = table("v,w\n,a\nNULL,b\n");

        assert_eq!(t.has_column("v"), ColumnStatus::Numeric);
        assert!(t.column("v").unwrap().numeric_values().is_empty());
    }

    #[test]
    fn test_header_lookup_is_normalized() {
        let t = table("instance_Year,Meter Sale Price\n2020,1\n");

        assert!(t.has_column("instance_year").is_present());
        assert!(t.has_column("meter_sale_price").is_numeric());
        assert_eq!(t.column("instance_year").unwrap().name(), "instance_Year");
        assert_eq!(t.resolve("Instance Year"), Some("instance_Year"));
    }

    #[test]
    fn test_first_duplicate_header_wins() {
        let t = table("instance_year,instance_Year\n2020,abc\n");

        assert_eq!(t.has_column("instance_year"), ColumnStatus::Numeric);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(DataTable::from_reader("".as_bytes()).is_err());
    }

    #[test]
    fn test_ragged_rows_are_an_error() {
        assert!(DataTable::from_reader("a,b\n1,2\n3,4,5\n".as_bytes()).is_err());
    }

    #[test]
    fn test_cell_value_ordering_and_display() {
        let mut keys = vec![
            CellValue::Text("b".into()),
            CellValue::Number(2021.0),
            CellValue::Text("a".into()),
            CellValue::Number(2020.0),
        ];
        keys.sort();

        let shown: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(shown, vec!["2020", "2021", "a", "b"]);
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
    }
}
