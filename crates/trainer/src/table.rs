//! Tabular data loading.
//!
//! A [`DataTable`] is a set of equally long named columns, each either
//! numeric or text. Parsers turn uploaded bytes plus a sheet name into a
//! table; the CSV parser exposes a single sheet.

use std::collections::HashSet;

use crate::errors::{Result, TrainerError};

/// Sheet name a CSV upload is exposed under.
pub const DEFAULT_SHEET: &str = "Sheet1";

/// Values of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

/// A named column.
///
/// Numeric columns read from an upload remember the cell text they were
/// parsed from, so `"1.0"` and `"1"` stay distinct labels when encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
    source: Option<Vec<String>>,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
            source: None,
        }
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<S>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Text(values.into_iter().map(Into::into).collect()),
            source: None,
        }
    }

    /// Numeric column that keeps the cell text each value was parsed from.
    pub fn parsed_numeric(name: impl Into<String>, values: Vec<f64>, source: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
            source: Some(source),
        }
    }

    /// Every cell as label text.
    ///
    /// Numeric cells use their source text when known, otherwise
    /// [`format_number`].
    pub fn labels(&self) -> Vec<String> {
        match (&self.values, &self.source) {
            (ColumnValues::Text(values), _) => values.clone(),
            (ColumnValues::Numeric(_), Some(source)) => source.clone(),
            (ColumnValues::Numeric(values), None) => {
                values.iter().map(|v| format_number(*v)).collect()
            }
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.values, ColumnValues::Numeric(_))
    }

    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Vec<Column>,
    rows: usize,
}

impl DataTable {
    /// Build a table, rejecting duplicate names and ragged columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TrainerError::Dataset(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
            if column.len() != rows {
                return Err(TrainerError::Dataset(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    rows
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`DataTable::column`] but fails with `MissingColumn`.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| TrainerError::MissingColumn(name.to_string()))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Project onto `names`, in that order. Repeated names are kept once.
    pub fn select(&self, names: &[String]) -> Result<DataTable> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            if seen.insert(name.as_str()) {
                columns.push(self.require(name)?.clone());
            }
        }
        DataTable::new(columns)
    }
}

/// Render a number the way it should appear as a label: integral values
/// without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Turns raw uploaded bytes into tables.
pub trait TabularParser {
    /// Sheets available in the upload.
    fn sheet_names(&self, data: &[u8]) -> Result<Vec<String>>;

    /// Parse one sheet.
    fn parse(&self, data: &[u8], sheet: &str) -> Result<DataTable>;
}

/// Comma-separated (or other single-byte delimited) text with a header row.
#[derive(Debug, Clone)]
pub struct CsvParser {
    delimiter: u8,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvParser {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl TabularParser for CsvParser {
    fn sheet_names(&self, _data: &[u8]) -> Result<Vec<String>> {
        Ok(vec![DEFAULT_SHEET.to_string()])
    }

    fn parse(&self, data: &[u8], sheet: &str) -> Result<DataTable> {
        if sheet != DEFAULT_SHEET {
            return Err(TrainerError::UnknownSheet(sheet.to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(TrainerError::Dataset("missing header row".to_string()));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (column, value) in cells.iter_mut().zip(record.iter()) {
                column.push(value.to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| infer_column(name, values))
            .collect();

        let table = DataTable::new(columns)?;
        tracing::debug!(
            rows = table.len(),
            columns = table.columns().len(),
            "parsed CSV sheet"
        );
        Ok(table)
    }
}

/// Numeric when every cell parses as a finite number, text otherwise.
fn infer_column(name: String, values: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = values
        .iter()
        .map(|v| v.parse::<f64>().ok().filter(|x| x.is_finite()))
        .collect();
    match parsed {
        Some(numbers) => Column::parsed_numeric(name, numbers, values),
        None => Column::text(name, values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "color,size,label\nred, 1.5 ,0\nblue,2,1\nred,3,0\n";

    #[test]
    fn test_parse_infers_types() {
        let table = CsvParser::default()
            .parse(CSV.as_bytes(), DEFAULT_SHEET)
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.column_names(), vec!["color", "size", "label"]);
        assert_eq!(
            table.column("color").unwrap().values,
            ColumnValues::Text(vec!["red".into(), "blue".into(), "red".into()])
        );
        assert_eq!(
            table.column("size").unwrap().values,
            ColumnValues::Numeric(vec![1.5, 2.0, 3.0])
        );
        assert!(table.column("label").unwrap().is_numeric());
    }

    #[test]
    fn test_mixed_column_is_text() {
        let table = CsvParser::default()
            .parse(b"v\n1\ntwo\n", DEFAULT_SHEET)
            .unwrap();
        assert!(!table.column("v").unwrap().is_numeric());
    }

    #[test]
    fn test_nan_cells_are_not_numeric() {
        let table = CsvParser::default()
            .parse(b"v\n1\nNaN\n", DEFAULT_SHEET)
            .unwrap();
        assert!(!table.column("v").unwrap().is_numeric());
    }

    #[test]
    fn test_unknown_sheet() {
        let err = CsvParser::default().parse(CSV.as_bytes(), "Test").unwrap_err();
        assert!(matches!(err, TrainerError::UnknownSheet(ref s) if s == "Test"));
    }

    #[test]
    fn test_ragged_rows_fail() {
        let err = CsvParser::default()
            .parse(b"a,b\n1,2\n3\n", DEFAULT_SHEET)
            .unwrap_err();
        assert!(matches!(err, TrainerError::Csv(_)));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let table = CsvParser::with_delimiter(b';')
            .parse(b"a;b\n1;x\n", DEFAULT_SHEET)
            .unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_select_projects_and_dedups() {
        let table = CsvParser::default()
            .parse(CSV.as_bytes(), DEFAULT_SHEET)
            .unwrap();
        let selected = table
            .select(&["label".to_string(), "color".to_string(), "label".to_string()])
            .unwrap();
        assert_eq!(selected.column_names(), vec!["label", "color"]);

        let err = table.select(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, TrainerError::MissingColumn(_)));
    }

    #[test]
    fn test_new_rejects_ragged_and_duplicates() {
        assert!(DataTable::new(vec![
            Column::numeric("a", vec![1.0]),
            Column::numeric("b", vec![1.0, 2.0]),
        ])
        .is_err());
        assert!(DataTable::new(vec![
            Column::numeric("a", vec![1.0]),
            Column::text("a", vec!["x"]),
        ])
        .is_err());
    }

    #[test]
    fn test_numeric_cells_keep_source_text() {
        let table = CsvParser::default()
            .parse(b"grade,n\n1.0,2\n01,3\n1e2,4\n", DEFAULT_SHEET)
            .unwrap();
        let grade = table.column("grade").unwrap();
        assert_eq!(grade.values, ColumnValues::Numeric(vec![1.0, 1.0, 100.0]));
        assert_eq!(grade.labels(), vec!["1.0", "01", "1e2"]);

        assert_eq!(Column::numeric("x", vec![2.0, 0.5]).labels(), vec!["2", "0.5"]);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_sheet_names() {
        assert_eq!(
            CsvParser::default().sheet_names(b"").unwrap(),
            vec![DEFAULT_SHEET.to_string()]
        );
    }
}
