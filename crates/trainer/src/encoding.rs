//! Label encoding for categorical columns.
//!
//! Each non-numeric column gets a [`ColumnEncoder`] whose codes follow the
//! lexicographic order of the labels seen at fit time. The resulting
//! [`EncodingTable`] is fitted once on training data and then applied, never
//! refitted, to every later table with the same columns.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TrainerError};
use crate::table::{ColumnValues, DataTable};

/// Bidirectional label/code mapping for one column.
///
/// `labels[code]` is the label for `code`; `labels` is sorted and unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnEncoder {
    column: String,
    labels: Vec<String>,
}

impl ColumnEncoder {
    /// Fit on the observed values of `column`.
    pub fn fit<S: AsRef<str>>(column: impl Into<String>, values: &[S]) -> Self {
        let labels: BTreeSet<&str> = values.iter().map(AsRef::as_ref).collect();
        Self {
            column: column.into(),
            labels: labels.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Labels in code order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Code for `label`; labels not seen at fit time are rejected.
    pub fn encode(&self, label: &str) -> Result<usize> {
        self.labels
            .binary_search_by(|known| known.as_str().cmp(label))
            .map_err(|_| TrainerError::UnknownLabel {
                column: self.column.clone(),
                label: label.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    /// `(label, code)` pairs in the sorted order used at fit time.
    pub fn inverse_table(&self) -> Vec<(String, usize)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code))
            .collect()
    }
}

/// Fitted encoders keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingTable {
    encoders: BTreeMap<String, ColumnEncoder>,
}

impl EncodingTable {
    /// Fit an encoder for every text column among `columns`.
    ///
    /// Numeric columns are passed through and get no encoder.
    pub fn fit(table: &DataTable, columns: &[String]) -> Result<Self> {
        let mut encoders = BTreeMap::new();
        for name in columns {
            let column = table.require(name)?;
            if let ColumnValues::Text(values) = &column.values {
                let encoder = ColumnEncoder::fit(name.as_str(), values.as_slice());
                tracing::debug!(column = %name, labels = encoder.len(), "fitted label encoder");
                encoders.insert(name.clone(), encoder);
            }
        }
        Ok(Self { encoders })
    }

    pub fn encoder(&self, column: &str) -> Option<&ColumnEncoder> {
        self.encoders.get(column)
    }

    /// Names of the encoded columns, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    /// `None` when `column` was numeric at fit time.
    pub fn inverse_table(&self, column: &str) -> Option<Vec<(String, usize)>> {
        self.encoder(column).map(ColumnEncoder::inverse_table)
    }

    /// Replace the values of every encoded column by their codes.
    ///
    /// Numeric columns without an encoder pass through. A column that was
    /// text at fit time is encoded through its cell text even if this batch
    /// happens to parse as numbers. Text columns without an encoder fail with
    /// `UnencodedColumn`.
    pub fn apply(&self, table: &DataTable) -> Result<EncodedTable> {
        let mut columns = Vec::with_capacity(table.columns().len());
        for column in table.columns() {
            let values = match (self.encoder(&column.name), &column.values) {
                (Some(encoder), _) => column
                    .labels()
                    .iter()
                    .map(|label| encoder.encode(label).map(|code| code as f64))
                    .collect::<Result<Vec<_>>>()?,
                (None, ColumnValues::Numeric(values)) => values.clone(),
                (None, ColumnValues::Text(_)) => {
                    return Err(TrainerError::UnencodedColumn(column.name.clone()));
                }
            };
            columns.push((column.name.clone(), values));
        }
        EncodedTable::new(columns)
    }
}

/// A table whose columns are all numeric after encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTable {
    columns: Vec<(String, Vec<f64>)>,
    rows: usize,
}

impl EncodedTable {
    pub fn new(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != rows) {
            return Err(TrainerError::Dataset(format!(
                "column '{}' has {} rows, expected {}",
                name,
                values.len(),
                rows
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| TrainerError::MissingColumn(name.to_string()))
    }

    /// Row-major matrix of the given feature columns.
    pub fn feature_matrix(&self, features: &[String]) -> Result<Vec<Vec<f64>>> {
        let columns = features
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;
        Ok((0..self.rows)
            .map(|row| columns.iter().map(|values| values[row]).collect())
            .collect())
    }
}
