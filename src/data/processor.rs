//! Data Processor Module
//! Resolves column roles and extracts plot-ready values from a DataFrame.

use crate::charts::{ChartError, Scalar};
use crate::data::loader::is_numeric;
use polars::prelude::*;
use serde::Deserialize;

/// How the category column and value columns are picked from a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(untagged)]
pub enum ColumnStrategy {
    /// Column 0 is the category, every later column is a value series.
    #[default]
    Positional,
    /// User-picked columns. An empty `values` list means "every other column".
    Named {
        category: String,
        #[serde(default)]
        values: Vec<String>,
    },
}

/// Concrete column names a chart builder works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    pub category: String,
    pub values: Vec<String>,
}

impl ColumnRoles {
    pub fn resolve(df: &DataFrame, strategy: &ColumnStrategy) -> Result<Self, ChartError> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        match strategy {
            ColumnStrategy::Positional => {
                let (category, values) = names.split_first().ok_or(ChartError::NotEnoughColumns {
                    needed: 1,
                    found: 0,
                })?;
                Ok(Self {
                    category: category.clone(),
                    values: values.to_vec(),
                })
            }
            ColumnStrategy::Named { category, values } => {
                if !names.contains(category) {
                    return Err(ChartError::MissingColumn(category.clone()));
                }
                if let Some(missing) = values.iter().find(|v| !names.contains(*v)) {
                    return Err(ChartError::MissingColumn(missing.clone()));
                }
                let values = if values.is_empty() {
                    names.iter().filter(|n| *n != category).cloned().collect()
                } else {
                    values.clone()
                };
                Ok(Self {
                    category: category.clone(),
                    values,
                })
            }
        }
    }

    /// The value column at `index`, or a `NotEnoughColumns` error naming how many were needed.
    pub fn value(&self, index: usize) -> Result<&str, ChartError> {
        self.values
            .get(index)
            .map(String::as_str)
            .ok_or(ChartError::NotEnoughColumns {
                needed: index + 2,
                found: self.values.len() + 1,
            })
    }

    pub fn require_values(&self) -> Result<&[String], ChartError> {
        if self.values.is_empty() {
            return Err(ChartError::NotEnoughColumns {
                needed: 2,
                found: 1,
            });
        }
        Ok(&self.values)
    }
}

/// Handles value extraction for chart builders.
pub struct DataProcessor;

impl DataProcessor {
    /// Cell values of any column, keeping strings and dates as text.
    pub fn scalars(df: &DataFrame, column: &str) -> Result<Vec<Scalar>, ChartError> {
        let col = df
            .column(column)
            .map_err(|_| ChartError::MissingColumn(column.to_string()))?;

        if is_numeric(col.dtype()) {
            return Ok(Self::numbers(df, column)?
                .into_iter()
                .map(Scalar::from)
                .collect());
        }

        let text = col.cast(&DataType::String)?;
        let scalars = text
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| match v {
                Some(s) => Scalar::Text(s.to_string()),
                None => Scalar::Null,
            })
            .collect();
        Ok(scalars)
    }

    /// Values of a numeric column as `f64`, nulls kept as `None`.
    pub fn numbers(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, ChartError> {
        let col = df
            .column(column)
            .map_err(|_| ChartError::MissingColumn(column.to_string()))?;
        if !is_numeric(col.dtype()) {
            return Err(ChartError::NonNumeric(column.to_string()));
        }

        let value_f64 = col.cast(&DataType::Float64)?;
        let value_ca = value_f64.as_materialized_series().f64()?;
        Ok(value_ca.into_iter().collect())
    }

    /// Category labels as strings (nulls become empty labels).
    pub fn labels(df: &DataFrame, column: &str) -> Result<Vec<String>, ChartError> {
        Ok(Self::scalars(df, column)?
            .iter()
            .map(Scalar::label)
            .collect())
    }
}
