//! Dataset loading, cleaning and one-hot encoding using Polars

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::Context;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, warn};

use crate::config::DatasetConfig;
use crate::error::ChurnError;

/// Row accounting for the cleaning stage. Every dropped row is counted so the
/// silent-loss policies stay visible to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningReport {
    pub rows_loaded: usize,
    /// Rows whose target was neither the positive nor the negative label
    pub rows_unrecognized_target: usize,
    /// Rows dropped because some column was missing or unparsable
    pub rows_with_missing_values: usize,
    pub rows_retained: usize,
}

/// Encoded design matrix ready for splitting and scaling
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    /// Unscaled feature values (n_rows, n_features)
    pub records: Array2<f64>,
    /// Binary target, 1 for churn
    pub targets: Array1<usize>,
    /// Column names of `records`, in column order
    pub feature_names: Vec<String>,
}

impl EncodedDataset {
    pub fn n_rows(&self) -> usize {
        self.records.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.records.ncols()
    }

    /// Encoded values of one row keyed by feature name, the shape an
    /// inference request takes
    pub fn row_values(&self, row: usize) -> HashMap<String, f64> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.records.row(row).iter().copied())
            .collect()
    }
}

/// Load a CSV file with a header row
///
/// Every column is read as text first. A column other than the target becomes
/// numeric when each non-missing cell parses as a number; otherwise it stays
/// categorical. Empty cells and the usual missing-value tokens (`NA`, `N/A`,
/// `null`, `NaN`, ...) become nulls, as do non-finite numbers.
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `config` - Column roles, used to keep the target as text
///
/// # Returns
/// * `DataFrame` with numeric columns as `Float64` and the rest as `String`
pub fn load_dataset(file_path: impl AsRef<Path>, config: &DatasetConfig) -> crate::Result<DataFrame> {
    let file_path = file_path.as_ref();

    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))
        .with_context(|| format!("failed to open dataset {}", file_path.display()))?
        .finish()
        .with_context(|| format!("failed to parse dataset {}", file_path.display()))?;

    if !has_column(&raw, &config.target) {
        return Err(ChurnError::MissingColumn(config.target.clone()).into());
    }

    let columns = raw
        .get_columns()
        .iter()
        .map(|series| {
            if series.name() == config.target {
                normalize_text(series)
            } else {
                infer_column_type(series)
            }
        })
        .collect::<crate::Result<Vec<_>>>()?;

    let df = DataFrame::new(columns)?;
    debug!(rows = df.height(), columns = df.width(), path = %file_path.display(), "dataset loaded");
    Ok(df)
}

/// Clean a loaded dataset
///
/// Steps, in order:
/// 1. trim the target and map positive/negative labels to 1/0, dropping rows
///    with any other target value
/// 2. drop the identifier column
/// 3. coerce the configured column to a number, unparsable cells becoming null
/// 4. drop every row holding a null
pub fn clean_dataset(
    mut df: DataFrame,
    config: &DatasetConfig,
) -> crate::Result<(DataFrame, CleaningReport)> {
    let rows_loaded = df.height();

    let labels: Vec<Option<f64>> = column(&df, &config.target)?
        .str()
        .with_context(|| format!("target column `{}` must be text", config.target))?
        .into_iter()
        .map(|cell| cell.and_then(|value| encode_label(value, config)))
        .collect();
    let labels = Series::new(&config.target, labels);
    let recognized = labels.is_not_null();
    df.with_column(labels)?;
    let mut df = df.filter(&recognized)?;

    let rows_unrecognized_target = rows_loaded - df.height();
    if rows_unrecognized_target > 0 {
        warn!(
            rows = rows_unrecognized_target,
            target = %config.target,
            "dropped rows with unrecognized target label"
        );
    }

    if let Some(id_column) = &config.id_column {
        column(&df, id_column)?;
        df = df.drop(id_column)?;
        debug!(column = %id_column, "dropped identifier column");
    }

    if let Some(numeric_column) = &config.numeric_column {
        let coerced = coerce_numeric(column(&df, numeric_column)?)?;
        df.with_column(coerced)?;
    }

    let before_nulls = df.height();
    let df = df.drop_nulls::<String>(None)?;
    let rows_with_missing_values = before_nulls - df.height();
    if rows_with_missing_values > 0 {
        warn!(rows = rows_with_missing_values, "dropped rows with missing values");
    }

    if df.height() == 0 {
        return Err(ChurnError::EmptyDataset { rows_loaded }.into());
    }

    let report = CleaningReport {
        rows_loaded,
        rows_unrecognized_target,
        rows_with_missing_values,
        rows_retained: df.height(),
    };
    Ok((df, report))
}

/// One-hot encode a cleaned dataset into a design matrix
///
/// Numeric columns come first in file order. Each text column then
/// contributes one 0/1 indicator per category, skipping the
/// lexicographically first category, named `<column>_<category>`.
pub fn encode_features(df: &DataFrame, target: &str) -> crate::Result<EncodedDataset> {
    let n_rows = df.height();
    let mut feature_names = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    let mut categorical = Vec::new();

    for series in df.get_columns() {
        if series.name() == target {
            continue;
        }
        if series.null_count() > 0 {
            anyhow::bail!("column `{}` still holds missing values", series.name());
        }

        match series.dtype() {
            DataType::String => categorical.push(series),
            _ => {
                let values = series.cast(&DataType::Float64)?;
                columns.push(values.f64()?.into_no_null_iter().collect());
                feature_names.push(series.name().to_string());
            }
        }
    }

    for series in categorical {
        let text = series.str()?;
        let categories: BTreeSet<&str> = text.into_iter().flatten().collect();

        for &category in categories.iter().skip(1) {
            feature_names.push(format!("{}_{}", series.name(), category));
            columns.push(
                text.into_iter()
                    .map(|cell| if cell == Some(category) { 1.0 } else { 0.0 })
                    .collect(),
            );
        }
    }

    let targets: Array1<usize> = column(df, target)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_no_null_iter()
        .map(|label| label as usize)
        .collect();

    let records = Array2::from_shape_fn((n_rows, columns.len()), |(row, col)| columns[col][row]);
    debug!(rows = n_rows, features = feature_names.len(), "features encoded");

    Ok(EncodedDataset {
        records,
        targets,
        feature_names,
    })
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|column| *column == name)
}

fn column<'a>(df: &'a DataFrame, name: &str) -> crate::Result<&'a Series> {
    df.column(name)
        .map_err(|_| ChurnError::MissingColumn(name.to_string()).into())
}

fn encode_label(value: &str, config: &DatasetConfig) -> Option<f64> {
    let value = value.trim();
    if value == config.positive_label {
        Some(1.0)
    } else if value == config.negative_label {
        Some(0.0)
    } else {
        None
    }
}

/// Cell contents read as missing in every column
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(value: &str) -> bool {
    MISSING_TOKENS.contains(&value)
}

/// Text column with missing tokens turned into nulls
fn normalize_text(series: &Series) -> crate::Result<Series> {
    let cells: Vec<Option<&str>> = series
        .str()?
        .into_iter()
        .map(|cell| cell.filter(|value| !is_missing(value)))
        .collect();
    Ok(Series::new(series.name(), cells))
}

fn infer_column_type(series: &Series) -> crate::Result<Series> {
    let text = series.str()?;
    let mut numbers = Vec::with_capacity(text.len());

    for cell in text.into_iter() {
        match cell {
            None => numbers.push(None),
            Some(value) if is_missing(value) => numbers.push(None),
            Some(value) => match value.trim().parse::<f64>() {
                // non-finite values count as missing
                Ok(number) if !number.is_finite() => numbers.push(None),
                Ok(number) => numbers.push(Some(number)),
                Err(_) => return normalize_text(series),
            },
        }
    }

    Ok(Series::new(series.name(), numbers))
}

fn coerce_numeric(series: &Series) -> crate::Result<Series> {
    match series.dtype() {
        DataType::String => {
            let numbers: Vec<Option<f64>> = series
                .str()?
                .into_iter()
                .map(|cell| {
                    cell.and_then(|value| value.trim().parse::<f64>().ok())
                        .filter(|number| number.is_finite())
                })
                .collect();
            Ok(Series::new(series.name(), numbers))
        }
        _ => Ok(series.cast(&DataType::Float64)?),
    }
}
