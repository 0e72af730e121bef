// 📈 Statistics - quantiles, Tukey fences, grouped means
// Everything here is a pure function of the table's values

use crate::table::{CellValue, Column, ColumnStatus, DataTable};
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;

/// Tukey's fence multiplier
pub const IQR_MULTIPLIER: f64 = 1.5;

const MEAN_COLUMN: &str = "__group_mean";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Column '{0}' not found in table for IQR calculation.")]
    ColumnNotFound(String),

    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),

    #[error("Table operation failed: {0}")]
    Frame(String),
}

impl From<PolarsError> for StatsError {
    fn from(e: PolarsError) -> Self {
        StatsError::Frame(e.to_string())
    }
}

fn require_numeric(table: &DataTable, column: &str) -> Result<Column, StatsError> {
    match table.has_column(column) {
        ColumnStatus::Absent => Err(StatsError::ColumnNotFound(column.to_string())),
        ColumnStatus::Text => Err(StatsError::NotNumeric(column.to_string())),
        ColumnStatus::Numeric => table
            .column(column)
            .ok_or_else(|| StatsError::ColumnNotFound(column.to_string())),
    }
}

// ============================================================================
// QUANTILES
// ============================================================================

/// `(q1, median, q3)` with linear interpolation. Nulls are skipped; no values gives NaN.
fn quartiles(values: &Float64Chunked) -> PolarsResult<(f64, f64, f64)> {
    let q = |p: f64| -> PolarsResult<f64> {
        Ok(values.quantile(p, QuantileMethod::Linear)?.unwrap_or(f64::NAN))
    };
    Ok((q(0.25)?, q(0.5)?, q(0.75)?))
}

/// `[q1 - 1.5 * iqr, q3 + 1.5 * iqr]`
pub fn tukey_fences(q1: f64, q3: f64) -> (f64, f64) {
    let iqr = q3 - q1;
    (q1 - IQR_MULTIPLIER * iqr, q3 + IQR_MULTIPLIER * iqr)
}

/// IQR outlier fences for one column of a table.
///
/// The column must exist; absence is an error here, unlike the renderer
/// which skips missing columns. Missing cells are excluded; a column with
/// no values yields `(NaN, NaN)`.
pub fn iqr_bounds(table: &DataTable, column: &str) -> Result<(f64, f64), StatsError> {
    let column = require_numeric(table, column)?;
    let (q1, _, q3) = quartiles(column.series().f64()?)?;
    Ok(tukey_fences(q1, q3))
}

// ============================================================================
// BOX SUMMARY
// ============================================================================

/// Five-number summary with Tukey whiskers, as a box plot would draw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: usize,
}

pub fn box_summary(values: &[f64]) -> Option<BoxSummary> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let min = finite.iter().copied().reduce(f64::min)?;
    let max = finite.iter().copied().reduce(f64::max)?;

    let samples = Float64Chunked::from_vec("values".into(), finite.clone());
    let (q1, median, q3) = quartiles(&samples).ok()?;
    let (lower, upper) = tukey_fences(q1, q3);

    let inside: Vec<f64> = finite.iter().copied().filter(|v| *v >= lower && *v <= upper).collect();

    Some(BoxSummary {
        count: finite.len(),
        min,
        q1,
        median,
        q3,
        max,
        lower_whisker: inside.iter().copied().reduce(f64::min).unwrap_or(min),
        upper_whisker: inside.iter().copied().reduce(f64::max).unwrap_or(max),
        outliers: finite.len() - inside.len(),
    })
}

// ============================================================================
// GROUPED MEAN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub x: CellValue,
    pub group: CellValue,
    pub mean: f64,
}

/// Mean of `target` for each distinct `(x, group)` pair.
///
/// Rows missing any of the three cells are dropped. Output is sorted by
/// `x`, then `group`.
pub fn grouped_mean(table: &DataTable, x: &str, group: &str, target: &str) -> Result<Vec<GroupMean>, StatsError> {
    let header = |name: &str| {
        table
            .resolve(name)
            .ok_or_else(|| StatsError::ColumnNotFound(name.to_string()))
    };
    let (x_name, group_name) = (header(x)?, header(group)?);
    let target_name = require_numeric(table, target)?.name().to_string();

    let means = table
        .frame()
        .clone()
        .lazy()
        .filter(
            col(x_name)
                .is_not_null()
                .and(col(group_name).is_not_null())
                .and(col(target_name.as_str()).is_not_null()),
        )
        .group_by([col(x_name), col(group_name)])
        .agg([col(target_name.as_str()).mean().alias(MEAN_COLUMN)])
        .collect()?;

    let key = |name: &str| -> PolarsResult<Vec<Option<CellValue>>> {
        Ok(Column::new(means.column(name)?.as_materialized_series().clone()).values())
    };
    let xs = key(x_name)?;
    let groups = key(group_name)?;
    let averages: Vec<Option<f64>> = means.column(MEAN_COLUMN)?.as_materialized_series().f64()?.into_iter().collect();

    let mut rows: Vec<GroupMean> = xs
        .into_iter()
        .zip(groups)
        .zip(averages)
        .filter_map(|((x, group), mean)| {
            Some(GroupMean {
                x: x?,
                group: group?,
                mean: mean?,
            })
        })
        .collect();

    rows.sort_by(|a, b| (&a.x, &a.group).cmp(&(&b.x, &b.group)));
    Ok(rows)
}
