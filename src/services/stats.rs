use polars::prelude::{DataType, PolarsResult, Series};

use crate::error::AnalysisError;
use crate::models::{ColumnAnalysis, ColumnType, Dataset, DescriptiveStats, NumericColumnStats};
use crate::services::loader::validate_column_exists;

/// Non-missing values of a numeric series as `f64`, in row order.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<f64>> {
    let cast = series.cast(&DataType::Float64)?;
    let values = cast
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    Ok(values)
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (ddof = 1).
fn variance(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some(sum_sq / (values.len() - 1) as f64)
}

/// Adjusted Fisher-Pearson skewness.
fn skewness(values: &[f64], mean: f64) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 3 {
        return None;
    }
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Unbiased excess kurtosis.
fn kurtosis(values: &[f64], mean: f64) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 4 {
        return None;
    }
    let s2: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    let s4: f64 = values.iter().map(|v| (v - mean).powi(4)).sum();
    let denominator = (n - 2.0) * (n - 3.0) * s2 * s2;
    if denominator == 0.0 {
        return Some(0.0);
    }
    let adjustment = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    Some(n * (n + 1.0) * (n - 1.0) * s4 / denominator - adjustment)
}

fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Count, mean, std, min, quartiles and max. `None` for an all-missing column.
pub fn describe(name: &str, series: &Series) -> PolarsResult<Option<DescriptiveStats>> {
    let values = sorted(numeric_values(series)?);
    if values.is_empty() {
        return Ok(None);
    }
    let mean = mean(&values);
    Ok(Some(DescriptiveStats {
        column: name.to_string(),
        count: values.len(),
        mean,
        std: variance(&values, mean).map(f64::sqrt),
        min: values[0],
        q1: quantile(&values, 0.25).unwrap_or(f64::NAN),
        median: quantile(&values, 0.5).unwrap_or(f64::NAN),
        q3: quantile(&values, 0.75).unwrap_or(f64::NAN),
        max: values[values.len() - 1],
    }))
}

/// Full statistics for one numeric column, used by mean/std/skewness requests.
pub fn column_stats(
    dataset: &Dataset,
    column: &str,
    analysis: ColumnAnalysis,
) -> Result<NumericColumnStats, AnalysisError> {
    validate_column_exists(dataset, column)?;
    let (series, meta) = match (dataset.series(column), dataset.column_meta(column)) {
        (Some(series), Some(meta)) => (series, meta),
        _ => return Err(AnalysisError::DataFrame(format!("column '{}' vanished", column))),
    };

    if meta.column_type != ColumnType::Numeric {
        return Err(AnalysisError::NotNumeric {
            column: column.to_string(),
            dtype: meta.dtype.clone(),
        });
    }

    let values = sorted(numeric_values(series)?);
    let total_rows = series.len();
    let valid_rows = values.len();
    if values.is_empty() {
        return Err(AnalysisError::NoValues {
            column: column.to_string(),
        });
    }

    let mean = mean(&values);
    let variance = variance(&values, mean);
    let std = variance.map(f64::sqrt);
    let min = values[0];
    let max = values[valid_rows - 1];
    let q1 = quantile(&values, 0.25).unwrap_or(min);
    let q3 = quantile(&values, 0.75).unwrap_or(max);

    Ok(NumericColumnStats {
        column: column.to_string(),
        analysis,
        dtype: meta.dtype.clone(),
        total_rows,
        valid_rows,
        missing_count: total_rows - valid_rows,
        mean,
        median: quantile(&values, 0.5).unwrap_or(mean),
        min,
        max,
        range: max - min,
        variance,
        std,
        coefficient_of_variation: match std {
            Some(std) if mean != 0.0 => Some(std / mean * 100.0),
            _ => None,
        },
        p10: quantile(&values, 0.1).unwrap_or(min),
        q1,
        q3,
        p90: quantile(&values, 0.9).unwrap_or(max),
        iqr: q3 - q1,
        skewness: skewness(&values, mean),
        kurtosis: kurtosis(&values, mean),
    })
}
