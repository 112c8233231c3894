use polars::prelude::{AnyValue, PolarsError, PolarsResult, Series};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::models::{
    ColumnType, Dataset, DatasetSummary, DescriptiveStats, MissingValues, SampleRows,
};
use crate::services::analyzer::{display_cell, is_missing, percentage};
use crate::services::stats::describe;

/// Whole-dataset overview: dtypes, missing values, numeric statistics and
/// the first `sample_rows` rows. Row sampling is positional, never random.
pub fn summarize(
    dataset: &Dataset,
    config: &AnalysisConfig,
) -> Result<DatasetSummary, PolarsError> {
    let start = std::time::Instant::now();
    let frame = dataset.frame();
    let total_rows = frame.height();

    let missing: Vec<MissingValues> = frame
        .get_columns()
        .iter()
        .map(|series| {
            let missing_count = missing_count(series, config.treat_empty_as_missing);
            MissingValues {
                column: series.name().to_string(),
                missing_count,
                missing_percentage: percentage(missing_count, total_rows),
            }
        })
        .collect();

    // Columns are independent; collect keeps the declared column order.
    let numeric_stats: Vec<DescriptiveStats> = frame
        .get_columns()
        .par_iter()
        .zip(dataset.columns.par_iter())
        .filter(|(_, meta)| meta.column_type == ColumnType::Numeric)
        .map(|(series, meta)| describe(&meta.name, series))
        .collect::<PolarsResult<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    let sample = sample(dataset, config.sample_rows);

    info!(
        "Summarized {} ({} rows, {} numeric columns) in {:?}",
        dataset.file_name(),
        total_rows,
        numeric_stats.len(),
        start.elapsed()
    );

    Ok(DatasetSummary {
        file_name: dataset.file_name(),
        row_count: total_rows,
        column_count: dataset.column_count(),
        dtypes: dataset.columns.clone(),
        missing,
        numeric_stats,
        sample,
    })
}

/// Same rule as column profiles: nulls, NaN and, when configured, empty
/// strings.
fn missing_count(series: &Series, empty_as_missing: bool) -> usize {
    (0..series.len())
        .filter(|&row| {
            let value = series.get(row).unwrap_or_else(|e| {
                warn!("Error reading {} at row {}: {}", series.name(), row, e);
                AnyValue::Null
            });
            is_missing(value, empty_as_missing)
        })
        .count()
}

fn sample(dataset: &Dataset, rows: usize) -> SampleRows {
    let frame = dataset.frame();
    let rows = frame.head(Some(rows));
    let sample = (0..rows.height())
        .map(|row| {
            rows.get_columns()
                .iter()
                .map(|series| match series.get(row) {
                    Ok(value) => display_cell(value),
                    Err(e) => {
                        warn!("Error reading sample row {} of {}: {}", row, series.name(), e);
                        String::new()
                    }
                })
                .collect()
        })
        .collect();

    SampleRows {
        headers: dataset.column_names(),
        rows: sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use polars::prelude::{DataFrame, NamedFrom};

    use crate::models::DataFormat;
    use crate::services::analyzer::ColumnAnalyzer;

    fn dataset() -> Dataset {
        let frame = DataFrame::new(vec![
            Series::new(
                "SEX",
                &[Some("M"), Some("F"), None, Some("M"), Some("F"), Some("M"), Some("F")],
            ),
            Series::new(
                "AGE",
                &[Some(20i64), Some(30), Some(40), None, Some(50), Some(60), Some(70)],
            ),
            Series::new("SCORE", &[1.0f64, 2.0, f64::NAN, 4.0, 5.0, 6.0, 7.0]),
        ])
        .unwrap();
        Dataset::new(PathBuf::from("/data/people.csv"), DataFormat::Csv, Some(';'), frame)
    }

    #[test]
    fn test_summary_tables() {
        let summary = summarize(&dataset(), &AnalysisConfig::default()).unwrap();

        assert_eq!(summary.file_name, "people.csv");
        assert_eq!(summary.row_count, 7);
        assert_eq!(summary.column_count, 3);
        assert_eq!(summary.dtypes.len(), 3);

        let missing: Vec<usize> = summary.missing.iter().map(|m| m.missing_count).collect();
        assert_eq!(missing, vec![1, 1, 1]);
        assert_eq!(summary.missing[0].missing_percentage, 14.29);

        let numeric: Vec<&str> = summary.numeric_stats.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(numeric, vec!["AGE", "SCORE"]);
        assert_eq!(summary.numeric_stats[0].count, 6);
        assert_eq!(summary.numeric_stats[0].mean, 45.0);
    }

    #[test]
    fn test_sample_is_first_rows() {
        let config = AnalysisConfig {
            sample_rows: 2,
            ..AnalysisConfig::default()
        };
        let summary = summarize(&dataset(), &config).unwrap();
        assert_eq!(summary.sample.headers, vec!["SEX", "AGE", "SCORE"]);
        assert_eq!(
            summary.sample.rows,
            vec![
                vec!["M".to_string(), "20".to_string(), "1.0".to_string()],
                vec!["F".to_string(), "30".to_string(), "2.0".to_string()],
            ]
        );
    }

    #[test]
    fn test_summary_is_reproducible() {
        let ds = dataset();
        let config = AnalysisConfig::default();
        assert_eq!(summarize(&ds, &config).unwrap(), summarize(&ds, &config).unwrap());
    }

    #[test]
    fn test_missing_counts_agree_with_profile() {
        let frame = DataFrame::new(vec![Series::new("SEX", &["M", "F", "M", "M", ""])]).unwrap();
        let ds = Dataset::new(PathBuf::from("people.parquet"), DataFormat::Parquet, None, frame);

        for empty_as_missing in [true, false] {
            let config = AnalysisConfig {
                treat_empty_as_missing: empty_as_missing,
                ..AnalysisConfig::default()
            };
            let summary = summarize(&ds, &config).unwrap();
            let profile = ColumnAnalyzer::new(config).profile(&ds, "SEX").unwrap();
            assert_eq!(summary.missing[0].missing_count, profile.missing_count);
            assert_eq!(summary.missing[0].missing_percentage, profile.missing_percentage);
        }
        assert_eq!(
            summarize(&ds, &AnalysisConfig::default()).unwrap().missing[0].missing_count,
            1
        );
    }
}
