//! Markdown rendering for analysis results. Pure formatting: every number
//! shown here was computed upstream.

use std::fmt::{self, Write};

use crate::models::{
    AnalysisResult, ColumnAnalysis, ColumnProfile, Dataset, DatasetSummary, NumericColumnStats,
};

pub fn render(result: &AnalysisResult, dataset: &Dataset) -> Result<String, fmt::Error> {
    let mut out = String::new();
    match result {
        AnalysisResult::Summary(summary) => render_summary(&mut out, summary)?,
        AnalysisResult::Column(profile) => render_profile(&mut out, profile, dataset)?,
        AnalysisResult::NumericStats(stats) => render_numeric(&mut out, stats, dataset)?,
        AnalysisResult::Plot { path } => writeln!(out, "Plot saved to `{}`", path.display())?,
    }
    Ok(out)
}

/// `1234567` -> `1,234,567`.
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", precision, v),
        _ => "n/a".to_string(),
    }
}

/// Cells must not break the table layout.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn render_summary(out: &mut String, summary: &DatasetSummary) -> fmt::Result {
    writeln!(out, "# Dataset Summary: {}\n", summary.file_name)?;
    writeln!(out, "## Basic Information")?;
    writeln!(out, "- **Total Rows:** {}", thousands(summary.row_count))?;
    writeln!(out, "- **Total Columns:** {}\n", summary.column_count)?;

    out.push_str("## Data Types\n| Column | Data Type |\n|--------|-----------|\n");
    for meta in &summary.dtypes {
        writeln!(out, "| {} | {} |", cell(&meta.name), meta.dtype)?;
    }

    out.push_str("\n## Missing Values\n");
    out.push_str("| Column | Missing Count | Missing % |\n");
    out.push_str("|--------|---------------|-----------|\n");
    for missing in &summary.missing {
        writeln!(
            out,
            "| {} | {} | {:.2}% |",
            cell(&missing.column),
            thousands(missing.missing_count),
            missing.missing_percentage
        )?;
    }

    if !summary.numeric_stats.is_empty() {
        out.push_str("\n## Numeric Column Statistics\n");
        out.push_str("| Column | Count | Mean | Std | Min | 25% | 50% | 75% | Max |\n");
        out.push_str("|--------|-------|------|-----|-----|-----|-----|-----|-----|\n");
        for stats in &summary.numeric_stats {
            writeln!(
                out,
                "| {} | {} | {:.2} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |",
                cell(&stats.column),
                thousands(stats.count),
                stats.mean,
                opt(stats.std, 2),
                stats.min,
                stats.q1,
                stats.median,
                stats.q3,
                stats.max
            )?;
        }
    }

    writeln!(out, "\n## Sample Data (First {} rows)", summary.sample.rows.len())?;
    let headers: Vec<String> = summary.sample.headers.iter().map(|h| cell(h)).collect();
    writeln!(out, "| {} |", headers.join(" | "))?;
    writeln!(out, "|{}", "---|".repeat(headers.len()))?;
    for row in &summary.sample.rows {
        let cells: Vec<String> = row.iter().map(|c| cell(c)).collect();
        writeln!(out, "| {} |", cells.join(" | "))?;
    }
    Ok(())
}

fn render_profile(out: &mut String, profile: &ColumnProfile, dataset: &Dataset) -> fmt::Result {
    writeln!(out, "# Column Analysis: {}\n", profile.column)?;
    out.push_str("## Dataset Information\n");
    writeln!(out, "- **Dataset:** {}", dataset.file_name())?;
    writeln!(out, "- **Column:** {}", profile.column)?;
    writeln!(out, "- **Total Rows:** {}", thousands(profile.total_rows))?;
    writeln!(out, "- **Unique Values:** {}", thousands(profile.distinct_values))?;
    writeln!(out, "- **Data Type:** {}\n", profile.dtype)?;

    out.push_str("## Unique Values Analysis\n");
    out.push_str("| Value | Count | Percentage | Cumulative % |\n");
    out.push_str("|-------|-------|------------|--------------|\n");
    for group in &profile.groups {
        writeln!(
            out,
            "| {} | {} | {:.2}% | {:.2}% |",
            cell(&group.value),
            thousands(group.count),
            group.percentage,
            group.cumulative_percentage
        )?;
    }
    if let Some(other) = &profile.other {
        writeln!(
            out,
            "| _Other ({} values)_ | {} | {:.2}% | 100.00% |",
            thousands(other.distinct_values),
            thousands(other.count),
            other.percentage
        )?;
    }

    out.push_str("\n## Summary Statistics\n");
    match (&profile.most_common, &profile.least_common) {
        (Some(most), Some(least)) if profile.non_missing_total > 0 => {
            writeln!(out, "- **Most Common Value:** {} ({:.2}%)", most.value, most.percentage)?;
            writeln!(out, "- **Least Common Value:** {} ({:.2}%)", least.value, least.percentage)?;
        }
        _ => out.push_str("- **Values:** none (every row is missing)\n"),
    }
    if profile.missing_count > 0 {
        writeln!(
            out,
            "- **Missing Values:** {} ({:.2}%)",
            thousands(profile.missing_count),
            profile.missing_percentage
        )?;
    } else {
        out.push_str("- **Missing Values:** None\n");
    }
    writeln!(
        out,
        "- **Distribution:** {} unique values ({})",
        thousands(profile.distinct_values),
        profile.variety()
    )
}

fn render_numeric(out: &mut String, stats: &NumericColumnStats, dataset: &Dataset) -> fmt::Result {
    let title = match stats.analysis {
        ColumnAnalysis::Std => "Standard Deviation Analysis",
        ColumnAnalysis::Skewness => "Distribution Skewness Analysis",
        ColumnAnalysis::Mean | ColumnAnalysis::Distribution => "Mean Analysis",
    };
    let skewness = stats.analysis == ColumnAnalysis::Skewness;

    writeln!(out, "# {}: {}\n", title, stats.column)?;
    out.push_str("## Dataset Information\n");
    writeln!(out, "- **Dataset:** {}", dataset.file_name())?;
    writeln!(out, "- **Column:** {}", stats.column)?;
    writeln!(out, "- **Total Rows:** {}", thousands(stats.total_rows))?;
    writeln!(out, "- **Valid Rows:** {}", thousands(stats.valid_rows))?;
    writeln!(out, "- **Missing Values:** {}", thousands(stats.missing_count))?;
    writeln!(out, "- **Data Type:** {}\n", stats.dtype)?;

    out.push_str("## Statistics\n");
    writeln!(out, "- **Mean:** {:.4}", stats.mean)?;
    writeln!(out, "- **Median:** {:.4}", stats.median)?;
    writeln!(out, "- **Standard Deviation:** {}", opt(stats.std, 4))?;
    writeln!(out, "- **Variance:** {}", opt(stats.variance, 4))?;
    writeln!(out, "- **Minimum:** {:.4}", stats.min)?;
    writeln!(out, "- **Maximum:** {:.4}", stats.max)?;
    writeln!(out, "- **Range:** {:.4}", stats.range)?;
    if skewness {
        writeln!(out, "- **Skewness:** {}", opt(stats.skewness, 4))?;
        writeln!(out, "- **Kurtosis:** {}", opt(stats.kurtosis, 4))?;
    }

    out.push_str("\n## Percentiles\n");
    if skewness {
        writeln!(out, "- **10th Percentile:** {:.4}", stats.p10)?;
    }
    writeln!(out, "- **25th Percentile:** {:.4}", stats.q1)?;
    writeln!(out, "- **50th Percentile (Median):** {:.4}", stats.median)?;
    writeln!(out, "- **75th Percentile:** {:.4}", stats.q3)?;
    if skewness {
        writeln!(out, "- **90th Percentile:** {:.4}", stats.p90)?;
    }
    writeln!(out, "- **Interquartile Range (IQR):** {:.4}", stats.iqr)?;

    out.push_str("\n## Insights\n");
    for insight in insights(stats) {
        writeln!(out, "- {}", insight)?;
    }
    Ok(())
}

/// Interpretive notes shown under a numeric analysis.
pub fn insights(stats: &NumericColumnStats) -> Vec<String> {
    let mut notes = Vec::new();
    if stats.missing_count > 0 {
        notes.push(format!(
            "**Data Quality:** {} missing values ({:.2}%) were excluded",
            thousands(stats.missing_count),
            stats.missing_count as f64 / stats.total_rows as f64 * 100.0
        ));
    }

    let shape = if stats.mean == stats.median {
        "Mean equals median, suggesting a symmetric distribution"
    } else if stats.mean > stats.median {
        "Mean is greater than median, suggesting right-skewed distribution"
    } else {
        "Mean is less than median, suggesting left-skewed distribution"
    };
    notes.push(format!("**Distribution:** {}", shape));

    if let Some(cv) = stats.coefficient_of_variation {
        let band = if cv.abs() < 15.0 {
            "Low variability (CV < 15%)"
        } else if cv.abs() < 35.0 {
            "Moderate variability (CV 15-35%)"
        } else {
            "High variability (CV > 35%)"
        };
        notes.push(format!("**Variability:** {} (CV = {:.2}%)", band, cv));
    }

    if let Some(std) = stats.std {
        if std > stats.iqr {
            notes.push(
                "**Spread:** Standard deviation is greater than IQR, indicating potential outliers"
                    .to_string(),
            );
        } else {
            notes.push(
                "**Spread:** Standard deviation is less than IQR, indicating relatively normal \
                 distribution"
                    .to_string(),
            );
        }
    }

    if let Some(skew) = stats.skewness {
        let class = if skew.abs() < 0.5 {
            "Approximately symmetric (|skewness| < 0.5)"
        } else if skew > 0.0 {
            "Right-skewed (positive skewness > 0.5)"
        } else {
            "Left-skewed (negative skewness < -0.5)"
        };
        notes.push(format!("**Skewness:** {}", class));
    }

    if let Some(kurt) = stats.kurtosis {
        let class = if kurt.abs() < 2.0 {
            "Mesokurtic (normal-like peaks, |kurtosis| < 2)"
        } else if kurt > 0.0 {
            "Leptokurtic (sharp peaks, kurtosis > 2)"
        } else {
            "Platykurtic (flat peaks, kurtosis < -2)"
        };
        notes.push(format!("**Kurtosis:** {}", class));
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use polars::prelude::{DataFrame, NamedFrom, Series};

    use crate::config::AnalysisConfig;
    use crate::models::{AnalysisRequest, DataFormat};
    use crate::services::router::ToolRouter;

    fn dataset() -> Dataset {
        let frame = DataFrame::new(vec![
            Series::new("SEX", &["M", "F", "M", "M", ""]),
            Series::new("AGE", &[25i64, 31, 47, 52, 38]),
        ])
        .unwrap();
        Dataset::new(PathBuf::from("data/people.csv"), DataFormat::Csv, Some(';'), frame)
    }

    fn rendered(request: AnalysisRequest) -> String {
        let ds = dataset();
        let result = ToolRouter::new(AnalysisConfig::default()).handle(&request, &ds).unwrap();
        render(&result, &ds).unwrap()
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_profile_table() {
        let md = rendered(AnalysisRequest::column("SEX"));
        assert!(md.starts_with("# Column Analysis: SEX"));
        assert!(md.contains("- **Dataset:** people.csv"));
        assert!(md.contains("| Value | Count | Percentage | Cumulative % |"));
        assert!(md.contains("| M | 3 | 75.00% | 75.00% |"));
        assert!(md.contains("| F | 1 | 25.00% | 100.00% |"));
        assert!(md.contains("- **Missing Values:** 1 (20.00%)"));
        assert!(md.contains("2 unique values (good variety)"));
    }

    #[test]
    fn test_other_bucket_row() {
        let md = rendered(AnalysisRequest::Column {
            column: "AGE".into(),
            analysis: ColumnAnalysis::Distribution,
            top_n: Some(2),
        });
        assert!(md.contains("| _Other (3 values)_ | 3 | 60.00% | 100.00% |"));
    }

    #[test]
    fn test_summary_sections() {
        let md = rendered(AnalysisRequest::Summary);
        assert!(md.contains("# Dataset Summary: people.csv"));
        assert!(md.contains("- **Total Rows:** 5"));
        assert!(md.contains("## Missing Values"));
        assert!(md.contains("| AGE | 5 | 38.60 |"));
        assert!(md.contains("## Sample Data (First 5 rows)"));
        assert!(md.contains("| SEX | AGE |"));
    }

    #[test]
    fn test_numeric_sections() {
        let md = rendered(AnalysisRequest::Column {
            column: "AGE".into(),
            analysis: ColumnAnalysis::Skewness,
            top_n: None,
        });
        assert!(md.starts_with("# Distribution Skewness Analysis: AGE"));
        assert!(md.contains("- **Mean:** 38.6000"));
        assert!(md.contains("- **Kurtosis:**"));
        assert!(md.contains("- **90th Percentile:**"));
    }

    #[test]
    fn test_zero_top_n_reports_real_extremes() {
        let md = rendered(AnalysisRequest::Column {
            column: "SEX".into(),
            analysis: ColumnAnalysis::Distribution,
            top_n: Some(0),
        });
        assert!(md.contains("| _Other (2 values)_ | 4 | 100.00% | 100.00% |"));
        assert!(!md.contains("every row is missing"));
        assert!(md.contains("- **Most Common Value:** M (75.00%)"));
        assert!(md.contains("- **Least Common Value:** F (25.00%)"));
    }

    #[test]
    fn test_all_missing_column_says_so() {
        let frame = DataFrame::new(vec![Series::new("m", &[None::<i64>, None])]).unwrap();
        let ds = Dataset::new(PathBuf::from("gaps.csv"), DataFormat::Csv, Some(','), frame);
        let result = ToolRouter::new(AnalysisConfig::default())
            .handle(&AnalysisRequest::column("m"), &ds)
            .unwrap();
        let md = render(&result, &ds).unwrap();
        assert!(md.contains("- **Values:** none (every row is missing)"));
        assert!(md.contains("- **Missing Values:** 2 (100.00%)"));
    }

    #[test]
    fn test_undefined_values_render_as_na() {
        assert_eq!(opt(None, 2), "n/a");
        assert_eq!(opt(Some(f64::INFINITY), 2), "n/a");
        assert_eq!(opt(Some(1.234), 2), "1.23");
        assert_eq!(cell("a|b\nc"), "a\\|b c");
    }
}
