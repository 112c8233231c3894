use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use polars::frame::DataFrame;
use polars::prelude::{DataType, Series};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Parquet,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Csv => write!(f, "csv"),
            DataFormat::Parquet => write!(f, "parquet"),
        }
    }
}

/// Semantic type of a column, inferred from its storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Boolean,
    Datetime,
}

impl ColumnType {
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => ColumnType::Boolean,
            DataType::Date | DataType::Datetime(_, _) | DataType::Duration(_) => {
                ColumnType::Datetime
            }
            dt if dt.is_numeric() => ColumnType::Numeric,
            _ => ColumnType::Categorical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
    /// Storage type as reported by the table engine, e.g. `i64` or `str`.
    pub dtype: String,
}

/// A loaded table. Never mutated once built.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub path: PathBuf,
    pub format: DataFormat,
    pub delimiter: Option<char>,
    pub columns: Vec<ColumnMeta>,
    frame: DataFrame,
}

impl Dataset {
    pub fn new(
        path: PathBuf,
        format: DataFormat,
        delimiter: Option<char>,
        frame: DataFrame,
    ) -> Self {
        let columns = frame
            .get_columns()
            .iter()
            .map(|series| ColumnMeta {
                name: series.name().to_string(),
                column_type: ColumnType::from_dtype(series.dtype()),
                dtype: series.dtype().to_string(),
            })
            .collect();

        Self {
            path,
            format,
            delimiter,
            columns,
            frame,
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_meta(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.frame.get_columns().iter().find(|s| s.name() == name)
    }

    pub fn file_name(&self) -> String {
        file_name(&self.path)
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One row of a value distribution. Percentages are rounded to two decimals
/// for display; cumulative values come from exact running counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueFrequency {
    pub value: String,
    pub count: usize,
    pub percentage: f64,
    pub cumulative_percentage: f64,
}

/// Everything past the top-N cut.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherBucket {
    pub count: usize,
    pub percentage: f64,
    pub distinct_values: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    pub column_type: ColumnType,
    pub dtype: String,
    pub total_rows: usize,
    pub missing_count: usize,
    pub missing_percentage: f64,
    pub non_missing_total: usize,
    pub distinct_values: usize,
    pub groups: Vec<ValueFrequency>,
    pub other: Option<OtherBucket>,
    /// Taken from every group, not just the shown ones.
    pub most_common: Option<ValueFrequency>,
    pub least_common: Option<ValueFrequency>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingValues {
    pub column: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
}

/// `describe()`-style statistics over the non-missing values of a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRows {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub file_name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub dtypes: Vec<ColumnMeta>,
    pub missing: Vec<MissingValues>,
    pub numeric_stats: Vec<DescriptiveStats>,
    pub sample: SampleRows,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericColumnStats {
    pub column: String,
    pub analysis: ColumnAnalysis,
    pub dtype: String,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub missing_count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub variance: Option<f64>,
    pub std: Option<f64>,
    pub coefficient_of_variation: Option<f64>,
    pub p10: f64,
    pub q1: f64,
    pub q3: f64,
    pub p90: f64,
    pub iqr: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

/// Which computation a column request runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAnalysis {
    #[default]
    Distribution,
    Mean,
    Std,
    Skewness,
}

impl FromStr for ColumnAnalysis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distribution" | "unique" | "values" => Ok(ColumnAnalysis::Distribution),
            "mean" | "average" => Ok(ColumnAnalysis::Mean),
            "std" | "stddev" | "standard_deviation" => Ok(ColumnAnalysis::Std),
            "skew" | "skewness" => Ok(ColumnAnalysis::Skewness),
            other => Err(format!("unknown column analysis '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    Distribution,
    Correlation,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub subtype: PlotKind,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// What to compute, as decided by an upstream intent classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisRequest {
    Summary,
    Column {
        column: String,
        #[serde(default)]
        analysis: ColumnAnalysis,
        #[serde(default)]
        top_n: Option<usize>,
    },
    Visualize(PlotSpec),
}

impl AnalysisRequest {
    pub const KINDS: [&'static str; 3] = ["summary", "column", "visualize"];

    pub fn column(name: impl Into<String>) -> Self {
        AnalysisRequest::Column {
            column: name.into(),
            analysis: ColumnAnalysis::Distribution,
            top_n: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::Summary => "summary",
            AnalysisRequest::Column { .. } => "column",
            AnalysisRequest::Visualize(_) => "visualize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    Summary(DatasetSummary),
    Column(ColumnProfile),
    NumericStats(NumericColumnStats),
    Plot { path: PathBuf },
}
