use std::collections::HashMap;

use polars::prelude::AnyValue;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::ColumnNotFound;
use crate::models::{ColumnProfile, ColumnType, Dataset, OtherBucket, ValueFrequency};
use crate::services::loader::validate_column_exists;

/// Grouping key. Floats group by bit pattern, so values that print the same
/// but differ in the last bit stay apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(u64),
    Text(String),
}

/// Classifies one cell: `None` for missing, otherwise its key and display form.
fn classify(value: AnyValue<'_>, empty_as_missing: bool) -> Option<(CellKey, String)> {
    match value {
        AnyValue::Null => None,
        AnyValue::Boolean(b) => Some((CellKey::Bool(b), b.to_string())),
        AnyValue::Int32(v) => Some((CellKey::Int(v as i64), v.to_string())),
        AnyValue::Int64(v) => Some((CellKey::Int(v), v.to_string())),
        AnyValue::UInt32(v) => Some((CellKey::UInt(v as u64), v.to_string())),
        AnyValue::UInt64(v) => Some((CellKey::UInt(v), v.to_string())),
        AnyValue::Float32(v) if v.is_nan() => None,
        AnyValue::Float64(v) if v.is_nan() => None,
        AnyValue::Float32(v) => Some((CellKey::Float((v as f64).to_bits()), format!("{:?}", v))),
        AnyValue::Float64(v) => Some((CellKey::Float(v.to_bits()), format!("{:?}", v))),
        AnyValue::String(s) if empty_as_missing && s.is_empty() => None,
        AnyValue::String(s) => Some((CellKey::Text(s.to_string()), s.to_string())),
        other => {
            let text = other.to_string();
            if empty_as_missing && text.is_empty() {
                None
            } else {
                Some((CellKey::Text(text.clone()), text))
            }
        }
    }
}

/// Missingness rule shared by column profiles and dataset summaries.
pub(crate) fn is_missing(value: AnyValue<'_>, empty_as_missing: bool) -> bool {
    classify(value, empty_as_missing).is_none()
}

/// Display form of a cell for tables; missing cells render empty.
pub(crate) fn display_cell(value: AnyValue<'_>) -> String {
    classify(value, false).map(|(_, text)| text).unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100`, rounded. Zero when there is nothing to divide by.
pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

struct Group {
    value: String,
    count: usize,
}

#[derive(Debug, Clone)]
pub struct ColumnAnalyzer {
    config: AnalysisConfig,
}

impl ColumnAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn profile(
        &self,
        dataset: &Dataset,
        column: &str,
    ) -> Result<ColumnProfile, ColumnNotFound> {
        self.profile_top(dataset, column, self.config.top_n_default)
    }

    pub fn profile_top(
        &self,
        dataset: &Dataset,
        column: &str,
        top_n: usize,
    ) -> Result<ColumnProfile, ColumnNotFound> {
        validate_column_exists(dataset, column)?;
        let (series, meta) = match (dataset.series(column), dataset.column_meta(column)) {
            (Some(series), Some(meta)) => (series, meta),
            _ => {
                return Err(ColumnNotFound {
                    requested: column.to_string(),
                    available: dataset.column_names(),
                })
            }
        };

        let total_rows = series.len();
        let mut missing_count = 0;
        let mut index: HashMap<CellKey, usize> = HashMap::new();
        // Insertion order is first-seen order.
        let mut groups: Vec<Group> = Vec::new();

        for row in 0..total_rows {
            let value = match series.get(row) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Error reading {} at row {}: {}", column, row, e);
                    AnyValue::Null
                }
            };
            match classify(value, self.config.treat_empty_as_missing) {
                None => missing_count += 1,
                Some((key, text)) => match index.get(&key) {
                    Some(&slot) => groups[slot].count += 1,
                    None => {
                        index.insert(key, groups.len());
                        groups.push(Group { value: text, count: 1 });
                    }
                },
            }
        }

        // Stable: equal counts keep first-seen order.
        groups.sort_by(|a, b| b.count.cmp(&a.count));

        let non_missing_total = total_rows - missing_count;
        let distinct_values = groups.len();
        debug!(
            "Profiled {}: {} rows, {} missing, {} distinct",
            column, total_rows, missing_count, distinct_values
        );

        let mut running = 0;
        let shown: Vec<ValueFrequency> = groups
            .iter()
            .take(top_n)
            .map(|group| {
                running += group.count;
                ValueFrequency {
                    value: group.value.clone(),
                    count: group.count,
                    percentage: percentage(group.count, non_missing_total),
                    cumulative_percentage: percentage(running, non_missing_total),
                }
            })
            .collect();

        let other = if distinct_values > top_n {
            let count: usize = groups[top_n..].iter().map(|g| g.count).sum();
            Some(OtherBucket {
                count,
                percentage: percentage(count, non_missing_total),
                distinct_values: distinct_values - top_n,
            })
        } else {
            None
        };

        let most_common = groups.first().map(|group| ValueFrequency {
            value: group.value.clone(),
            count: group.count,
            percentage: percentage(group.count, non_missing_total),
            cumulative_percentage: percentage(group.count, non_missing_total),
        });
        let least_common = groups.last().map(|group| ValueFrequency {
            value: group.value.clone(),
            count: group.count,
            percentage: percentage(group.count, non_missing_total),
            cumulative_percentage: percentage(non_missing_total, non_missing_total),
        });

        Ok(ColumnProfile {
            column: column.to_string(),
            column_type: meta.column_type,
            dtype: meta.dtype.clone(),
            total_rows,
            missing_count,
            missing_percentage: percentage(missing_count, total_rows),
            non_missing_total,
            distinct_values,
            groups: shown,
            other,
            most_common,
            least_common,
        })
    }
}

impl ColumnProfile {
    /// Human label for how many distinct values the column holds.
    pub fn variety(&self) -> &'static str {
        match self.distinct_values {
            0..=10 => "good variety",
            11..=50 => "moderate variety",
            _ => "high variety",
        }
    }
}
