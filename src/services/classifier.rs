use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::models::{AnalysisRequest, ColumnAnalysis, PlotKind, PlotSpec};

/// Turns a free-text question into a request. Implementations may be backed
/// by a language model; the router only ever sees the resulting variant.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, query: &str, columns: &[String]) -> AnalysisRequest;
}

static VISUALIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(plot|chart|graph|visuali[sz]e|histogram|heatmap)\b").unwrap());
static CORRELATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(correlat\w*|heatmap)\b").unwrap());
static BAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bbar\b").unwrap());
static MEAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(mean|average)\b").unwrap());
static STD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(std|standard deviation|deviation|variance|variability)\b").unwrap());
static SKEW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(skew\w*|kurtosis)\b").unwrap());

/// Deterministic keyword rules. Column mentions are exact, case-sensitive,
/// whole-word matches; longer names are tried first so `AGE_GROUP` wins
/// over `AGE`.
#[derive(Debug, Default, Clone)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn mentioned_column(query: &str, columns: &[String]) -> Option<String> {
        let mut candidates: Vec<&String> = columns.iter().filter(|c| !c.is_empty()).collect();
        candidates.sort_by(|a, b| b.len().cmp(&a.len()));
        candidates
            .into_iter()
            .find(|column| mentions(query, column))
            .cloned()
    }
}

/// Whole-word occurrence: neighbours must not be word characters.
fn mentions(query: &str, column: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    query.match_indices(column).any(|(start, matched)| {
        let before = query[..start].chars().next_back();
        let after = query[start + matched.len()..].chars().next();
        !before.map_or(false, is_word) && !after.map_or(false, is_word)
    })
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, query: &str, columns: &[String]) -> AnalysisRequest {
        let column = Self::mentioned_column(query, columns);

        let request = if VISUALIZE.is_match(query) || CORRELATION.is_match(query) {
            let subtype = match (&column, CORRELATION.is_match(query), BAR.is_match(query)) {
                (_, true, _) | (None, _, _) => PlotKind::Correlation,
                (Some(_), false, true) => PlotKind::Bar,
                (Some(_), false, false) => PlotKind::Distribution,
            };
            let column = if subtype == PlotKind::Correlation { None } else { column };
            AnalysisRequest::Visualize(PlotSpec {
                subtype,
                column,
                params: Value::Null,
            })
        } else if let Some(column) = column {
            let analysis = if SKEW.is_match(query) {
                ColumnAnalysis::Skewness
            } else if STD.is_match(query) {
                ColumnAnalysis::Std
            } else if MEAN.is_match(query) {
                ColumnAnalysis::Mean
            } else {
                ColumnAnalysis::Distribution
            };
            AnalysisRequest::Column {
                column,
                analysis,
                top_n: None,
            }
        } else {
            AnalysisRequest::Summary
        };

        debug!("Classified {:?} as {} request", query, request.kind());
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        ["SEX", "AGE", "AGE_GROUP", "TIME_PERIOD"].iter().map(|s| s.to_string()).collect()
    }

    fn classify(query: &str) -> AnalysisRequest {
        KeywordClassifier::new().classify(query, &columns())
    }

    #[test]
    fn test_general_questions_are_summaries() {
        assert_eq!(classify("What are the data types?"), AnalysisRequest::Summary);
        assert_eq!(classify("describe this dataset"), AnalysisRequest::Summary);
    }

    #[test]
    fn test_column_mentions() {
        assert_eq!(
            classify("Show the unique values of SEX"),
            AnalysisRequest::column("SEX")
        );
        assert_eq!(
            classify("distribution of AGE_GROUP please"),
            AnalysisRequest::column("AGE_GROUP")
        );
        // Case-sensitive: "sex" is not the SEX column.
        assert_eq!(classify("values of sex"), AnalysisRequest::Summary);
        // Substrings of other words do not count.
        assert_eq!(classify("what about SEXY"), AnalysisRequest::Summary);
    }

    #[test]
    fn test_numeric_analyses() {
        let kind = |q: &str| match classify(q) {
            AnalysisRequest::Column { analysis, .. } => analysis,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(kind("average AGE"), ColumnAnalysis::Mean);
        assert_eq!(kind("standard deviation of AGE"), ColumnAnalysis::Std);
        assert_eq!(kind("is AGE skewed?"), ColumnAnalysis::Skewness);
    }

    #[test]
    fn test_visual_requests() {
        match classify("plot the distribution of AGE") {
            AnalysisRequest::Visualize(spec) => {
                assert_eq!(spec.subtype, PlotKind::Distribution);
                assert_eq!(spec.column.as_deref(), Some("AGE"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match classify("bar chart of SEX") {
            AnalysisRequest::Visualize(spec) => assert_eq!(spec.subtype, PlotKind::Bar),
            other => panic!("unexpected {other:?}"),
        }
        match classify("show correlations") {
            AnalysisRequest::Visualize(spec) => {
                assert_eq!(spec.subtype, PlotKind::Correlation);
                assert!(spec.column.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
