use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, RoutingError};
use crate::models::{AnalysisRequest, AnalysisResult, ColumnAnalysis, Dataset, PlotKind, PlotSpec};
use crate::services::analyzer::ColumnAnalyzer;
use crate::services::loader::validate_column_exists;
use crate::services::stats::column_stats;
use crate::services::summary::summarize;

/// Renders plots on behalf of the router. Returns the written file path.
pub trait Visualizer: Send + Sync {
    fn render(&self, dataset: &Dataset, spec: &PlotSpec) -> Result<PathBuf, String>;
}

/// Parses a request envelope. Unknown kinds are an unsupported action rather
/// than a malformed request.
pub fn parse_request(value: Value) -> Result<AnalysisRequest, AnalysisError> {
    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalysisError::InvalidRequest("missing string field 'kind'".to_string()))?;

    if !AnalysisRequest::KINDS.contains(&kind) {
        return Err(RoutingError::UnsupportedAction(kind.to_string()).into());
    }

    serde_json::from_value(value).map_err(|e| AnalysisError::InvalidRequest(e.to_string()))
}

/// Dispatches each request variant to its computation. Holds no per-request
/// state.
pub struct ToolRouter {
    config: AnalysisConfig,
    analyzer: ColumnAnalyzer,
    visualizer: Option<Arc<dyn Visualizer>>,
}

impl ToolRouter {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            analyzer: ColumnAnalyzer::new(config.clone()),
            config,
            visualizer: None,
        }
    }

    pub fn with_visualizer(mut self, visualizer: Arc<dyn Visualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    pub fn handle(
        &self,
        request: &AnalysisRequest,
        dataset: &Dataset,
    ) -> Result<AnalysisResult, AnalysisError> {
        info!("Dispatching {} request for {}", request.kind(), dataset.file_name());
        match request {
            AnalysisRequest::Summary => {
                Ok(AnalysisResult::Summary(summarize(dataset, &self.config)?))
            }
            AnalysisRequest::Column {
                column,
                analysis: ColumnAnalysis::Distribution,
                top_n,
            } => {
                let profile = match top_n {
                    Some(top_n) => self.analyzer.profile_top(dataset, column, *top_n)?,
                    None => self.analyzer.profile(dataset, column)?,
                };
                Ok(AnalysisResult::Column(profile))
            }
            AnalysisRequest::Column { column, analysis, .. } => {
                Ok(AnalysisResult::NumericStats(column_stats(dataset, column, *analysis)?))
            }
            AnalysisRequest::Visualize(spec) => self.visualize(spec, dataset),
        }
    }

    fn visualize(
        &self,
        spec: &PlotSpec,
        dataset: &Dataset,
    ) -> Result<AnalysisResult, AnalysisError> {
        let visualizer = match &self.visualizer {
            Some(visualizer) => visualizer,
            None => {
                warn!("Visualization requested but no renderer is configured");
                return Err(RoutingError::UnsupportedAction("visualize".to_string()).into());
            }
        };

        match (&spec.column, spec.subtype) {
            (Some(column), _) => validate_column_exists(dataset, column)?,
            (None, PlotKind::Distribution | PlotKind::Bar) => {
                return Err(AnalysisError::InvalidRequest(format!(
                    "{:?} plot needs a column",
                    spec.subtype
                )))
            }
            (None, PlotKind::Correlation) => {}
        }

        let path = visualizer
            .render(dataset, spec)
            .map_err(AnalysisError::Visualization)?;
        info!("Plot written to {}", path.display());
        Ok(AnalysisResult::Plot { path })
    }
}
