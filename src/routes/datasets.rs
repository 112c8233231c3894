use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::Method,
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::AppError,
    models::{AnalysisResult, ColumnMeta, DataFormat},
    services::{markdown, router::parse_request},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/datasets/analyze", post(analyze_dataset))
        .route("/datasets/cache", delete(clear_cache))
        .layer(cors)
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    file_path: PathBuf,
    #[serde(default)]
    delimiter: Option<char>,
    /// Pre-classified request, e.g. `{"kind": "column", "column": "SEX"}`.
    #[serde(default)]
    request: Option<serde_json::Value>,
    /// Free-text question, used when `request` is absent.
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DatasetInfo {
    path: PathBuf,
    format: DataFormat,
    delimiter: Option<char>,
    rows: usize,
    columns: Vec<ColumnMeta>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    dataset: DatasetInfo,
    result: AnalysisResult,
    markdown: String,
}

async fn analyze_dataset(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let start = std::time::Instant::now();
    tracing::info!("Analyze request for {}", body.file_path.display());

    if body.file_path.as_os_str().is_empty() {
        return Err(AppError::InvalidInput("file_path must not be empty".to_string()));
    }

    let request = body.request.map(parse_request).transpose()?;

    // Loading and computation are blocking work.
    let response = tokio::task::spawn_blocking(move || -> Result<AnalyzeResponse, AppError> {
        let (dataset, result) = state.analyze(
            &body.file_path,
            body.delimiter,
            request,
            body.query.as_deref(),
            body.top_n,
        )?;
        let markdown = markdown::render(&result, &dataset)
            .map_err(|e| AppError::Internal(format!("Failed to render markdown: {}", e)))?;
        Ok(AnalyzeResponse {
            dataset: DatasetInfo {
                path: dataset.path.clone(),
                format: dataset.format,
                delimiter: dataset.delimiter,
                rows: dataset.row_count(),
                columns: dataset.columns.clone(),
            },
            result,
            markdown,
        })
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    tracing::info!("Analysis completed in {:?}", start.elapsed());
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct CacheCleared {
    evicted: u64,
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<CacheCleared> {
    let evicted = state.datasets.len();
    state.datasets.clear();
    tracing::info!("Cleared {} cached datasets", evicted);
    Json(CacheCleared { evicted })
}
