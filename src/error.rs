use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::DataFormat;

/// Failure to materialize a dataset from disk.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    #[error("Dataset '{}' not found (format: {format})", .path.display())]
    NotFound { path: PathBuf, format: DataFormat },

    #[error("Dataset '{}' has no columns or no rows (format: {format})", .path.display())]
    EmptyDataset { path: PathBuf, format: DataFormat },

    #[error("Dataset '{}' could not be read as {format}: {reason}", .path.display())]
    UnsupportedFormat {
        path: PathBuf,
        format: DataFormat,
        reason: String,
    },
}

impl LoadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            LoadError::NotFound { path, .. }
            | LoadError::EmptyDataset { path, .. }
            | LoadError::UnsupportedFormat { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Column '{requested}' not found in the dataset. Available columns: {}", .available.join(", "))]
pub struct ColumnNotFound {
    pub requested: String,
    pub available: Vec<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RoutingError {
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    ColumnNotFound(#[from] ColumnNotFound),

    #[error("Column '{column}' is not numeric. Data type: {dtype}")]
    NotNumeric { column: String, dtype: String },

    #[error("Column '{column}' has no non-missing values")]
    NoValues { column: String },

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Invalid analysis request: {0}")]
    InvalidRequest(String),

    #[error("Visualization failed: {0}")]
    Visualization(String),

    #[error("DataFrame error: {0}")]
    DataFrame(String),
}

impl From<polars::error::PolarsError> for AnalysisError {
    fn from(err: polars::error::PolarsError) -> Self {
        AnalysisError::DataFrame(err.to_string())
    }
}

/// Error surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::Analysis(err.into())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Analysis(err) => match err {
                AnalysisError::Load(LoadError::NotFound { .. }) => StatusCode::NOT_FOUND,
                AnalysisError::Load(LoadError::EmptyDataset { .. })
                | AnalysisError::ColumnNotFound(_)
                | AnalysisError::NotNumeric { .. }
                | AnalysisError::NoValues { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AnalysisError::Load(LoadError::UnsupportedFormat { .. })
                | AnalysisError::Routing(_)
                | AnalysisError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                AnalysisError::Visualization(_) | AnalysisError::DataFrame(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let body = match &self {
            AppError::Analysis(AnalysisError::ColumnNotFound(err)) => json!({
                "error": self.to_string(),
                "requested_column": err.requested,
                "available_columns": err.available,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_not_found_lists_every_column() {
        let err = ColumnNotFound {
            requested: "ZZZ".to_string(),
            available: vec!["SEX".to_string(), "AGE".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Column 'ZZZ' not found in the dataset. Available columns: SEX, AGE"
        );
    }

    #[test]
    fn load_errors_carry_path_and_format() {
        let err = LoadError::NotFound {
            path: PathBuf::from("missing.csv"),
            format: DataFormat::Csv,
        };
        assert_eq!(err.path(), &PathBuf::from("missing.csv"));
        assert_eq!(err.to_string(), "Dataset 'missing.csv' not found (format: csv)");
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let not_found: AppError = LoadError::NotFound {
            path: PathBuf::from("x.csv"),
            format: DataFormat::Csv,
        }
        .into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let column: AppError = AnalysisError::from(ColumnNotFound {
            requested: "a".into(),
            available: vec![],
        })
        .into();
        assert_eq!(column.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let empty: AppError = AnalysisError::NoValues { column: "m".into() }.into();
        assert_eq!(empty.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let routing: AppError =
            AnalysisError::from(RoutingError::UnsupportedAction("pivot".into())).into();
        assert_eq!(routing.status(), StatusCode::BAD_REQUEST);
    }
}
