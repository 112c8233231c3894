use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;

mod config;
mod error;
mod logging;
mod routes;
mod services;
pub mod models;

use error::AnalysisError;
use models::{AnalysisRequest, AnalysisResult, ColumnAnalysis, Dataset};
use services::cache::DatasetCache;
use services::classifier::{IntentClassifier, KeywordClassifier};
use services::router::ToolRouter;

#[derive(Debug, Parser)]
#[command(name = "dataset-services", version, about = "Ask questions about CSV and Parquet datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Answer a single question and print markdown to stdout
    Ask {
        path: PathBuf,
        /// Free-text question; empty means a dataset summary
        query: Vec<String>,
        /// Profile this column directly instead of classifying the query
        #[arg(long)]
        column: Option<String>,
        /// distribution, mean, std or skewness (with --column)
        #[arg(long)]
        analysis: Option<ColumnAnalysis>,
        #[arg(long)]
        delimiter: Option<char>,
        #[arg(long)]
        top_n: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            logging::init_logging("info")?;
            let config = config::Config::from_env()?;
            let addr = bind.unwrap_or(config.bind_addr);
            let state = Arc::new(AppState::new(config));

            let app = Router::new()
                .merge(routes::routes())
                .layer(TraceLayer::new_for_http())
                .with_state(state);

            tracing::info!("listening on {}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Command::Ask {
            path,
            query,
            column,
            analysis,
            delimiter,
            top_n,
        } => {
            logging::init_logging("warn")?;
            let state = AppState::new(config::Config::from_env()?);
            let request = column.map(|column| AnalysisRequest::Column {
                column,
                analysis: analysis.unwrap_or_default(),
                top_n,
            });
            let query = query.join(" ");
            let query = (!query.trim().is_empty()).then_some(query.as_str());

            let (dataset, result) = state.analyze(&path, delimiter, request, query, top_n)?;
            print!("{}", services::markdown::render(&result, &dataset)?);
        }
    }

    Ok(())
}

// Application state
pub struct AppState {
    config: config::Config,
    datasets: DatasetCache,
    router: ToolRouter,
    classifier: Box<dyn IntentClassifier>,
}

impl AppState {
    fn new(config: config::Config) -> Self {
        Self {
            datasets: DatasetCache::new(config.analysis.clone()),
            router: ToolRouter::new(config.analysis.clone()),
            classifier: Box::new(KeywordClassifier::new()),
            config,
        }
    }

    /// Load (or reuse) the dataset, resolve the request and run it. An
    /// explicit request wins over a free-text query; neither means summary.
    pub fn analyze(
        &self,
        path: &Path,
        delimiter: Option<char>,
        request: Option<AnalysisRequest>,
        query: Option<&str>,
        top_n: Option<usize>,
    ) -> Result<(Arc<Dataset>, AnalysisResult), AnalysisError> {
        let dataset = self.datasets.get_or_load(path, delimiter)?;

        let mut request = match (request, query) {
            (Some(request), _) => request,
            (None, Some(query)) => self.classifier.classify(query, &dataset.column_names()),
            (None, None) => AnalysisRequest::Summary,
        };
        if let AnalysisRequest::Column { top_n: slot, .. } = &mut request {
            if slot.is_none() {
                *slot = top_n;
            }
        }
        tracing::debug!(
            "Resolved {} request (top_n default {})",
            request.kind(),
            self.config.analysis.top_n_default
        );

        let result = self.router.handle(&request, &dataset)?;
        Ok((dataset, result))
    }
}
