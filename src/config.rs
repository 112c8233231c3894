use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use serde::Deserialize;

fn default_delimiters() -> Vec<char> {
    vec![',', ';']
}

fn default_top_n() -> usize {
    20
}

fn default_sample_rows() -> usize {
    5
}

fn default_empty_as_missing() -> bool {
    true
}

fn default_cache_capacity() -> u64 {
    32
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Knobs shared by the loader, the analyzer and the router.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Candidate separators for delimited files, in tie-break order.
    #[serde(default = "default_delimiters")]
    pub delimiters_to_try: Vec<char>,
    #[serde(default = "default_top_n")]
    pub top_n_default: usize,
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
    #[serde(default = "default_empty_as_missing")]
    pub treat_empty_as_missing: bool,
    /// Zero disables the dataset cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            delimiters_to_try: default_delimiters(),
            top_n_default: default_top_n(),
            sample_rows: default_sample_rows(),
            treat_empty_as_missing: default_empty_as_missing(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let defaults = AnalysisConfig::default();
        let delimiters_to_try = match std::env::var("DATASET_DELIMITERS") {
            Ok(raw) => parse_delimiters(&raw)?,
            Err(_) => defaults.delimiters_to_try,
        };

        let analysis = AnalysisConfig {
            delimiters_to_try,
            top_n_default: env_or("DATASET_TOP_N", defaults.top_n_default)?,
            sample_rows: env_or("DATASET_SAMPLE_ROWS", defaults.sample_rows)?,
            treat_empty_as_missing: env_or(
                "DATASET_EMPTY_AS_MISSING",
                defaults.treat_empty_as_missing,
            )?,
            cache_capacity: env_or("DATASET_CACHE_CAPACITY", defaults.cache_capacity)?,
        };

        Ok(Config {
            analysis,
            bind_addr: env_or("BIND_ADDR", default_bind_addr())?,
        })
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn parse_delimiters(raw: &str) -> Result<Vec<char>> {
    let delimiters: Vec<char> = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if delimiters.is_empty() {
        return Err(anyhow!("Invalid value for DATASET_DELIMITERS: no delimiters given"));
    }
    if let Some(bad) = delimiters.iter().find(|c| !c.is_ascii()) {
        return Err(anyhow!("Invalid value for DATASET_DELIMITERS: '{}' is not ASCII", bad));
    }
    Ok(delimiters)
}
