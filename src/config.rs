//! Runtime configuration.
//!
//! A [`Config`] is built once in `main` and handed to the pipeline. Values come
//! from an optional JSON file whose keys are merged over [`Config::default`];
//! an unreadable or malformed file is logged and ignored.

use crate::scrapers::naver::NaverFinance;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lifetime of cached datasets. `0` disables the cache.
    pub cache_duration_minutes: u64,
    /// Total attempts per page fetch.
    pub max_retries: u32,
    /// Base delay between fetch attempts; doubles on each retry.
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
    pub generation_timeout_seconds: u64,
    /// Extra attempts for the generation call after the first one.
    pub generation_retries: u32,
    pub output_directory: PathBuf,
    pub cache_directory: PathBuf,
    pub gemini_model: String,
    pub api_base_url: String,
    pub source_base_url: String,
    /// Rows kept per mover list in the summary and the prompt context.
    pub top_stocks_count: usize,
    pub news_count: usize,
    /// Bars drawn in each mover chart.
    pub chart_top_count: usize,
    pub context_max_chars: usize,
    /// A query must mention one of these. Empty accepts any query.
    pub query_keywords: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_duration_minutes: 30,
            max_retries: 3,
            retry_delay_ms: 500,
            timeout_seconds: 10,
            generation_timeout_seconds: 60,
            generation_retries: 0,
            output_directory: PathBuf::from("outputs"),
            cache_directory: PathBuf::from(".cache/market_newsletter"),
            gemini_model: "gemini-2.0-flash".to_string(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            source_base_url: NaverFinance::DEFAULT_BASE_URL.to_string(),
            top_stocks_count: 10,
            news_count: 5,
            chart_top_count: 5,
            context_max_chars: 6000,
            query_keywords: ["오늘자", "국내", "시장", "주식"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults.
    ///
    /// A missing file is not an error. A file that cannot be read or parsed
    /// is reported with a warning and the defaults are used instead.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No configuration file; using defaults");
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| Self::from_json(&raw).map_err(|e| e.to_string()));

        match parsed {
            Ok(config) => {
                info!("Loaded configuration");
                config
            }
            Err(e) => {
                warn!(error = %e, "Failed to load configuration; using defaults");
                Self::default()
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Write the effective configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_duration_minutes > 0
    }

    pub fn cache_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cache_duration_minutes as i64)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
