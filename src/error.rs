//! Error taxonomy for the newsletter pipeline.
//!
//! Only [`PipelineError`] ends a run. Fetch, cache, and chart failures are
//! logged at the call site and degrade the affected dataset or image instead.

use thiserror::Error;

/// A page could not be downloaded.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("network error while fetching {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// The generative-text service did not produce a newsletter.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation failed: authentication rejected ({0})")]
    Auth(String),

    #[error("generation failed: quota or rate limit exceeded ({0})")]
    Quota(String),

    #[error("generation failed: malformed request ({0})")]
    Malformed(String),

    #[error("generation failed: network error ({0})")]
    Network(String),

    #[error("generation failed: service returned HTTP {status} ({message})")]
    Service { status: u16, message: String },

    #[error("generation failed: response contained no text")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("chart {file} could not be rendered: {message}")]
    Render { file: String, message: String },
}

/// Terminal failure of one query run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("query rejected: {0}")]
    RejectedQuery(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}
